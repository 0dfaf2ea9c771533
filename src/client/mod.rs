//! Speaking queue client implementation (per-process mirror + CLI).

pub mod domain;
mod error;
mod formatter;
mod runner;
mod session;
mod ui;

pub use error::ClientError;
pub use runner::run_client;
