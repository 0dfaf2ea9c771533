//! Speaking queue server implementation (the authoritative replica).

pub mod domain;
mod handler;
mod runner;
mod signal;
pub mod state;

pub use runner::run_server;
