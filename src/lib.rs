//! Shared speaking queue library.
//!
//! This library provides the server (authoritative replica) and client
//! (mirror + CLI) implementations for a speaking queue replicated over
//! WebSocket broadcast.

pub mod client;
pub mod common;
pub mod protocol;
pub mod server;
