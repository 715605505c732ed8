//! codeprobe server library entry.
//!
//! This crate wires the config loader, metrics registry, outbound transport,
//! probe loop, and HTTP front into one process. It is intended to be consumed
//! by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod prober;
pub mod router;
pub mod server;
pub mod transport;
