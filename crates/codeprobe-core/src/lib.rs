//! codeprobe core: transport-agnostic probe primitives and the shared error type.
//!
//! This crate defines the values that flow between the prober, the metrics
//! registry, and the config loader. It carries no runtime or HTTP
//! dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bucket;
pub mod error;
pub mod failure;

pub use bucket::CodeBucket;
pub use error::{CodeProbeError, ErrorCode, Result};
pub use failure::FailureKind;
