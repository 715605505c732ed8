//! Top-level facade crate for codeprobe.
//!
//! Re-exports core types and the server library so users can depend on a single crate.

pub mod core {
    pub use codeprobe_core::*;
}

pub mod server {
    pub use codeprobe_server::*;
}
