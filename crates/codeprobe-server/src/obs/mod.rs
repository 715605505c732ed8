//! In-process probe metrics.
//!
//! Metrics are stored as atomics and rendered by the `/metrics` handler in the
//! Prometheus text exposition format.

pub mod metrics;

pub use metrics::{InFlightGuard, ProbeMetrics};
