//! Outbound HTTP transport used by the prober.
//!
//! The prober only needs "GET this URL within this timeout", so the seam is a
//! single-method trait. The production implementation lives in [`http`].

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use codeprobe_core::FailureKind;

pub use http::ReqwestTransport;

#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Issue one GET and read the response to completion.
    ///
    /// Returns the HTTP status on any completed exchange (including 4xx/5xx);
    /// `Err` only for request-layer failures.
    async fn get(&self, url: &Url, timeout: Duration) -> Result<u16, FailureKind>;
}
