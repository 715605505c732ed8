//! `reqwest`-backed probe transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use codeprobe_core::error::{CodeProbeError, Result};
use codeprobe_core::FailureKind;

use super::ProbeTransport;

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("codeprobe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CodeProbeError::Internal(format!("http client build failed: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProbeTransport for ReqwestTransport {
    async fn get(&self, url: &Url, timeout: Duration) -> std::result::Result<u16, FailureKind> {
        let resp = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(&e))?;
        let status = resp.status().as_u16();
        // Latency covers the full body, not just the headers.
        resp.bytes().await.map_err(|e| classify(&e))?;
        Ok(status)
    }
}

/// Map a `reqwest` error onto a stable failure label.
///
/// Timeout is checked first: a connect timeout reports both `is_timeout` and
/// `is_connect`.
pub fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Connect
    } else if err.is_redirect() {
        FailureKind::Redirect
    } else if err.is_body() {
        FailureKind::Body
    } else if err.is_decode() {
        FailureKind::Decode
    } else if err.is_builder() {
        FailureKind::Builder
    } else if err.is_request() {
        FailureKind::Request
    } else {
        FailureKind::Other
    }
}
