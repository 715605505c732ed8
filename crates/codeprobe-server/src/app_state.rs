//! Shared application state for the HTTP front.
//!
//! Holds the config and the metrics registry. The same `Arc<ProbeMetrics>`
//! is handed to the prober at startup, so handlers only ever read what the
//! prober writes.

use std::sync::Arc;

use codeprobe_core::error::Result;

use crate::config::ProbeConfig;
use crate::obs::ProbeMetrics;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    metrics: Arc<ProbeMetrics>,
}

struct AppStateInner {
    cfg: ProbeConfig,
    target_host: String,
}

impl AppState {
    /// Build application state from a config.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: ProbeConfig) -> Result<Self> {
        Self::with_metrics(cfg, Arc::new(ProbeMetrics::new()))
    }

    /// Same as [`AppState::new`] but with a caller-provided registry.
    pub fn with_metrics(cfg: ProbeConfig, metrics: Arc<ProbeMetrics>) -> Result<Self> {
        cfg.validate()?;
        let target_host = cfg.probe.target_host();

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, target_host }),
            metrics,
        })
    }

    pub fn cfg(&self) -> &ProbeConfig {
        &self.inner.cfg
    }

    pub fn target_host(&self) -> &str {
        &self.inner.target_host
    }

    pub fn metrics(&self) -> Arc<ProbeMetrics> {
        Arc::clone(&self.metrics)
    }
}
