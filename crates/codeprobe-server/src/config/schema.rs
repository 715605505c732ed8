use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use codeprobe_core::error::{CodeProbeError, Result};
use codeprobe_core::CodeBucket;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub probe: ProbeSection,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            probe: ProbeSection::default(),
        }
    }
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(CodeProbeError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.probe.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            CodeProbeError::InvalidConfig(format!("server.listen must be a valid SocketAddr: {e}"))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "CodeBucket::defaults")]
    pub codes: Vec<CodeBucket>,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            codes: CodeBucket::defaults(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ProbeSection {
    pub fn validate(&self) -> Result<()> {
        let url = self.url()?;
        if url.host_str().is_none() {
            return Err(CodeProbeError::InvalidConfig(
                "probe.base_url must include a host".into(),
            ));
        }
        if self.codes.is_empty() {
            return Err(CodeProbeError::InvalidConfig("probe.codes must not be empty".into()));
        }
        let mut seen = self.codes.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.codes.len() {
            return Err(CodeProbeError::InvalidConfig(
                "probe.codes must not contain duplicates".into(),
            ));
        }
        if !(100..=3_600_000).contains(&self.interval_ms) {
            return Err(CodeProbeError::InvalidConfig(
                "probe.interval_ms must be between 100 and 3600000".into(),
            ));
        }
        if !(100..=120_000).contains(&self.timeout_ms) {
            return Err(CodeProbeError::InvalidConfig(
                "probe.timeout_ms must be between 100 and 120000".into(),
            ));
        }
        Ok(())
    }

    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| CodeProbeError::InvalidConfig(format!("probe.base_url: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(CodeProbeError::InvalidConfig(format!(
                "probe.base_url scheme must be http or https, got {other}"
            ))),
        }
    }

    /// Host shown on the status endpoint.
    pub fn target_host(&self) -> String {
        self.url()
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_else(|| self.base_url.clone())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}
fn default_base_url() -> String {
    "https://httpbin.org".into()
}
fn default_interval_ms() -> u64 {
    3000
}
fn default_timeout_ms() -> u64 {
    10000
}
