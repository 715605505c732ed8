//! Probe config loader (strict parsing).

pub mod schema;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use codeprobe_core::error::{CodeProbeError, Result};

pub use schema::{ProbeConfig, ProbeSection, ServerSection};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<ProbeConfig> {
    let s = fs::read_to_string(path.as_ref())
        .map_err(|e| CodeProbeError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

/// Load `path` if it exists, otherwise fall back to the built-in defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ProbeConfig> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(s) => load_from_str(&s),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            let cfg = ProbeConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
        Err(e) => Err(CodeProbeError::Internal(format!("read config failed: {e}"))),
    }
}

pub fn load_from_str(s: &str) -> Result<ProbeConfig> {
    let cfg: ProbeConfig = serde_yaml::from_str(s)
        .map_err(|e| CodeProbeError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
