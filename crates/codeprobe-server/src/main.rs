//! codeprobe server
//!
//! - Probes `<base_url>/status/<code>` on a fixed interval
//! - Exposes `/metrics`, `/health`, `/`
//! - Config from `codeprobe.yaml` when present, defaults otherwise

use tracing_subscriber::{fmt, EnvFilter};

use codeprobe_core::error::Result;
use codeprobe_server::{config, server};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = config::load_or_default("codeprobe.yaml").map_err(|e| {
        tracing::error!(code = e.code().as_str(), error = %e, "config load failed");
        e
    })?;

    server::run(cfg, server::shutdown_signal()).await
}
