use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tether_runtime::{HostEnvironment, TracingLogger};
use tracing::info;

use crate::config::TetherConfig;
use crate::host::LocalHost;
use crate::notifier::ConsoleNotifier;

/// Host the configured plugin until Ctrl-C
pub async fn execute(config: &TetherConfig, dev: bool, plugin_dir: Option<PathBuf>) -> Result<()> {
    let environment = HostEnvironment {
        dev_mode: dev || config.host.dev_mode,
        plugin_dir: plugin_dir.unwrap_or_else(|| config.host.plugin_dir()),
    };
    info!(
        plugin = %config.bridge.plugin_name,
        dev_mode = environment.dev_mode,
        plugin_dir = %environment.plugin_dir.display(),
        "Starting host"
    );

    let host = LocalHost::new(
        config.bridge.clone(),
        environment,
        Arc::new(TracingLogger),
        Arc::new(ConsoleNotifier),
    );

    // Native initialize may block; keep it off the async workers
    let starter = host.clone();
    tokio::task::spawn_blocking(move || starter.start())
        .await
        .context("Host start task failed")??;

    info!(plugin = %host.plugin_name(), "Plugin running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!(status = ?host.status(), "Shutting down");
    tokio::task::spawn_blocking(move || host.shutdown())
        .await
        .context("Host shutdown task failed")?;
    Ok(())
}
