//! Config and cloud loading shared by the subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use autoscaler_core::Config;
use autoscaler_types::{CloudApi, InMemoryCloud};
use tracing::{error, info, warn};

pub fn load(config_path: &Path, cloud_state: Option<&Path>) -> anyhow::Result<(Config, Arc<dyn CloudApi>)> {
    let config = Config::from_file(config_path)?;
    info!(
        path = ?config_path,
        resources = config.resources.len(),
        handlers = config.handlers.len(),
        "config loaded"
    );

    let cloud = match cloud_state {
        Some(path) => {
            let cloud = InMemoryCloud::load(path)
                .with_context(|| format!("failed to load cloud state from {}", path.display()))?;
            info!(path = ?path, "cloud state loaded");
            cloud
        }
        None => {
            warn!("no --cloud-state given, starting with an empty in-memory cloud");
            InMemoryCloud::new()
        }
    };
    Ok((config, Arc::new(cloud)))
}

pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
