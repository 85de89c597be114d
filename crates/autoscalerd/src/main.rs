//! autoscalerd — the autoscaler daemon.
//!
//! Loads `autoscaler.toml`, builds the core with its handlers and serves
//! the scaling API. On Ctrl-C the API stops accepting connections and the
//! core waits up to `shutdown_grace_period` for running jobs.
//!
//! # Usage
//!
//! ```text
//! autoscalerd start --config autoscaler.toml --listen 127.0.0.1:8080
//! autoscalerd validate --config autoscaler.toml --cloud-state cloud.json
//! autoscalerd resources --config autoscaler.toml --cloud-state cloud.json
//! ```

mod setup;

use std::net::SocketAddr;
use std::path::PathBuf;

use autoscaler_core::Core;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::info;

const DEFAULT_LOG_FILTER: &str = "info,autoscalerd=debug,autoscaler_core=debug,autoscaler_handlers=debug";

#[derive(Parser)]
#[command(name = "autoscalerd", about = "Autoscaler daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the scaling API.
    Start {
        /// Path to autoscaler.toml.
        #[arg(long, default_value = "autoscaler.toml")]
        config: PathBuf,

        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: SocketAddr,

        /// JSON file seeding the in-memory cloud.
        #[arg(long)]
        cloud_state: Option<PathBuf>,
    },

    /// Check the configuration, handler health and resource selectors.
    Validate {
        #[arg(long, default_value = "autoscaler.toml")]
        config: PathBuf,

        #[arg(long)]
        cloud_state: Option<PathBuf>,
    },

    /// Print the configured resources and what they resolve to.
    Resources {
        #[arg(long, default_value = "autoscaler.toml")]
        config: PathBuf,

        #[arg(long)]
        cloud_state: Option<PathBuf>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Start {
            config,
            listen,
            cloud_state,
        } => run_start(config, listen, cloud_state).await,
        Command::Validate { config, cloud_state } => {
            let (config, cloud) = setup::load(&config, cloud_state.as_deref())?;
            autoscaler_core::validate(&config, cloud.as_ref()).await?;
            println!("configuration is valid");
            Ok(())
        }
        Command::Resources { config, cloud_state } => {
            let (config, cloud) = setup::load(&config, cloud_state.as_deref())?;
            let tree = autoscaler_core::tree::build_tree(cloud.as_ref(), &config.resources).await;
            print!("{}", tree.render());
            Ok(())
        }
    }
}

async fn run_start(config_path: PathBuf, listen: SocketAddr, cloud_state: Option<PathBuf>) -> anyhow::Result<()> {
    info!("autoscalerd starting");

    let (config, cloud) = setup::load(&config_path, cloud_state.as_deref())?;
    config.validate()?;
    let grace = config.autoscaler.shutdown_grace_period();
    let core = Core::new(config, cloud)?;
    info!(config = ?config_path, "core initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let stopper = {
        let core = core.clone();
        tokio::spawn(async move {
            let _ = shutdown_rx.changed().await;
            core.stop(grace).await
        })
    };

    // ── Start API server ───────────────────────────────────────

    let router = autoscaler_api::build_router(core);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(addr = %listen, "API server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            setup::shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    stopper.await??;
    info!("autoscalerd stopped");
    Ok(())
}
