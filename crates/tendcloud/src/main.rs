//! tendcloud daemon
//!
//! Reconciles managed cloud resources against a desired state document,
//! serving pass results over HTTP while a timer watches the document.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use kameo::actor::Spawn;
use tendcloud_core::{ControllerActor, ControllerActorArgs, Reconciler};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogFormat};
use crate::source::TomlFileSource;
use crate::state::AppState;

mod api;
mod config;
mod factory;
mod router;
mod source;
mod state;
mod ticker;

#[derive(Parser)]
#[command(name = "tendcloud")]
#[command(about = "Declarative reconciliation daemon for managed cloud resources", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $TENDCLOUD_CONFIG or the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address from the configuration
    #[arg(long)]
    bind: Option<String>,

    /// Run a single pass, print its result as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    if let Some(bind) = cli.bind {
        config.daemon.bind = bind;
    }

    init_tracing(&config)?;

    let source = Arc::new(TomlFileSource::new(&config.desired_state));
    info!(path = %source.path().display(), "watching desired state");
    let reconciler = Arc::new(Reconciler::new(
        source,
        factory::create_factory(&config.provider),
        config.waiter.poller(),
    ));

    if cli.once {
        let result = reconciler.run_pass().await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        if let Some(error) = result.error {
            return Err(eyre::eyre!("pass aborted: {error}"));
        }
        return Ok(());
    }

    let controller = ControllerActor::spawn(ControllerActorArgs { reconciler });
    let ticker = tokio::spawn(ticker::run(
        controller.clone(),
        config.daemon.tick_interval(),
    ));

    let bind = config.daemon.bind.clone();
    let state = Arc::new(AppState::new(controller.clone()));
    let app = router::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(address = %bind, "tendcloud daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    ticker.abort();
    controller.stop_gracefully().await.ok();
    Ok(())
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.daemon.log_level)?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.daemon.log_format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
