mod config;
mod descriptor;
mod error;
mod llm;
mod server;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::llm::LlmEngine;

/// Generate production Dockerfiles from deployment metadata via an LLM.
#[derive(Debug, Parser)]
#[command(name = "dockerfile-generator", version, about)]
struct Cli {
    /// Path to config.toml (default: $XDG_CONFIG_HOME/dockerfile-generator/config.toml)
    #[arg(long, env = "DOCKERFILE_GENERATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides `bind` and BIND_ADDR
    #[arg(long)]
    bind: Option<String>,

    /// LLM backend (bedrock, gemini, mock), overrides `llm.backend` and LLM_BACKEND
    #[arg(long)]
    backend: Option<String>,

    /// Validate configuration and backend credentials, then exit
    #[arg(long)]
    check: bool,

    /// Print the default config file and exit
    #[arg(long)]
    default_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file (if present) before anything reads env vars
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.default_config {
        print!("{}", Config::default_config_contents());
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (config, llm) = match startup(&cli) {
        Ok(v) => v,
        Err(e) => {
            error!("startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        info!("config: OK");
        info!("  bind: {}", config.bind);
        info!("  llm_backend: {} ({})", llm.active_backend(), llm.backend_info());
        info!("  timeout_secs: {}", config.llm.timeout_secs);
        return ExitCode::SUCCESS;
    }

    info!(
        bind = %config.bind,
        backend = llm.active_backend(),
        "dockerfile-generator starting"
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let mut server_handle = tokio::spawn(server::serve(config, Arc::new(llm), shutdown_rx));

    let result = tokio::select! {
        res = &mut server_handle => res,
        _ = shutdown_signal() => {
            info!("shutdown signal received, stopping...");
            let _ = shutdown_tx.send(());
            server_handle.await
        }
    };

    match result {
        Ok(Ok(())) => {
            info!("dockerfile-generator stopped");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!("server error: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("server task failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Load and validate configuration and build the LLM engine.  Any error here
/// keeps the process from accepting requests.
fn startup(cli: &Cli) -> Result<(Config, LlmEngine)> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;

    if let Some(bind) = &cli.bind {
        config.bind = bind.clone();
    }
    if let Some(backend) = &cli.backend {
        config.llm.backend = backend.clone();
    }

    config.validate()?;
    let llm = LlmEngine::new(&config.llm)?;
    Ok((config, llm))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl+c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
