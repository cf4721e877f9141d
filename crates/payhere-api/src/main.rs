//! payhere API Server
//!
//! Usage:
//!   payhere-api serve [-c config/server.toml] [--in-memory]
//!
//! Author: hephaex@gmail.com

use clap::{Args, Parser, Subcommand};
use payhere_api::auth::{PasswordConfig, TokenService};
use payhere_api::create_router;
use payhere_api::state::{AppState, Repositories};
use payhere_core::config::{AppConfig, AuthConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "payhere-api")]
#[command(about = "REST API server for the payhere point-of-sale backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (the default)
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Configuration file; defaults apply when it does not exist
    #[arg(short = 'c', long, default_value = "config/server.toml")]
    config_path: PathBuf,

    /// Keep all data in memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            in_memory: false,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = AppConfig::load(&args.config_path)?;
    init_tracing(&config);

    if config.auth.jwt_secret == AuthConfig::default().jwt_secret {
        warn!("Using the development JWT secret; set JWT_SECRET in production");
    }

    let state = if args.in_memory {
        info!("Using in-memory storage");
        AppState::new(
            config,
            Repositories::in_memory(),
            PasswordConfig::minimal(),
        )
    } else {
        let repositories = Repositories::postgres(&config).await?;
        AppState::new(config, repositories, PasswordConfig::default())
    };
    let state = Arc::new(state);

    let sweep = match state.config.auth.blacklist_sweep_interval_secs {
        0 => None,
        secs => Some(spawn_revocation_sweep(
            state.tokens.clone(),
            Duration::from_secs(secs),
        )),
    };

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("payhere API Server starting on http://{}", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweep) = sweep {
        sweep.abort();
    }
    info!("Server stopped");

    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level applies to this
/// workspace and tower-http
fn init_tracing(config: &AppConfig) {
    let level = &config.logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("payhere_api={level},payhere_core={level},tower_http={level},audit=info").into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Periodically delete revocation records of expired tokens
fn spawn_revocation_sweep(tokens: TokenService, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Revocation sweep enabled");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = tokens.prune_expired().await {
                warn!(error = %e, "Revocation sweep failed");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                futures::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    futures::pin_mut!(ctrl_c, terminate);
    futures::future::select(ctrl_c, terminate).await;

    info!("Shutdown signal received");
}
