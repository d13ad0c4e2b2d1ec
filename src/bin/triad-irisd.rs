//! triad-irisd: the Iris prediction server.
//!
//! Serves the routes in [`triad_iris::server`]. Bind address and port come
//! from the config file, then `TRIAD_SERVER_BIND` / `TRIAD_SERVER_PORT`,
//! then the command line. With `--config` and `--model-dir` (or
//! `TRIAD_MODEL_DIR`) no home directory is needed.
//!
//! Build and run: `cargo run --features server --bin triad-irisd`

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use miette::{IntoDiagnostic, Result};

use triad_iris::config::Settings;
use triad_iris::error::ModelError;
use triad_iris::paths;
use triad_iris::predictor::Predictor;
use triad_iris::server::{self, AppState};

#[derive(Parser)]
#[command(name = "triad-irisd", version, about = "Iris prediction HTTP server")]
struct Args {
    #[arg(long)]
    bind: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    model_dir: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Load (or train) every model before accepting requests.
    #[arg(long)]
    warm: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let Settings {
        mut config,
        model_dir,
        ..
    } = Settings::resolve(args.config.as_deref(), args.model_dir.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    paths::ensure_dir(&model_dir)?;

    let predictor = Predictor::from_config(&config, &model_dir)?;
    if args.warm {
        let cache = Arc::clone(predictor.cache());
        tokio::task::spawn_blocking(move || cache.warm_all())
            .await
            .map_err(ModelError::from)??;
    }

    let state = Arc::new(AppState::new(predictor));
    let app = server::router(state);

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .into_diagnostic()?;
    tracing::info!(addr = %addr, model_dir = %model_dir.display(), "triad-irisd listening");

    // Serve with graceful shutdown on SIGTERM/SIGINT.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    tracing::info!("triad-irisd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("triad-irisd shutting down");
}
