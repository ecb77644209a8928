pub mod config;
pub mod error;
pub mod images;
pub mod posts;
pub mod routes;
pub mod state;

use axum::Router;
use axum::http::StatusCode;
use clap::Parser;
use config::Config;
use dotenvy::dotenv;
use error::ServerError;
use miette::miette;
use quill_common::telemetry::{self, TelemetryConfig};
use state::AppState;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "QUILL_CONFIG",
        default_value = "quill-config.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let config = initialize()?;

    let addr = config.core.listen_addr.clone();
    info!("Starting server on {}", addr);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    axum::serve(listener, router(config))
        .await
        .map_err(|source| ServerError::Serve { source })?;
    Ok(())
}

pub fn router(cfg: Config) -> Router {
    let upload_limit = cfg.upload_limit();
    let timeout = cfg.core.request_timeout();
    let app_state = AppState::new(cfg);

    // The first layer is the innermost.
    Router::new()
        .merge(routes::router(upload_limit))
        .layer(timeout_layer(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Requests still running after `timeout` are answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

pub fn initialize() -> miette::Result<Config> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .map_err(|e| miette!("Failed to set miette hook: {}", e))?;
    miette::set_panic_hook();
    dotenv().ok();

    telemetry::init(TelemetryConfig::from_env(env!("CARGO_PKG_NAME")))
        .map_err(|e| miette!("Failed to initialize tracing: {}", e))?;

    let cli = Cli::parse();
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            warn!("{}; falling back to defaults", e);
            Config::default()
        }
    };
    info!(
        listen_addr = %config.core.listen_addr,
        image_dir = %config.storage.image_dir.display(),
        upload_limit = config.upload_limit(),
        "configuration loaded"
    );
    Ok(config)
}
