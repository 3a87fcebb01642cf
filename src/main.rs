// src/main.rs

use std::{future::IntoFuture, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use keepsake::api::http::http_router;
use keepsake::config::CONFIG;
use keepsake::memory::features::backfill::spawn_backfill_sweep;
use keepsake::state::create_app_state;

#[derive(Debug, Parser)]
#[command(name = "keepsake", about = "Long-term memory service for AI companions")]
struct Cli {
    /// Bind host (overrides KEEPSAKE_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides KEEPSAKE_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Disable the background vector backfill sweep
    #[arg(long)]
    no_backfill: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(
            CONFIG
                .log_level
                .parse::<tracing::Level>()
                .unwrap_or(tracing::Level::INFO),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting keepsake memory service");
    info!("Database: {}", CONFIG.database_url);
    info!("Vector backend: {}", CONFIG.qdrant_url);

    let app_state = Arc::new(create_app_state().await?);

    let backfill_handle = if cli.no_backfill {
        None
    } else {
        let interval = Duration::from_secs(CONFIG.backfill_interval_secs);
        info!("Backfill sweep running every {} seconds", interval.as_secs());
        Some(spawn_backfill_sweep(
            app_state.memory.clone(),
            interval,
            CONFIG.backfill_batch_size,
        ))
    };

    let app = http_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            CONFIG.request_timeout_secs,
        )))
        .layer(CorsLayer::permissive());

    let host = cli.host.unwrap_or_else(|| CONFIG.host.clone());
    let port = cli.port.unwrap_or(CONFIG.port);
    let bind_address = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on http://{}", bind_address);

    let server = axum::serve(listener, app).into_future();
    match backfill_handle {
        Some(handle) => {
            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!("Server error: {e}");
                    }
                }
                _ = handle => {
                    error!("Backfill sweep unexpectedly terminated");
                }
            }
        }
        None => {
            if let Err(e) = server.await {
                error!("Server error: {e}");
            }
        }
    }

    Ok(())
}
