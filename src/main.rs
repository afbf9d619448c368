//! Face Verification Service
//!
//! 1:N face identification over an enrolled gallery, OpenVINO-backed,
//! served over REST (Axum).

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use veriface::api::rest::{create_rest_router, AppState};
use veriface::engine::extractor::OpenVinoExtractor;
use veriface::engine::model::ModelStack;
use veriface::gallery::SqliteGallery;
use veriface::verify::VerificationService;
use veriface::Config;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!(
        "Starting Face Verification Service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::load(Config::default_path()).unwrap_or_else(|e| {
        info!("Using default config ({})", e);
        Config::default()
    });

    info!("Configuration loaded:");
    info!("  Port: {}", config.server.port);
    info!("  Device: {}", config.models.device);
    info!("  Match threshold: {}", config.verify.match_threshold);
    info!("  Batch size: {}", config.verify.batch_size);
    info!("  Request timeout: {}s", config.server.request_timeout_secs);

    // Models are compiled once here; a load failure aborts startup.
    let stack = ModelStack::load(&config.models)?;
    let extractor = Arc::new(OpenVinoExtractor::new(&stack, &config.verify));
    info!("Models loaded and compiled");

    let db_path = config
        .gallery
        .sqlite_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("non-UTF8 gallery path"))?;
    let gallery = Arc::new(SqliteGallery::new(db_path).await?);
    info!("Gallery initialized at: {}", db_path);

    let service = Arc::new(VerificationService::new(
        extractor,
        gallery,
        &config.verify,
    ));

    let app_state = Arc::new(AppState {
        service,
        models_ready: true,
        start_time: Instant::now(),
    });

    let router = create_rest_router(app_state, &config);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("REST API listening on http://{}", addr);
    info!("Face Verification Service is ready!");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;

    info!("Goodbye!");
    Ok(())
}
