use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{error, info};

use polystore::{Backends, Config, router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;
    polystore::telemetry::init(&cfg.loglevel, cfg.log_format());

    info!(
        env = %cfg.server.env,
        listen_addr = %cfg.server.listen_addr,
        relational = ?cfg.database.relational.activate,
        redis = ?cfg.database.redis.activate,
        mongodb = ?cfg.database.mongodb.activate,
        "configuration loaded"
    );

    // No degraded mode: without its declared backends the service does not start.
    let backends = match Backends::connect(&cfg.database).await {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "backend initialization failed; shutting down");
            return Err(e.into());
        }
    };

    let state = router::AppState::new(backends);
    let app = router::app_router(state);

    let listener = TcpListener::bind(&cfg.server.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.server.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}
