use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use pixelrelay_server::state::AppState;

/// `pixelrelay health` — liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$PIXELRELAY_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("PIXELRELAY_PORT").unwrap_or_else(|_| "3003".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }
    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pixelrelay=info".parse()?),
        )
        .json()
        .init();

    let cfg = pixelrelay_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/pixelrelay.db", cfg.data_dir);
    let db = pixelrelay_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    info!(
        origins = cfg.allowed_origins.len(),
        graph_api_base = %cfg.graph_api_base,
        "Conversions relay configured"
    );

    let state = Arc::new(AppState::new(db, cfg.clone())?);

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = pixelrelay_server::app::build_app(state);

    info!(port = cfg.port, "Pixelrelay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
