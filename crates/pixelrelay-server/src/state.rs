use std::sync::Arc;

use anyhow::Result;

use pixelrelay_core::config::Config;
use pixelrelay_duckdb::DuckDbBackend;

use crate::publisher::{ConversionPublisher, GraphApiPublisher};

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// The DuckDB backend. Internally uses `Arc<tokio::sync::Mutex<Connection>>`
    /// so it is already cheap to share and async-safe.
    pub db: Arc<DuckDbBackend>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Client for the conversions API. Replaced by a recording fake in tests.
    pub publisher: Arc<dyn ConversionPublisher>,
}

impl AppState {
    /// Construct a state that publishes to the configured Graph API base URL.
    pub fn new(db: DuckDbBackend, config: Config) -> Result<Self> {
        let publisher = GraphApiPublisher::new(&config.graph_api_base, config.upstream_timeout())?;
        Ok(Self::with_publisher(db, config, Arc::new(publisher)))
    }

    pub fn with_publisher(
        db: DuckDbBackend,
        config: Config,
        publisher: Arc<dyn ConversionPublisher>,
    ) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            publisher,
        }
    }
}
