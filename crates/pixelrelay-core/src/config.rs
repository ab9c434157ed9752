use std::time::Duration;

/// Origins that may call the relay from a browser without any configuration:
/// local dev servers and the production landing hosts.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:3000",
    "http://localhost:3003",
    "https://one.invertimeonline.com",
    "https://two.invertimeonline.com",
    "https://three.invertimeonline.com",
    "https://four.invertimeonline.com",
];

pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com/v17.0";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub duckdb_memory_limit: String,
    /// Built-in origins followed by any from `PIXELRELAY_ALLOWED_ORIGINS`.
    pub allowed_origins: Vec<String>,
    pub graph_api_base: String,
    pub upstream_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3003,
            data_dir: "./data".to_string(),
            duckdb_memory_limit: "1GB".to_string(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|o| o.to_string())
                .collect(),
            graph_api_base: DEFAULT_GRAPH_API_BASE.to_string(),
            upstream_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();
        Ok(Self {
            port: std::env::var("PIXELRELAY_PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("PIXELRELAY_DATA_DIR").unwrap_or(defaults.data_dir),
            duckdb_memory_limit: std::env::var("PIXELRELAY_DUCKDB_MEMORY")
                .unwrap_or(defaults.duckdb_memory_limit),
            allowed_origins: {
                let mut origins = defaults.allowed_origins;
                if let Ok(extra) = std::env::var("PIXELRELAY_ALLOWED_ORIGINS") {
                    origins.extend(parse_origin_list(&extra));
                }
                origins
            },
            graph_api_base: std::env::var("PIXELRELAY_GRAPH_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.graph_api_base),
            upstream_timeout_secs: std::env::var("PIXELRELAY_UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.upstream_timeout_secs),
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// Split a comma-separated origin list. Trailing slashes are dropped because
/// browsers never send them in the `Origin` header.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
