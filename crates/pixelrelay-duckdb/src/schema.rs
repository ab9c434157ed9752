/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `PIXELRELAY_DUCKDB_MEMORY`, default `"1GB"`).
///
/// Timestamps are stored as naive UTC `TIMESTAMP`s. Callers bind them as
/// `%Y-%m-%d %H:%M:%S%.6f` strings and read them back with
/// `CAST(... AS VARCHAR)`; see [`crate::backend::format_ts`].
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- TRACKING RECORDS (one per visitor session)
-- ===========================================
CREATE TABLE IF NOT EXISTS tracking_records (
    id                  VARCHAR PRIMARY KEY,       -- UUID v4
    visit_uid           VARCHAR,                   -- correlation key shared with conversion_events
    page_id             VARCHAR(24) NOT NULL,      -- lowercase hex page reference
    total_active_time   BIGINT,                    -- seconds; NULL until the first heartbeat
    created_at          TIMESTAMP NOT NULL
);
-- KPI lookups: page + time window
CREATE INDEX IF NOT EXISTS idx_tracking_page_created
    ON tracking_records(page_id, created_at);

-- ===========================================
-- CONVERSION EVENTS (one per send attempt)
-- ===========================================
CREATE TABLE IF NOT EXISTS conversion_events (
    id                  VARCHAR PRIMARY KEY,       -- UUID v4
    visit_uid           VARCHAR,
    page_id             VARCHAR(24),               -- informational; never used to filter KPIs
    event_name          VARCHAR NOT NULL,          -- 'Purchase' | 'PageView' | ...
    pixel_id            VARCHAR NOT NULL,
    payload             VARCHAR NOT NULL,          -- outbound JSON as sent
    success             BOOLEAN NOT NULL,
    response            VARCHAR,                   -- upstream JSON body on success
    error               VARCHAR,                   -- upstream error detail on failure
    created_at          TIMESTAMP NOT NULL
);
-- KPI lookups: event name + time window
CREATE INDEX IF NOT EXISTS idx_conversion_name_created
    ON conversion_events(event_name, created_at);
"#
    )
}
