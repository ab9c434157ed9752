use anyhow::Result;

use pixelrelay_core::event::ConversionEvent;

use crate::backend::format_ts;
use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Persist one send attempt, successful or not.
    pub async fn insert_conversion_event(&self, event: &ConversionEvent) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO conversion_events (
                id, visit_uid, page_id, event_name, pixel_id,
                payload, success, response, error, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10
            )"#,
            duckdb::params![
                event.id,
                event.visit_uid,
                event.page_id.map(|p| p.to_string()),
                event.event_name,
                event.pixel_id,
                event.payload,
                event.success,
                event.response,
                event.error,
                format_ts(event.created_at),
            ],
        )?;
        tracing::debug!(
            event_name = %event.event_name,
            success = event.success,
            "Conversion event stored"
        );
        Ok(())
    }
}
