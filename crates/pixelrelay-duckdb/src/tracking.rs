use anyhow::Result;

use pixelrelay_core::event::TrackingRecord;

use crate::backend::format_ts;
use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Insert one tracking record. `id` must be unique.
    pub async fn insert_tracking_record(&self, record: &TrackingRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO tracking_records (id, visit_uid, page_id, total_active_time, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            duckdb::params![
                record.id,
                record.visit_uid,
                record.page_id.to_string(),
                record.total_active_time.map(clamp_secs),
                format_ts(record.created_at),
            ],
        )?;
        Ok(())
    }

    /// Add `seconds` to a record's `total_active_time` (NULL counts as 0).
    ///
    /// The total saturates at `i64::MAX` instead of overflowing the BIGINT
    /// column. Returns the new total, or `None` when no record has `id`.
    pub async fn add_active_time(&self, id: &str, seconds: u64) -> Result<Option<u64>> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE tracking_records \
             SET total_active_time = CASE \
                 WHEN COALESCE(total_active_time, 0) > ?1 - ?2 THEN ?1 \
                 ELSE COALESCE(total_active_time, 0) + ?2 END \
             WHERE id = ?3",
            duckdb::params![i64::MAX, clamp_secs(seconds), id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        let mut stmt =
            conn.prepare("SELECT total_active_time FROM tracking_records WHERE id = ?1")?;
        let total: i64 = stmt.query_row(duckdb::params![id], |row| row.get(0))?;
        Ok(Some(total.max(0) as u64))
    }
}

fn clamp_secs(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}
