use anyhow::{Context, Result};

use pixelrelay_core::event::{TimeRange, TrackingRecord};
use pixelrelay_core::page::PageRef;

use crate::backend::{format_ts, parse_ts};
use crate::DuckDbBackend;

struct RawTracking {
    id: String,
    visit_uid: Option<String>,
    page_id: String,
    total_active_time: Option<i64>,
    created_at: String,
}

impl RawTracking {
    fn into_record(self) -> Result<TrackingRecord> {
        Ok(TrackingRecord {
            page_id: PageRef::parse(&self.page_id)
                .with_context(|| format!("bad page_id on tracking record {}", self.id))?,
            created_at: parse_ts(&self.created_at)?,
            total_active_time: self.total_active_time.map(|t| t.max(0) as u64),
            visit_uid: self.visit_uid,
            id: self.id,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        visit_uid,
        page_id,
        total_active_time,
        CAST(created_at AS VARCHAR) AS created_at
    FROM tracking_records
"#;

fn read_row(row: &duckdb::Row<'_>) -> duckdb::Result<RawTracking> {
    Ok(RawTracking {
        id: row.get(0)?,
        visit_uid: row.get(1)?,
        page_id: row.get(2)?,
        total_active_time: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Tracking records for `page_id` created inside `range` (inclusive), oldest first.
pub async fn find_tracking_inner(
    db: &DuckDbBackend,
    page_id: &PageRef,
    range: &TimeRange,
) -> Result<Vec<TrackingRecord>> {
    let conn = db.conn.lock().await;
    let sql = format!(
        "{SELECT_COLUMNS} \
         WHERE page_id = ?1 AND created_at >= ?2 AND created_at <= ?3 \
         ORDER BY created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        duckdb::params![
            page_id.to_string(),
            format_ts(range.from),
            format_ts(range.to)
        ],
        read_row,
    )?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

/// Single tracking record by id.
pub async fn get_tracking_inner(db: &DuckDbBackend, id: &str) -> Result<Option<TrackingRecord>> {
    let conn = db.conn.lock().await;
    let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(duckdb::params![id], read_row)?;
    let row = rows.next().transpose()?;
    row.map(RawTracking::into_record).transpose()
}
