use anyhow::{Context, Result};
use serde::Serialize;

use pixelrelay_core::event::{ConversionEvent, TimeRange};
use pixelrelay_core::page::PageRef;

use crate::backend::{format_ts, parse_ts};
use crate::DuckDbBackend;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

struct RawEvent {
    id: String,
    visit_uid: Option<String>,
    page_id: Option<String>,
    event_name: String,
    pixel_id: String,
    payload: String,
    success: bool,
    response: Option<String>,
    error: Option<String>,
    created_at: String,
}

impl RawEvent {
    fn into_event(self) -> Result<ConversionEvent> {
        let page_id = self
            .page_id
            .as_deref()
            .map(PageRef::parse)
            .transpose()
            .with_context(|| format!("bad page_id on conversion event {}", self.id))?;
        Ok(ConversionEvent {
            page_id,
            created_at: parse_ts(&self.created_at)?,
            id: self.id,
            visit_uid: self.visit_uid,
            event_name: self.event_name,
            pixel_id: self.pixel_id,
            payload: self.payload,
            success: self.success,
            response: self.response,
            error: self.error,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        visit_uid,
        page_id,
        event_name,
        pixel_id,
        payload,
        success,
        response,
        error,
        CAST(created_at AS VARCHAR) AS created_at
    FROM conversion_events
"#;

fn read_row(row: &duckdb::Row<'_>) -> duckdb::Result<RawEvent> {
    Ok(RawEvent {
        id: row.get(0)?,
        visit_uid: row.get(1)?,
        page_id: row.get(2)?,
        event_name: row.get(3)?,
        pixel_id: row.get(4)?,
        payload: row.get(5)?,
        success: row.get(6)?,
        response: row.get(7)?,
        error: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Events named `event_name` created inside `range` (inclusive), oldest first.
pub async fn find_events_inner(
    db: &DuckDbBackend,
    event_name: &str,
    range: &TimeRange,
) -> Result<Vec<ConversionEvent>> {
    let conn = db.conn.lock().await;
    let sql = format!(
        "{SELECT_COLUMNS} \
         WHERE event_name = ?1 AND created_at >= ?2 AND created_at <= ?3 \
         ORDER BY created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        duckdb::params![event_name, format_ts(range.from), format_ts(range.to)],
        read_row,
    )?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?.into_event()?);
    }
    Ok(events)
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsPagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct EventsPage {
    pub rows: Vec<ConversionEvent>,
    pub pagination: EventsPagination,
}

/// Newest-first page of stored send attempts, optionally filtered by name.
///
/// `limit` is clamped to `1..=MAX_LIST_LIMIT`; a negative `offset` is treated as 0.
pub async fn list_events_inner(
    db: &DuckDbBackend,
    event_name: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<EventsPage> {
    let limit = limit.clamp(1, MAX_LIST_LIMIT);
    let offset = offset.max(0);
    let conn = db.conn.lock().await;

    let mut where_sql = String::from("WHERE 1 = 1");
    let mut params: Vec<Box<dyn duckdb::types::ToSql>> = Vec::new();
    if let Some(name) = event_name {
        where_sql.push_str(" AND event_name = ?1");
        params.push(Box::new(name.to_string()));
    }
    let param_refs: Vec<&dyn duckdb::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let total_sql = format!("SELECT COUNT(*) FROM conversion_events {where_sql}");
    let total: i64 = conn
        .prepare(&total_sql)?
        .query_row(param_refs.as_slice(), |row| row.get(0))?;

    let rows_sql = format!(
        "{SELECT_COLUMNS} {where_sql} \
         ORDER BY created_at DESC, id DESC \
         LIMIT {limit} OFFSET {offset}"
    );
    let mut stmt = conn.prepare(&rows_sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), read_row)?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?.into_event()?);
    }

    Ok(EventsPage {
        rows: events,
        pagination: EventsPagination {
            total,
            limit,
            offset,
        },
    })
}
