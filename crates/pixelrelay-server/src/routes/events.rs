use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use pixelrelay_duckdb::queries::events::DEFAULT_LIST_LIMIT;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub event_name: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /api/events` — stored send attempts, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let event_name = query
        .event_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let page = state
        .db
        .list_conversion_events(
            event_name,
            query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
            query.offset.unwrap_or(0),
        )
        .await?;

    Ok(Json(json!({
        "data": page.rows,
        "pagination": page.pagination,
    })))
}
