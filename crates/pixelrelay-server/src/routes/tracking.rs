use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use pixelrelay_core::{event::TrackingRecord, page::PageRef};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrackingRequest {
    pub page_id: Option<String>,
    pub visit_uid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveTimeRequest {
    pub seconds: i64,
}

/// `POST /api/tracking` — open a visitor session on a landing page.
///
/// A `visitUid` is generated when the page does not send one; the page keeps
/// it and passes it to `/send-event` so conversions can be joined back.
///
/// ## Response
/// `201 Created` with `{ id, visitUid, pageId, createdAt }`.
#[tracing::instrument(skip(state, body))]
pub async fn create_tracking(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateTrackingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body?;
    let raw_page = req
        .page_id
        .ok_or_else(|| AppError::BadRequest("pageId is required".to_string()))?;
    let page_id = PageRef::parse(&raw_page)
        .map_err(|e| AppError::BadRequest(format!("invalid pageId: {e}")))?;

    let visit_uid = req
        .visit_uid
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let record = TrackingRecord {
        id: uuid::Uuid::new_v4().to_string(),
        visit_uid: Some(visit_uid),
        page_id,
        created_at: Utc::now(),
        total_active_time: None,
    };
    state.db.insert_tracking_record(&record).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": record.id,
            "visitUid": record.visit_uid,
            "pageId": record.page_id,
            "createdAt": record.created_at,
        })),
    ))
}

/// `POST /api/tracking/{id}/active-time` — add foreground seconds to a session.
#[tracing::instrument(skip(state, body))]
pub async fn add_active_time(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<ActiveTimeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body?;
    if req.seconds < 0 {
        return Err(AppError::BadRequest(
            "seconds must be non-negative".to_string(),
        ));
    }

    let total = state
        .db
        .add_active_time(&id, req.seconds as u64)
        .await?
        .ok_or_else(|| AppError::NotFound("Tracking record not found".to_string()))?;

    Ok(Json(json!({
        "id": id,
        "totalActiveTime": total,
    })))
}
