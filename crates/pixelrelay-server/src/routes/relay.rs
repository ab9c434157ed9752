use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use pixelrelay_core::{
    event::{ConversionEvent, ConversionPayload, SendEventRequest, ServerEvent, UserData},
    page::PageRef,
};

use crate::{error::AppError, state::AppState};

/// Hashed address used by the canned test events.
const TEST_EMAIL_HASH: &str = "7b17fb0bd173f625b58636fb796407c22b3d16fc78302d79f0fd30c2fc2fc068";

/// Body of the canned test endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub access_token: Option<String>,
    pub pixel_id: Option<String>,
}

/// Where a payload goes and which visit it belongs to.
struct Destination {
    pixel_id: String,
    access_token: String,
    visit_uid: Option<String>,
    page_id: Option<PageRef>,
}

fn required(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

fn credentials(
    access_token: Option<String>,
    pixel_id: Option<String>,
) -> Result<(String, String), AppError> {
    let access_token = required(access_token, "accessToken is required")?;
    let pixel_id = required(pixel_id, "pixelId is required")?;
    // The pixel id becomes a path segment of the upstream URL.
    if !pixel_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest("pixelId must be numeric".to_string()));
    }
    Ok((access_token, pixel_id))
}

/// Publish `payload`, persist the attempt, and shape the HTTP answer.
///
/// The attempt is stored whether or not the publish succeeded. A failed
/// write is logged; it does not change what the caller is told about the
/// send itself, which has already happened.
async fn relay(
    state: &AppState,
    dest: Destination,
    payload: ConversionPayload,
    success_message: &str,
    failure_message: &str,
) -> Result<Json<Value>, AppError> {
    let payload_json = serde_json::to_string(&payload).map_err(anyhow::Error::from)?;

    info!(
        event_name = payload.event_name(),
        pixel_id = %dest.pixel_id,
        "Sending conversion event"
    );

    let result = state
        .publisher
        .publish(&dest.pixel_id, &dest.access_token, &payload)
        .await;

    let record = ConversionEvent {
        id: uuid::Uuid::new_v4().to_string(),
        visit_uid: dest.visit_uid,
        page_id: dest.page_id,
        event_name: payload.event_name().to_string(),
        pixel_id: dest.pixel_id,
        payload: payload_json,
        success: result.is_ok(),
        response: result.as_ref().ok().map(Value::to_string),
        error: result.as_ref().err().map(|e| e.details.to_string()),
        created_at: Utc::now(),
    };
    if let Err(e) = state.db.insert_conversion_event(&record).await {
        tracing::error!(
            error = %e,
            event_id = %record.id,
            "Failed to persist conversion event"
        );
    }

    match result {
        Ok(response) => Ok(Json(json!({
            "success": true,
            "message": success_message,
            "response": response
        }))),
        Err(err) => Err(AppError::Upstream {
            message: failure_message.to_string(),
            details: err.details,
        }),
    }
}

/// `POST /send-event` — normalize a browser event and forward it.
///
/// ## Validation
/// - `eventData` with `event_name`, `event_time` and `user_data` (400 otherwise)
/// - `accessToken`, `pixelId` (400 when missing; `pixelId` must be numeric)
/// - `pageId`, when present, must be a valid page reference
///
/// ## Response
/// `200` with `{ success, message, response }`; `500` `upstream_error` with
/// the API's error body when the publish fails.
#[tracing::instrument(skip(state, body))]
pub async fn send_event(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SendEventRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body?;
    let event = req
        .event_data
        .and_then(ServerEvent::from_client)
        .ok_or_else(|| AppError::BadRequest("incomplete event data".to_string()))?;
    let (access_token, pixel_id) = credentials(req.access_token, req.pixel_id)?;
    let page_id = req
        .page_id
        .as_deref()
        .map(PageRef::parse)
        .transpose()
        .map_err(|e| AppError::BadRequest(format!("invalid pageId: {e}")))?;

    let dest = Destination {
        pixel_id,
        access_token,
        visit_uid: req.visit_uid.filter(|v| !v.trim().is_empty()),
        page_id,
    };
    relay(
        &state,
        dest,
        ConversionPayload::single(event),
        "Event sent",
        "Error sending event",
    )
    .await
}

fn test_purchase_event(now: i64) -> ServerEvent {
    ServerEvent {
        event_name: "Purchase".to_string(),
        event_time: now,
        action_source: "website".to_string(),
        user_data: UserData {
            em: vec![Some(TEST_EMAIL_HASH.to_string())],
            ph: vec![None],
        },
        attribution_data: Some(json!({ "attribution_share": "0.3" })),
        custom_data: json!({ "currency": "USD", "value": "1" }),
        original_event_data: json!({ "event_name": "Purchase", "event_time": now }),
    }
}

fn test_pageview_event(now: i64) -> ServerEvent {
    ServerEvent {
        event_name: "PageView".to_string(),
        event_time: now,
        action_source: "website".to_string(),
        user_data: UserData {
            em: vec![Some(TEST_EMAIL_HASH.to_string())],
            ph: vec![None],
        },
        attribution_data: None,
        custom_data: json!({
            "content_name": "Página Principal",
            "content_category": "Homepage",
            "content_type": "product"
        }),
        original_event_data: json!({ "event_name": "PageView", "event_time": now }),
    }
}

/// `POST /test-purchase` — publish a canned Purchase to verify credentials.
#[tracing::instrument(skip(state, body))]
pub async fn test_purchase(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body?;
    let (access_token, pixel_id) = credentials(req.access_token, req.pixel_id)?;
    let dest = Destination {
        pixel_id,
        access_token,
        visit_uid: None,
        page_id: None,
    };
    relay(
        &state,
        dest,
        ConversionPayload::single(test_purchase_event(Utc::now().timestamp())),
        "Test Purchase event sent",
        "Error sending test Purchase event",
    )
    .await
}

/// `POST /test-pageview` — publish a canned PageView to verify credentials.
#[tracing::instrument(skip(state, body))]
pub async fn test_pageview(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body?;
    let (access_token, pixel_id) = credentials(req.access_token, req.pixel_id)?;
    let dest = Destination {
        pixel_id,
        access_token,
        visit_uid: None,
        page_id: None,
    };
    relay(
        &state,
        dest,
        ConversionPayload::single(test_pageview_event(Utc::now().timestamp())),
        "Test PageView event sent",
        "Error sending test PageView event",
    )
    .await
}
