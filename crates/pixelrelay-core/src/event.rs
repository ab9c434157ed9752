use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::identity::{hash_email, hash_phone};
use crate::page::PageRef;

/// Event name that counts as a conversion in KPI aggregation.
pub const PURCHASE_EVENT: &str = "Purchase";

/// Inclusive time window: a record at exactly `from` or exactly `to` is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.from && ts <= self.to
    }
}

/// One visitor session on a landing page. Mirrors the `tracking_records` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub id: String,
    pub visit_uid: Option<String>,
    pub page_id: PageRef,
    pub created_at: DateTime<Utc>,
    /// Seconds of foreground time reported by the page. NULL until the first heartbeat.
    pub total_active_time: Option<u64>,
}

/// One attempted send to the conversions API. Mirrors the `conversion_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionEvent {
    pub id: String,
    pub visit_uid: Option<String>,
    /// Recorded for reference only; KPI aggregation never filters on it.
    pub page_id: Option<PageRef>,
    pub event_name: String,
    pub pixel_id: String,
    /// Serialized outbound payload exactly as sent.
    pub payload: String,
    pub success: bool,
    /// Serialized upstream response body on success.
    pub response: Option<String>,
    /// Upstream error detail on failure.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /send-event`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEventRequest {
    pub event_data: Option<ClientEventData>,
    pub access_token: Option<String>,
    pub pixel_id: Option<String>,
    pub visit_uid: Option<String>,
    pub page_id: Option<String>,
}

/// Event as reported by the browser. Field names follow the conversions API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientEventData {
    pub event_name: Option<String>,
    pub event_time: Option<EventTime>,
    pub action_source: Option<String>,
    pub user_data: Option<ClientUserData>,
    pub attribution_data: Option<Value>,
    pub custom_data: Option<Value>,
    pub original_event_data: Option<Value>,
}

/// Unix seconds, sent by some pages as a number and by others as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    Seconds(i64),
    Fractional(f64),
    Text(String),
}

impl EventTime {
    /// Whole epoch seconds, or `None` when the value is not a number.
    pub fn seconds(&self) -> Option<i64> {
        match self {
            EventTime::Seconds(s) => Some(*s),
            EventTime::Fractional(f) if f.is_finite() => Some(f.trunc() as i64),
            EventTime::Fractional(_) => None,
            EventTime::Text(raw) => {
                let raw = raw.trim();
                raw.parse::<i64>().ok().or_else(|| {
                    raw.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
            }
        }
    }
}

/// A user identifier field: a single value or a list of values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Identifiers {
    Many(Vec<Option<String>>),
    One(String),
}

impl Identifiers {
    pub fn into_vec(self) -> Vec<Option<String>> {
        match self {
            Identifiers::Many(values) => values,
            Identifiers::One(value) => vec![Some(value)],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientUserData {
    #[serde(default)]
    pub em: Option<Identifiers>,
    #[serde(default)]
    pub ph: Option<Identifiers>,
}

/// Outbound body for `POST /{pixel_id}/events`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionPayload {
    pub data: Vec<ServerEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerEvent {
    pub event_name: String,
    pub event_time: i64,
    pub action_source: String,
    pub user_data: UserData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution_data: Option<Value>,
    pub custom_data: Value,
    pub original_event_data: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserData {
    pub em: Vec<Option<String>>,
    pub ph: Vec<Option<String>>,
}

impl UserData {
    /// Hash plain-text identifiers; `null` entries and existing digests are kept.
    pub fn from_client(raw: ClientUserData) -> Self {
        Self {
            em: raw
                .em
                .map(Identifiers::into_vec)
                .unwrap_or_default()
                .into_iter()
                .map(|v| v.and_then(|s| hash_email(&s)))
                .collect(),
            ph: raw
                .ph
                .map(Identifiers::into_vec)
                .unwrap_or_default()
                .into_iter()
                .map(|v| v.and_then(|s| hash_phone(&s)))
                .collect(),
        }
    }
}

impl ServerEvent {
    /// Normalize a browser event, filling the relay defaults.
    ///
    /// Returns `None` when `event_name`, `event_time` or `user_data` is missing,
    /// or when `event_time` is not a number of seconds.
    pub fn from_client(data: ClientEventData) -> Option<Self> {
        let event_name = data.event_name.filter(|n| !n.trim().is_empty())?;
        let event_time = data
            .event_time
            .as_ref()
            .and_then(EventTime::seconds)
            .filter(|t| *t != 0)?;
        let user_data = data.user_data?;

        let original_event_data = data.original_event_data.unwrap_or_else(|| {
            json!({ "event_name": event_name, "event_time": event_time })
        });

        Some(Self {
            action_source: data.action_source.unwrap_or_else(|| "website".to_string()),
            user_data: UserData::from_client(user_data),
            attribution_data: Some(
                data.attribution_data
                    .unwrap_or_else(|| json!({ "attribution_share": "0.3" })),
            ),
            custom_data: data.custom_data.unwrap_or_else(|| json!({})),
            original_event_data,
            event_name,
            event_time,
        })
    }
}

impl ConversionPayload {
    pub fn single(event: ServerEvent) -> Self {
        Self { data: vec![event] }
    }

    /// Name of the first event, used as the stored `event_name`.
    pub fn event_name(&self) -> &str {
        self.data.first().map(|e| e.event_name.as_str()).unwrap_or("")
    }
}
