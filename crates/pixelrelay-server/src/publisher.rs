//! Outbound client for the advertising conversions API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use pixelrelay_core::event::ConversionPayload;

/// Why a publish did not succeed.
#[derive(Debug, Clone)]
pub struct PublishError {
    /// HTTP status when the API answered, `None` for transport failures.
    pub status: Option<u16>,
    /// Upstream error body when it was JSON, otherwise the error text.
    pub details: Value,
}

impl PublishError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            details: Value::String(message.into()),
        }
    }
}

/// Sends a normalized payload to `/{pixel_id}/events`.
#[async_trait]
pub trait ConversionPublisher: Send + Sync + 'static {
    /// Returns the upstream response body on a 2xx answer.
    async fn publish(
        &self,
        pixel_id: &str,
        access_token: &str,
        payload: &ConversionPayload,
    ) -> Result<Value, PublishError>;
}

/// [`ConversionPublisher`] backed by the Graph API over `reqwest`.
pub struct GraphApiPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl GraphApiPublisher {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn events_url(&self, pixel_id: &str) -> String {
        format!("{}/{}/events", self.base_url, pixel_id)
    }
}

#[async_trait]
impl ConversionPublisher for GraphApiPublisher {
    async fn publish(
        &self,
        pixel_id: &str,
        access_token: &str,
        payload: &ConversionPayload,
    ) -> Result<Value, PublishError> {
        let response = self
            .client
            .post(self.events_url(pixel_id))
            .query(&[("access_token", access_token)])
            .json(payload)
            .send()
            .await
            .map_err(|e| PublishError::transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::transport(e.to_string()))?;
        let parsed = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));

        if status.is_success() {
            Ok(parsed)
        } else {
            Err(PublishError {
                status: Some(status.as_u16()),
                details: parsed,
            })
        }
    }
}
