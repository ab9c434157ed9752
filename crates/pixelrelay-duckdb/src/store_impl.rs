use async_trait::async_trait;

use pixelrelay_core::event::{ConversionEvent, TimeRange, TrackingRecord};
use pixelrelay_core::page::PageRef;
use pixelrelay_core::store::{EventStore, TrackingStore};

use crate::queries::events::{find_events_inner, list_events_inner, EventsPage};
use crate::queries::tracking::{find_tracking_inner, get_tracking_inner};
use crate::DuckDbBackend;

#[async_trait]
impl TrackingStore for DuckDbBackend {
    async fn find_tracking(
        &self,
        page_id: &PageRef,
        range: &TimeRange,
    ) -> anyhow::Result<Vec<TrackingRecord>> {
        find_tracking_inner(self, page_id, range).await
    }
}

#[async_trait]
impl EventStore for DuckDbBackend {
    async fn find_events(
        &self,
        event_name: &str,
        range: &TimeRange,
    ) -> anyhow::Result<Vec<ConversionEvent>> {
        find_events_inner(self, event_name, range).await
    }
}

impl DuckDbBackend {
    pub async fn get_tracking_record(&self, id: &str) -> anyhow::Result<Option<TrackingRecord>> {
        get_tracking_inner(self, id).await
    }

    pub async fn list_conversion_events(
        &self,
        event_name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<EventsPage> {
        list_events_inner(self, event_name, limit, offset).await
    }
}
