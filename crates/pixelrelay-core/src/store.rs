//! Read-side store abstraction used by the KPI aggregator.

use crate::event::{ConversionEvent, TimeRange, TrackingRecord};
use crate::page::PageRef;

/// Tracking sessions, filtered by page and creation time.
#[async_trait::async_trait]
pub trait TrackingStore: Send + Sync + 'static {
    /// All records with `page_id` equal to `page_id` and `created_at` in `range`
    /// (both bounds inclusive).
    async fn find_tracking(
        &self,
        page_id: &PageRef,
        range: &TimeRange,
    ) -> anyhow::Result<Vec<TrackingRecord>>;
}

/// Conversion sends, filtered by event name and creation time.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// All events named `event_name` with `created_at` in `range`
    /// (both bounds inclusive). Not scoped by page.
    async fn find_events(
        &self,
        event_name: &str,
        range: &TimeRange,
    ) -> anyhow::Result<Vec<ConversionEvent>>;
}
