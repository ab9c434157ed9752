use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::event::{ConversionEvent, TimeRange, TrackingRecord};
use crate::page::PageRef;
use crate::store::{EventStore, TrackingStore};

/// In-process store holding both collections.
///
/// Honours the same inclusive-range contract as the DuckDB backend, so the
/// aggregator can be exercised without a database.
#[derive(Default)]
pub struct InMemoryStore {
    tracking: RwLock<Vec<TrackingRecord>>,
    events: RwLock<Vec<ConversionEvent>>,
    fail_with: RwLock<Option<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_tracking(&self, record: TrackingRecord) {
        self.tracking.write().await.push(record);
    }

    pub async fn insert_event(&self, event: ConversionEvent) {
        self.events.write().await.push(event);
    }

    /// Make every subsequent find return an error with `message`.
    pub async fn fail_reads(&self, message: &str) {
        *self.fail_with.write().await = Some(message.to_string());
    }

    async fn check_failure(&self) -> anyhow::Result<()> {
        match self.fail_with.read().await.as_deref() {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TrackingStore for InMemoryStore {
    async fn find_tracking(
        &self,
        page_id: &PageRef,
        range: &TimeRange,
    ) -> anyhow::Result<Vec<TrackingRecord>> {
        self.check_failure().await?;
        let rows = self.tracking.read().await;
        Ok(rows
            .iter()
            .filter(|r| r.page_id == *page_id && range.contains(r.created_at))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn find_events(
        &self,
        event_name: &str,
        range: &TimeRange,
    ) -> anyhow::Result<Vec<ConversionEvent>> {
        self.check_failure().await?;
        let rows = self.events.read().await;
        Ok(rows
            .iter()
            .filter(|e| e.event_name == event_name && range.contains(e.created_at))
            .cloned()
            .collect())
    }
}
