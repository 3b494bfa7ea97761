//! Post-run notification hand-off.

use async_trait::async_trait;
use serde::Serialize;

use crate::Result;
use crate::sync::SyncReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryCounts {
    pub sent: usize,
    pub failed: usize,
}

/// Receives the per-server reports of a completed run.
///
/// Delivery happens after all catalog writes; an error here is logged by
/// the caller and never undoes a sync.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, reports: &[SyncReport]) -> Result<DeliveryCounts>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn deliver(&self, _reports: &[SyncReport]) -> Result<DeliveryCounts> {
        Ok(DeliveryCounts::default())
    }
}
