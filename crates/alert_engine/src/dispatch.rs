//! Hand-off of alert events to the push dispatcher.

use async_trait::async_trait;
use common::{Error, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::ports::AlertDispatcher;
use crate::types::AlertEvent;

/// Result of delivering one pass worth of events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Message ids of delivered events, in event order.
    pub delivered: Vec<String>,
    pub failed: usize,
}

/// Deliver every event once. Failures are logged and counted, never retried.
pub async fn dispatch_all(dispatcher: &dyn AlertDispatcher, events: &[AlertEvent]) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    for event in events {
        match dispatcher.dispatch(event).await {
            Ok(message_id) => {
                info!(
                    region_id = %event.region_id,
                    alert_type = %event.alert_type,
                    message_id = %message_id,
                    "alert delivered"
                );
                summary.delivered.push(message_id);
            }
            Err(e) => {
                warn!(
                    region_id = %event.region_id,
                    alert_type = %event.alert_type,
                    error = %e,
                    "alert delivery failed"
                );
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Dispatcher that records events in memory. Regions listed in
/// `reject_regions` fail delivery.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<AlertEvent>>,
    reject_regions: Vec<String>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sent: Mutex::new(Vec::new()),
            reject_regions: regions.into_iter().map(Into::into).collect(),
        }
    }

    pub async fn sent(&self) -> Vec<AlertEvent> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    async fn dispatch(&self, event: &AlertEvent) -> Result<String> {
        if self.reject_regions.contains(&event.region_id) {
            return Err(Error::Dispatch(format!(
                "delivery rejected for {}",
                event.region_id
            )));
        }
        let mut sent = self.sent.lock().await;
        sent.push(event.clone());
        Ok(format!("msg-{}", sent.len()))
    }
}
