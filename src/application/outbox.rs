//! Background delivery of queued status-change notifications

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use super::gateways::{NotificationGateway, OutboxMessage, OutboxStore, StoreError};
use super::model::EnrichedApplicationRecord;

/// Outcome of one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
}

/// Polls the outbox and pushes pending messages to the notification queue.
///
/// The outbox id doubles as the idempotency key, so a message re-sent after a
/// crash between delivery and `mark_delivered` is collapsed by the queue.
#[derive(Clone)]
pub struct OutboxDispatcher {
    outbox: Arc<dyn OutboxStore>,
    notifier: Arc<dyn NotificationGateway>,
    poll_interval: Duration,
    batch_size: u32,
}

impl OutboxDispatcher {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        notifier: Arc<dyn NotificationGateway>,
        poll_interval: Duration,
        batch_size: u32,
    ) -> Self {
        Self {
            outbox,
            notifier,
            poll_interval,
            batch_size,
        }
    }

    /// Spawn the polling loop onto the runtime
    pub fn start(&self) {
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            batch_size = self.batch_size,
            "Starting notification outbox dispatcher"
        );

        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run().await;
        });
    }

    async fn run(&self) {
        loop {
            match self.dispatch_pending().await {
                Ok(summary) if summary.delivered + summary.failed > 0 => {
                    tracing::info!(
                        delivered = summary.delivered,
                        failed = summary.failed,
                        "Outbox dispatch pass finished"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim outbox messages");
                }
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Claim one batch and try to deliver every message in it
    pub async fn dispatch_pending(&self) -> Result<DispatchSummary, StoreError> {
        let messages = self.outbox.claim_pending(self.batch_size).await?;
        let mut summary = DispatchSummary::default();

        for message in messages {
            match self.deliver(&message).await {
                Ok(delivery_id) => {
                    self.outbox
                        .mark_delivered(message.outbox_id, &delivery_id)
                        .await?;
                    tracing::info!(
                        outbox_id = %message.outbox_id,
                        application_id = %message.application_id,
                        delivery_id = %delivery_id,
                        "Notification delivered"
                    );
                    summary.delivered += 1;
                }
                Err(reason) => {
                    tracing::warn!(
                        outbox_id = %message.outbox_id,
                        application_id = %message.application_id,
                        attempts = message.attempts + 1,
                        error = %reason,
                        "Notification delivery failed"
                    );
                    self.outbox.mark_failed(message.outbox_id, &reason).await?;
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn deliver(&self, message: &OutboxMessage) -> Result<String, String> {
        let record: EnrichedApplicationRecord = serde_json::from_value(message.payload.clone())
            .map_err(|e| format!("unreadable payload: {e}"))?;

        self.notifier
            .send(message.outbox_id, &record)
            .await
            .map_err(|e| e.to_string())
    }
}
