//! Sender for the application notifications queue

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::gateways::{NotificationError, NotificationGateway};
use crate::application::model::EnrichedApplicationRecord;

const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    #[serde(alias = "MessageId", alias = "messageId")]
    message_id: String,
}

/// Posts each record as a JSON message to the queue's HTTP endpoint
#[derive(Clone)]
pub struct HttpQueueSender {
    client: Client,
    queue_url: String,
}

impl HttpQueueSender {
    pub fn new(queue_url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        Ok(Self {
            client,
            queue_url: queue_url.into(),
        })
    }
}

#[async_trait]
impl NotificationGateway for HttpQueueSender {
    async fn send(
        &self,
        idempotency_key: Uuid,
        record: &EnrichedApplicationRecord,
    ) -> Result<String, NotificationError> {
        let body = serde_json::to_string(record)
            .map_err(|e| NotificationError::Serialization(e.to_string()))?;

        let response = self
            .client
            .post(&self.queue_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(IDEMPOTENCY_KEY, idempotency_key.to_string())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Error sending message to queue");
                NotificationError::Delivery(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Queue rejected message");
            return Err(NotificationError::Delivery(format!(
                "queue answered {status}"
            )));
        }

        let sent: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::Delivery(format!("unreadable queue response: {e}")))?;

        tracing::debug!(
            application_id = %record.application_id,
            message_id = %sent.message_id,
            "Message sent"
        );
        Ok(sent.message_id)
    }
}
