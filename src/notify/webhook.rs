//! Generic webhook delivery using a CloudEvents 1.0 JSON envelope.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{HTTP_TIMEOUT, Notifier};
use crate::error::{Error, Result};
use crate::event::Notification;

pub struct WebhookNotifier {
    client: reqwest::Client,
    sink: String,
}

impl WebhookNotifier {
    pub fn new(sink: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            sink: sink.into(),
        })
    }
}

/// Wrap a notification in a structured-mode CloudEvent.
pub(crate) fn cloud_event(n: &Notification) -> serde_json::Value {
    json!({
        "specversion": "1.0",
        "type": "timerec.notification",
        "source": "timerec",
        "subject": n.user,
        "id": Uuid::new_v4().to_string(),
        "time": n.timestamp.to_rfc3339(),
        "datacontenttype": "application/json",
        "eventkind": n.kind.as_str(),
        "data": {
            "user": format!("@{}", n.user),
            "target": n.target,
            "message": n.message,
        },
    })
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, n: &Notification) -> Result<()> {
        let event = cloud_event(n);
        debug!(sink = %self.sink, kind = %n.kind, "sending cloudevent");

        let resp = self
            .client
            .post(&self.sink)
            .header("content-type", "application/cloudevents+json")
            .json(&event)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(sink = %self.sink, %status, "webhook rejected notification");
            return Err(Error::Backend(format!("webhook returned {status}: {body}")));
        }
        Ok(())
    }
}
