use async_trait::async_trait;
use doorwatch_core::config::NotifyConf;
use doorwatch_core::ports::{Notification, Notifier, Payload};
use doorwatch_core::NotifyError;
use std::time::Duration;
use tracing::info;

const NTFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Push through an ntfy topic; metadata travels in headers, the body is
/// the still (attachment) or plain text.
pub struct NtfyNotifier {
    client: reqwest::Client,
    topic_url: String,
}

impl NtfyNotifier {
    pub fn new(conf: &NotifyConf) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(NTFY_TIMEOUT).build()?;
        let topic_url = format!("{}/{}", conf.server.trim_end_matches('/'), conf.topic);
        Ok(Self { client, topic_url })
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let body = match notification.payload {
            Payload::Image(bytes) => reqwest::Body::from(bytes),
            Payload::Text(text) => reqwest::Body::from(text),
        };

        let resp = self
            .client
            .post(&self.topic_url)
            .header("Title", &notification.title)
            .header("Priority", notification.priority.as_str())
            .header("Tags", notification.tags.join(","))
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NotifyError(format!("ntfy returned {}", resp.status())));
        }
        info!(title = %notification.title, "notification sent");
        Ok(())
    }
}
