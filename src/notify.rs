//! Webhook notifications for duty changes
//!
//! Delivery is best-effort: each notification is a detached tokio task that
//! posts one embed and swallows every failure. Nothing in the command path
//! waits on it, and there are no retries.

use chrono::Utc;
use tracing::debug;

use crate::EVENT_TARGET;
use crate::duty::{DutyError, DutyResult};

/// Embed color for "went on duty"
pub const ON_DUTY_COLOR: u32 = 3_066_993;
/// Embed color for "went off duty"
pub const OFF_DUTY_COLOR: u32 = 15_158_332;

/// Fire-and-forget webhook dispatcher
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
}

impl Notifier {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Post a duty-change embed without blocking the caller.
    ///
    /// No-op when `url` is empty. Failures are logged at debug level and
    /// discarded; delivery is not part of any invariant.
    pub fn dispatch(&self, url: &str, description: String, color: u32) {
        if url.is_empty() {
            return;
        }

        let client = self.client.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            if let Err(err) = post_embed(&client, &url, &description, color).await {
                debug!(
                    target: EVENT_TARGET,
                    error = %err,
                    "Duty webhook delivery failed"
                );
            }
        });
    }
}

fn embed_body(description: &str, color: u32) -> serde_json::Value {
    serde_json::json!({
        "embeds": [{
            "description": description,
            "color": color,
            "timestamp": Utc::now().to_rfc3339(),
        }]
    })
}

async fn post_embed(
    client: &reqwest::Client,
    url: &str,
    description: &str,
    color: u32,
) -> DutyResult<()> {
    let response = client
        .post(url)
        .json(&embed_body(description, color))
        .send()
        .await
        .map_err(|err| DutyError::Notification(err.to_string()))?;

    if !response.status().is_success() {
        return Err(DutyError::Notification(format!(
            "webhook returned {}",
            response.status()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_body_shape() {
        let body = embed_body("Alice went ON duty for **police**", ON_DUTY_COLOR);
        let embed = &body["embeds"][0];
        assert_eq!(embed["description"], "Alice went ON duty for **police**");
        assert_eq!(embed["color"], 3_066_993);
        // RFC 3339 timestamp
        let timestamp = embed["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[test]
    fn test_colors_match_discord_embeds() {
        assert_eq!(ON_DUTY_COLOR, 3_066_993);
        assert_eq!(OFF_DUTY_COLOR, 15_158_332);
    }

    #[tokio::test]
    async fn test_dispatch_with_empty_url_is_noop() {
        let notifier = Notifier::new(reqwest::Client::new());
        notifier.dispatch("", "nobody listening".to_string(), OFF_DUTY_COLOR);
    }
}
