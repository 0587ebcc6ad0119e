use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;

use crate::config::RedisConfig;
use crate::notification::{NotificationDispatcher, ProducerEvent};

use super::check_event;

/// Channel subscribed to when none are configured
pub const DEFAULT_CHANNEL: &str = "notification:events";

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Redis Pub/Sub subscriber feeding producer events to the dispatcher
pub struct RedisSubscriber {
    config: RedisConfig,
    dispatcher: Arc<NotificationDispatcher>,
    shutdown: broadcast::Receiver<()>,
}

impl RedisSubscriber {
    pub fn new(
        config: RedisConfig,
        dispatcher: Arc<NotificationDispatcher>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            shutdown,
        }
    }

    /// Run until shutdown, resubscribing after connection errors
    pub async fn run(mut self) {
        if !self.config.enabled {
            tracing::info!("Redis trigger disabled");
            return;
        }

        let channels = self.channels();
        tracing::info!(channels = ?channels, "Starting Redis subscriber");

        loop {
            match self.run_subscription_loop(&channels).await {
                Ok(()) => {
                    tracing::info!("Redis subscriber stopped gracefully");
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in_secs = RESUBSCRIBE_DELAY.as_secs(),
                        "Redis subscription error"
                    );
                    tokio::select! {
                        _ = self.shutdown.recv() => break,
                        _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
                    }
                }
            }
        }
    }

    fn channels(&self) -> Vec<String> {
        if self.config.channels.is_empty() {
            vec![DEFAULT_CHANNEL.to_string()]
        } else {
            self.config.channels.clone()
        }
    }

    async fn run_subscription_loop(&mut self, channels: &[String]) -> anyhow::Result<()> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in channels {
            if channel.contains('*') || channel.contains('?') || channel.contains('[') {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        tracing::info!("Redis subscription established");

        let mut message_stream = pubsub.on_message();

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(());
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        anyhow::bail!("Redis message stream ended");
                    };

                    let channel = msg.get_channel_name().to_string();
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to get message payload");
                            continue;
                        }
                    };

                    self.handle_message(&channel, &payload).await;
                }
            }
        }
    }

    async fn handle_message(&self, channel: &str, payload: &str) {
        let Some(event) = parse_event(channel, payload) else {
            return;
        };

        let result = self.dispatcher.dispatch(event).await;

        tracing::debug!(
            channel = %channel,
            notification_id = %result.notification_id,
            delivered = result.delivered(),
            pushed_to = result.pushed_to,
            "Dispatched event from Redis"
        );
    }
}

/// Decode and check one pub/sub payload; bad payloads are logged and dropped
fn parse_event(channel: &str, payload: &str) -> Option<ProducerEvent> {
    let event: ProducerEvent = match serde_json::from_str(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(
                error = %e,
                channel = %channel,
                "Failed to parse Redis message"
            );
            return None;
        }
    };

    if let Err(e) = check_event(&event) {
        tracing::warn!(error = %e, channel = %channel, "Rejected Redis event");
        return None;
    }

    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Category, Priority};

    #[test]
    fn test_parse_event() {
        let json = r#"{
            "userId": "user-123",
            "type": "security.login_new_device",
            "category": "SecurityAlerts",
            "priority": "Critical",
            "title": "New sign-in",
            "message": "Chrome on Linux",
            "metadata": {"ip": "10.0.0.1"}
        }"#;

        let event = parse_event(DEFAULT_CHANNEL, json).unwrap();
        assert_eq!(event.user_id, "user-123");
        assert_eq!(event.category, Category::SecurityAlerts);
        assert_eq!(event.priority, Priority::Critical);
        assert_eq!(event.metadata["ip"], "10.0.0.1");
    }

    #[test]
    fn test_priority_defaults_to_low() {
        let json = r#"{
            "userId": "user-1",
            "type": "system.maintenance",
            "category": "SystemUpdates",
            "title": "Maintenance",
            "message": "Tonight"
        }"#;

        assert_eq!(parse_event(DEFAULT_CHANNEL, json).unwrap().priority, Priority::Low);
    }

    #[test]
    fn test_bad_payloads_dropped() {
        assert!(parse_event(DEFAULT_CHANNEL, "not json").is_none());
        assert!(parse_event(
            DEFAULT_CHANNEL,
            r#"{"userId":"","type":"x","category":"Admin","title":"t","message":""}"#
        )
        .is_none());
        assert!(parse_event(
            DEFAULT_CHANNEL,
            r#"{"userId":"u","type":"x","category":"Unknown","title":"t","message":""}"#
        )
        .is_none());
    }
}
