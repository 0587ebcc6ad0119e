//! Hand-off point to external email, push and SMS providers.

use async_trait::async_trait;
use thiserror::Error;

use crate::digest::DigestBucket;

use super::{Channel, Notification};

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("channel {0} is not handled by this sender")]
    Unsupported(Channel),

    #[error("provider rejected message: {0}")]
    Provider(String),
}

/// Delivery to channels outside the live WebSocket session
#[async_trait]
pub trait OutboundSender: Send + Sync {
    /// Send a single notification on `channel` (Email, Push or Sms)
    async fn send(&self, channel: Channel, notification: &Notification) -> Result<(), OutboundError>;

    /// Send one composed digest email for a whole bucket
    async fn send_digest(&self, bucket: &DigestBucket) -> Result<(), OutboundError>;

    fn name(&self) -> &'static str;
}

/// Sender that only records what would have been sent
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSender;

#[async_trait]
impl OutboundSender for LoggingSender {
    async fn send(&self, channel: Channel, notification: &Notification) -> Result<(), OutboundError> {
        if channel == Channel::InApp {
            return Err(OutboundError::Unsupported(channel));
        }

        tracing::info!(
            channel = %channel,
            user_id = %notification.user_id,
            notification_id = %notification.id,
            event_type = %notification.event_type,
            "Outbound notification"
        );
        Ok(())
    }

    async fn send_digest(&self, bucket: &DigestBucket) -> Result<(), OutboundError> {
        tracing::info!(
            user_id = %bucket.user_id(),
            bucket = %bucket.key,
            items = bucket.notifications.len(),
            "Outbound digest email"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}
