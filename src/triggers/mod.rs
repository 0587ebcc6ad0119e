//! Ingestion of producer events over HTTP and Redis pub/sub.

mod http;
mod redis;

pub use http::{submit_event, SubmitEventResponse};
pub use redis::{RedisSubscriber, DEFAULT_CHANNEL};

use crate::error::AppError;
use crate::notification::ProducerEvent;

/// Reject events the dispatcher cannot route or render
pub(crate) fn check_event(event: &ProducerEvent) -> Result<(), AppError> {
    if event.user_id.trim().is_empty() {
        return Err(AppError::Validation("userId must not be empty".into()));
    }
    if event.event_type.as_str().trim().is_empty() {
        return Err(AppError::Validation("type must not be empty".into()));
    }
    if event.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".into()));
    }
    Ok(())
}
