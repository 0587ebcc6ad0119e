//! Notification model, storage and dispatching.
//!
//! - `types`: the notification and event model shared by every layer
//! - `repository`: storage backend trait, with `memory_repository` as the
//!   in-process implementation
//! - `outbound`: seam for email, push and SMS providers
//! - `dispatcher`: resolves preferences and fans an event out to channels

mod dispatcher;
pub mod memory_repository;
pub mod outbound;
pub mod repository;
mod types;

pub use dispatcher::{DeliveryResult, DispatcherStatsSnapshot, NotificationDispatcher};
pub use memory_repository::MemoryNotificationRepository;
pub use outbound::{LoggingSender, OutboundError, OutboundSender};
pub use repository::{ListQuery, NotificationPage, NotificationRepository, RepositoryError};
pub use types::{
    Category, Channel, EventType, Notification, NotificationEvent, NotificationUpdate, Priority,
    ProducerEvent,
};
