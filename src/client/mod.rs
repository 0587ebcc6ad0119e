//! Consumer-side cache and the request seam it talks through.

mod api;
mod store;

pub use api::{HttpNotificationApi, NotificationApi, RequestError};
pub use store::{ClientNotificationStore, PresentationCues, MAX_CACHED};
