//! Real-time WebSocket protocol and the server-side socket handler.

mod handler;
mod message;

pub use handler::ws_handler;
pub use message::{
    AuthenticatePayload, ClientEvent, ErrorPayload, NotificationAck, NotificationUpdated,
    ServerEvent, SessionInfo,
};
