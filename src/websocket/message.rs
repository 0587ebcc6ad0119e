//! Real-time protocol frames.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": <payload>}`.
//! The same types are used by the server handler and the client transport.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::{Notification, NotificationUpdate};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "authenticate")]
    Authenticate(AuthenticatePayload),
    /// Delivery acknowledgment for an in-app push. Unrelated to `isRead`.
    #[serde(rename = "notification:read")]
    NotificationRead(NotificationAck),
    #[serde(rename = "ping")]
    Ping,
}

impl ClientEvent {
    pub fn authenticate(user_id: impl Into<String>) -> Self {
        Self::Authenticate(AuthenticatePayload {
            user_id: user_id.into(),
        })
    }

    pub fn ack(notification_id: Uuid) -> Self {
        Self::NotificationRead(NotificationAck { notification_id })
    }

    /// Label used for metrics and logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => "authenticate",
            Self::NotificationRead(_) => "notification:read",
            Self::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatePayload {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAck {
    pub notification_id: Uuid,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "authenticated")]
    Authenticated(SessionInfo),
    #[serde(rename = "notification:new")]
    NotificationNew(Notification),
    #[serde(rename = "notification:updated")]
    NotificationUpdated(NotificationUpdated),
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "heartbeat")]
    Heartbeat,
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            code: code.into(),
            message: message.into(),
        })
    }

    pub fn updated(notification_id: Uuid, update: NotificationUpdate) -> Self {
        Self::NotificationUpdated(NotificationUpdated {
            notification_id,
            update,
        })
    }

    /// Serialize to the JSON text sent on the socket
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: String,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationUpdated {
    pub notification_id: Uuid,
    pub update: NotificationUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_client_frames() {
        let json = serde_json::to_value(ClientEvent::authenticate("user-1")).unwrap();
        assert_eq!(json["event"], "authenticate");
        assert_eq!(json["data"]["userId"], "user-1");

        let ping: ClientEvent = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(ping, ClientEvent::Ping);

        let id = Uuid::new_v4();
        let ack: ClientEvent = serde_json::from_str(&format!(
            r#"{{"event":"notification:read","data":{{"notificationId":"{id}"}}}}"#
        ))
        .unwrap();
        assert_eq!(ack, ClientEvent::ack(id));
    }

    #[test]
    fn test_server_frames() {
        let session = ServerEvent::Authenticated(SessionInfo {
            user_id: "user-1".into(),
            session_id: Uuid::nil(),
        });
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["event"], "authenticated");
        assert_eq!(json["data"]["sessionId"], Uuid::nil().to_string());

        let id = Uuid::new_v4();
        let updated = ServerEvent::updated(id, NotificationUpdate::read(Utc::now()));
        let text = updated.to_json().unwrap();
        let back: ServerEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, updated);
        assert!(text.contains("notification:updated"));

        let pong = serde_json::to_value(ServerEvent::Pong).unwrap();
        assert_eq!(pong["event"], "pong");
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"subscribe","data":[]}"#).is_err());
    }
}
