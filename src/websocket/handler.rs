use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::auth::{bearer_token, Claims};
use crate::connection_manager::ConnectionHandle;
use crate::metrics::{
    DeliveryMetrics, WsMessageMetrics, WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED,
    WS_CONNECTION_DURATION,
};
use crate::server::AppState;

use super::message::{ClientEvent, ServerEvent, SessionInfo};

const CHANNEL_BUFFER_SIZE: usize = 32;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// The JWT authorizes the upgrade; the session only becomes live after the
/// client sends `authenticate` for the same user.
#[tracing::instrument(
    name = "ws.upgrade",
    skip(ws, state, query, headers),
    fields(has_query_token = query.token.is_some())
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Response {
    let token = query
        .token
        .as_deref()
        .or_else(|| bearer_token(&headers));

    let Some(token) = token else {
        return (StatusCode::UNAUTHORIZED, "Missing authentication token").into_response();
    };

    let claims = match state.jwt_validator.validate(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "JWT validation failed");
            return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
        }
    };

    tracing::info!(user_id = %claims.sub, "WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state, claims))
}

/// Per-socket state for the receive side
struct Session {
    claims: Claims,
    sender: mpsc::Sender<ServerEvent>,
    handle: Option<Arc<ConnectionHandle>>,
}

impl Session {
    async fn reply(&self, event: ServerEvent) {
        let _ = self.sender.send(event).await;
    }
}

#[tracing::instrument(
    name = "ws.connection",
    skip(socket, state, claims),
    fields(user_id = %claims.sub, otel.kind = "server")
)]
async fn handle_socket(socket: WebSocket, state: AppState, claims: Claims) {
    let connection_start = std::time::Instant::now();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(CHANNEL_BUFFER_SIZE);
    let (mut ws_sender, mut ws_receiver) = socket.split();

    WS_CONNECTIONS_OPENED.inc();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match event.to_json() {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };

            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let mut session = Session {
        claims,
        sender: tx,
        handle: None,
    };
    let auth_timeout = Duration::from_secs(state.settings.websocket.auth_timeout);

    let writer_finished = tokio::select! {
        _ = &mut send_task => {
            tracing::debug!("Send task completed");
            true
        }
        _ = receive_loop(&mut ws_receiver, &state, &mut session, auth_timeout) => {
            tracing::debug!("Receive loop completed");
            false
        }
    };

    let user_id = session.claims.sub.clone();
    if let Some(handle) = session.handle.take() {
        state.connection_manager.unregister(handle.id);
    }
    // Dropping the last sender ends the writer, which closes the socket.
    drop(session);
    if !writer_finished {
        // Let queued frames (e.g. a final error) flush before giving up.
        if tokio::time::timeout(Duration::from_secs(1), &mut send_task).await.is_err() {
            send_task.abort();
        }
    }

    WS_CONNECTIONS_CLOSED.inc();
    let duration = connection_start.elapsed().as_secs_f64();
    WS_CONNECTION_DURATION.observe(duration);

    tracing::info!(user_id = %user_id, duration_secs = duration, "WebSocket connection closed");
}

async fn receive_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    session: &mut Session,
    auth_timeout: Duration,
) {
    let auth_deadline = Instant::now() + auth_timeout;

    loop {
        let next = if session.handle.is_none() {
            match tokio::time::timeout_at(auth_deadline, ws_receiver.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::warn!(user_id = %session.claims.sub, "Socket did not authenticate in time");
                    session
                        .reply(ServerEvent::error("AUTH_TIMEOUT", "Authentication timed out"))
                        .await;
                    return;
                }
            }
        } else {
            ws_receiver.next().await
        };

        match next {
            Some(Ok(msg)) => {
                if !process_message(msg, state, session).await {
                    return;
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "WebSocket receive error");
                return;
            }
            None => return,
        }
    }
}

/// Process one frame. Returns false if the connection should be closed.
async fn process_message(msg: Message, state: &AppState, session: &mut Session) -> bool {
    if let Some(handle) = &session.handle {
        handle.update_activity();
    }

    match msg {
        Message::Text(text) => {
            let event: ClientEvent = match serde_json::from_str(&text) {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse client message");
                    session
                        .reply(ServerEvent::error("INVALID_MESSAGE", e.to_string()))
                        .await;
                    return true;
                }
            };
            handle_client_event(event, state, session).await
        }
        Message::Binary(_) => {
            session
                .reply(ServerEvent::error(
                    "UNSUPPORTED_FORMAT",
                    "Binary messages are not supported",
                ))
                .await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!("Received close frame");
            false
        }
    }
}

#[tracing::instrument(
    name = "ws.message",
    skip(state, session),
    fields(user_id = %session.claims.sub, event = event.name())
)]
async fn handle_client_event(event: ClientEvent, state: &AppState, session: &mut Session) -> bool {
    match event {
        ClientEvent::Authenticate(payload) => {
            WsMessageMetrics::record_authenticate();

            if payload.user_id != session.claims.sub {
                tracing::warn!(
                    claimed = %payload.user_id,
                    "authenticate does not match token subject"
                );
                session
                    .reply(ServerEvent::error("UNAUTHORIZED", "User does not match token"))
                    .await;
                return false;
            }

            let handle = match &session.handle {
                Some(handle) => handle.clone(),
                None => {
                    let handle = state
                        .connection_manager
                        .register(payload.user_id.clone(), session.sender.clone());
                    session.handle = Some(handle.clone());
                    handle
                }
            };

            session
                .reply(ServerEvent::Authenticated(SessionInfo {
                    user_id: payload.user_id,
                    session_id: handle.id,
                }))
                .await;
            true
        }
        ClientEvent::NotificationRead(ack) => {
            WsMessageMetrics::record_ack();
            if session.handle.is_none() {
                session
                    .reply(ServerEvent::error("NOT_AUTHENTICATED", "Send authenticate first"))
                    .await;
                return true;
            }
            DeliveryMetrics::record_ack();
            tracing::debug!(notification_id = %ack.notification_id, "Delivery acknowledged");
            true
        }
        ClientEvent::Ping => {
            WsMessageMetrics::record_ping();
            session.reply(ServerEvent::Pong).await;
            true
        }
    }
}
