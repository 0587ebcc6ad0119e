use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::notification::{DeliveryResult, ProducerEvent};
use crate::server::AppState;

use super::check_event;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEventResponse {
    /// At least one channel was selected
    pub delivered: bool,
    pub result: DeliveryResult,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/v1/events - submit one producer event
#[tracing::instrument(
    name = "http.submit_event",
    skip(state, event),
    fields(user_id = %event.user_id, event_type = %event.event_type)
)]
pub async fn submit_event(
    State(state): State<AppState>,
    Json(event): Json<ProducerEvent>,
) -> Result<(StatusCode, Json<SubmitEventResponse>)> {
    check_event(&event)?;

    let result = state.dispatcher.dispatch(event).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitEventResponse {
            delivered: result.delivered(),
            result,
            timestamp: Utc::now(),
        }),
    ))
}
