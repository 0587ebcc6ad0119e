use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::error::AppError;

use super::AppState;

const API_KEY_HEADER: &str = "X-API-Key";

/// Guards producer endpoints with the shared `api.key`.
///
/// With no key configured every request passes, which is only meant for
/// local development.
pub async fn api_key_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.settings.api.key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == expected => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("Producer request with invalid API key");
            Err(AppError::Auth("Invalid API key".into()))
        }
        None => {
            tracing::warn!("Producer request without API key");
            Err(AppError::Auth(format!("Missing {} header", API_KEY_HEADER)))
        }
    }
}
