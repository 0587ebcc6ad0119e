//! Request seam used by [`super::ClientNotificationStore`] for the
//! request/response notification operations.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::notification::{ListQuery, NotificationPage};

/// A request/response operation was rejected. Never retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.)
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Anything else, mostly useful for test doubles
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<NotificationPage, RequestError>;

    async fn mark_read(&self, id: Uuid) -> Result<(), RequestError>;

    /// Returns how many notifications the server flipped
    async fn mark_all_read(&self) -> Result<u64, RequestError>;
}

#[derive(Debug, Deserialize)]
struct MarkAllReadResponse {
    updated: u64,
}

/// [`NotificationApi`] over the service's HTTP API
pub struct HttpNotificationApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpNotificationApi {
    /// * `base_url` - service root, e.g. `http://localhost:8081`
    /// * `token` - JWT sent as the bearer token
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/notifications{}", self.base_url, path)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RequestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RequestError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn list(&self, query: &ListQuery) -> Result<NotificationPage, RequestError> {
        let response = self
            .client
            .get(self.url(""))
            .bearer_auth(&self.token)
            .query(&[
                ("page", query.page.to_string()),
                ("limit", query.limit.to_string()),
                ("unreadOnly", query.unread_only.to_string()),
            ])
            .send()
            .await?;

        Ok(Self::ensure_success(response).await?.json().await?)
    }

    async fn mark_read(&self, id: Uuid) -> Result<(), RequestError> {
        let response = self
            .client
            .patch(self.url(&format!("/{id}/read")))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<u64, RequestError> {
        let response = self
            .client
            .patch(self.url("/read-all"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let body: MarkAllReadResponse = Self::ensure_success(response).await?.json().await?;
        Ok(body.updated)
    }
}
