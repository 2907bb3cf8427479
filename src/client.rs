//! Remote platform API access.
//!
//! Tasks only ever create resources, so the surface is a single trait with
//! one call. Keeping it a trait lets the runner and task tests swap in an
//! in-memory recorder.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// POST a resource payload to an API path relative to the base URL.
    async fn create(&self, path: &str, payload: &Value) -> Result<(), ClientError>;
}

/// Token-authenticated reqwest implementation. No retries; a failed create
/// is reported per task by the runner.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        HttpClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl PlatformClient for HttpClient {
    async fn create(&self, path: &str, payload: &Value) -> Result<(), ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            path: path.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = HttpClient::new("https://example.com/", "t");
        assert_eq!(client.base_url, "https://example.com");
    }
}
