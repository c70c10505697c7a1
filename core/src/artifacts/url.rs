use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, instrument};

use super::ArtifactMeta;
use crate::{error::RemoteFetchError, retry::RetryPolicy};

/// A reference to remote content. Image, audio and video URLs share this
/// struct and only differ by their [`super::Artifact`] variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlArtifact {
    pub value: String,
    #[serde(default, skip_serializing_if = "ArtifactMeta::is_empty")]
    pub meta: ArtifactMeta,
}

impl UrlArtifact {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            meta: ArtifactMeta::default(),
        }
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        self.value.clone()
    }

    /// Downloads the referenced content under the default [`RetryPolicy`].
    /// Any non-2xx answer is an error that carries the status code.
    pub async fn fetch(&self, headers: Option<&HeaderMap>) -> Result<Vec<u8>, RemoteFetchError> {
        self.fetch_with_policy(headers, &RetryPolicy::default()).await
    }

    /// Downloads the referenced content, retrying transport failures and
    /// 408, 429 and 5xx answers under `policy`.
    #[instrument(skip(self, headers, policy), fields(url = %self.value))]
    pub async fn fetch_with_policy(
        &self,
        headers: Option<&HeaderMap>,
        policy: &RetryPolicy,
    ) -> Result<Vec<u8>, RemoteFetchError> {
        policy.retrying(|_| self.try_fetch(headers)).await
    }

    async fn try_fetch(&self, headers: Option<&HeaderMap>) -> Result<Vec<u8>, RemoteFetchError> {
        let mut request = http_client().get(&self.value);
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }
        let response = request
            .send()
            .await
            .map_err(|e| RemoteFetchError::from_reqwest(&self.value, &e))?;

        let status = response.status();
        debug!(%status, "Received url response");
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RemoteFetchError::from_status(&self.value, status.as_u16(), body));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| RemoteFetchError::from_reqwest(&self.value, &e))
    }
}

fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(reqwest::Client::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fetch_success_with_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/image.png")
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_body("png-bytes")
            .create_async()
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("secret"));
        let artifact = UrlArtifact::new(format!("{}/image.png", server.url()));
        let bytes = artifact.fetch(Some(&headers)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, b"png-bytes");
    }

    #[tokio::test]
    async fn test_fetch_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("nope")
            .create_async()
            .await;

        let artifact = UrlArtifact::new(format!("{}/missing", server.url()));
        let err = artifact.fetch(None).await.unwrap_err();
        assert_eq!(err.status, Some(404));
        assert!(!err.timeout);
    }

    #[tokio::test]
    async fn test_fetch_retries_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let unavailable = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/flaky")
            .with_status(200)
            .with_body("payload")
            .expect(1)
            .create_async()
            .await;

        let policy = RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(2), 3).unwrap();
        let artifact = UrlArtifact::new(format!("{}/flaky", server.url()));
        let bytes = artifact.fetch_with_policy(None, &policy).await.unwrap();

        unavailable.assert_async().await;
        ok.assert_async().await;
        assert_eq!(bytes, b"payload");
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/gone")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let policy = RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(2), 3).unwrap();
        let artifact = UrlArtifact::new(format!("{}/gone", server.url()));
        let err = artifact.fetch_with_policy(None, &policy).await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.status, Some(404));
    }
}
