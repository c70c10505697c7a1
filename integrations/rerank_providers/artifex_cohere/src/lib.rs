//! [Cohere](https://cohere.com) rerank endpoint behind Artifex's
//! [`RerankDriver`] trait.

use artifex::{
    artifacts::TextArtifact,
    config::{parse_config, read_api_key},
    drivers::{
        http::{bearer_headers, post_json},
        rerank::{apply_rankings, Ranking, RerankDriver},
        DriverEnvelope, DriverError,
    },
    observability::Instrumentation,
    retry::RetryPolicy,
    runnable::RunHooks,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

const DRIVER: &str = "CohereRerankDriver";
const API_KEY_ENV_VAR: &str = "COHERE_API_KEY";
const URL: &str = "https://api.cohere.com/v2/rerank";
const DEFAULT_MODEL: &str = "rerank-v3.5";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
    top_n: Option<usize>,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<Ranking>,
    #[serde(default)]
    meta: Option<Value>,
}

/// Reranker for Cohere's `/v2/rerank` endpoint.
///
/// Results carry `relevance_score` as their `logit` annotation. The
/// response level billing meta, when present, is attached as `usage`.
pub struct CohereRerankDriver {
    api_url: String,
    model: String,
    top_n: Option<usize>,
    headers: HeaderMap,
    client: reqwest::Client,
    envelope: DriverEnvelope,
    hooks: RunHooks,
}

impl CohereRerankDriver {
    pub fn new(
        api_key: &str,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, DriverError> {
        Ok(Self {
            api_url: api_url.into(),
            model: model.into(),
            top_n: None,
            headers: bearer_headers(DRIVER, api_key)?,
            client: reqwest::Client::new(),
            envelope: DriverEnvelope::default(),
            hooks: RunHooks::default(),
        })
    }

    #[instrument]
    pub fn from_config(json_config: Option<&str>) -> Result<Self, DriverError> {
        let config: ModelConfig = parse_config(DRIVER, json_config)?;
        let api_key = read_api_key(
            DRIVER,
            config.api_key_var.as_deref().unwrap_or(API_KEY_ENV_VAR),
        )?;
        let driver = Self::new(
            &api_key,
            config.api_url.unwrap_or_else(|| URL.to_string()),
            config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        )?;
        Ok(match config.top_n {
            Some(top_n) => driver.with_top_n(top_n),
            None => driver,
        })
    }

    /// Keeps only the `top_n` best results.
    #[must_use]
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: RunHooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.envelope.retry_policy = retry_policy;
        self
    }

    #[must_use]
    pub fn with_instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.envelope.instrumentation = instrumentation;
        self
    }

    async fn rerank(
        &self,
        query: &str,
        artifacts: &[TextArtifact],
    ) -> Result<Vec<TextArtifact>, DriverError> {
        if artifacts.is_empty() {
            debug!(driver = DRIVER, "No artifacts to rerank");
            return Ok(Vec::new());
        }

        let mut body = json!({
            "model": self.model,
            "query": query,
            "documents": artifacts.iter().map(TextArtifact::to_text).collect::<Vec<_>>(),
        });
        if let Some(top_n) = self.top_n {
            body["top_n"] = json!(top_n);
        }

        self.envelope
            .call(DRIVER, "run", |_| async {
                let output =
                    post_json(&self.client, DRIVER, "run", &self.api_url, &self.headers, &body)
                        .await?;
                let response: RerankResponse = serde_json::from_value(output)
                    .map_err(|e| DriverError::protocol(DRIVER, "run", e))?;
                let rankings = response
                    .results
                    .into_iter()
                    .map(|ranking| Ranking {
                        usage: ranking.usage.or_else(|| response.meta.clone()),
                        ..ranking
                    })
                    .collect();
                apply_rankings(DRIVER, artifacts, rankings)
            })
            .await
    }
}

#[async_trait]
impl RerankDriver for CohereRerankDriver {
    #[instrument(skip(self, artifacts), fields(model = %self.model, count = artifacts.len()))]
    async fn run(
        &self,
        query: &str,
        artifacts: Vec<TextArtifact>,
    ) -> Result<Vec<TextArtifact>, DriverError> {
        self.hooks.run(DRIVER, self.rerank(query, &artifacts)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(server: &mockito::ServerGuard) -> CohereRerankDriver {
        CohereRerankDriver::new("test-key", format!("{}/v2/rerank", server.url()), DEFAULT_MODEL)
            .unwrap()
            .with_retry_policy(RetryPolicy::no_retry())
    }

    fn texts(values: &[&str]) -> Vec<TextArtifact> {
        values.iter().map(|v| TextArtifact::new(*v)).collect()
    }

    #[tokio::test]
    async fn test_run_orders_by_relevance_score() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/rerank")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::Json(json!({
                "model": DEFAULT_MODEL,
                "query": "rust",
                "documents": ["python", "rust", "go"],
                "top_n": 2
            })))
            .with_body(
                json!({
                    "results": [
                        {"index": 1, "relevance_score": 0.98},
                        {"index": 2, "relevance_score": 0.12}
                    ],
                    "meta": {"billed_units": {"search_units": 1}}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let result = driver(&server)
            .with_top_n(2)
            .run("rust", texts(&["python", "rust", "go"]))
            .await
            .unwrap();

        mock.assert_async().await;
        let values: Vec<_> = result.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, vec!["rust", "go"]);
        assert_eq!(result[0].meta.get("logit").unwrap(), 0.98);
        assert_eq!(
            result[0].meta.get("usage").unwrap()["billed_units"]["search_units"],
            1
        );
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/rerank")
            .expect(0)
            .create_async()
            .await;

        let result = driver(&server).run("q", Vec::new()).await.unwrap();

        mock.assert_async().await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_index_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/rerank")
            .with_body(json!({"results": [{"index": 5, "relevance_score": 0.5}]}).to_string())
            .create_async()
            .await;

        let err = driver(&server).run("q", texts(&["a"])).await.unwrap_err();
        assert!(matches!(err, DriverError::Protocol { driver: DRIVER, .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_is_provider_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/rerank")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let err = driver(&server).run("q", texts(&["a"])).await.unwrap_err();
        assert!(matches!(
            err,
            DriverError::ProviderUnavailable { status: Some(429), .. }
        ));
    }
}
