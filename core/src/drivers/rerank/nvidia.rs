use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{apply_rankings, Ranking, RerankDriver};
use crate::{
    artifacts::TextArtifact,
    config::{parse_config, read_api_key},
    drivers::{
        http::{bearer_headers, post_json},
        DriverEnvelope, DriverError,
    },
    observability::Instrumentation,
    retry::RetryPolicy,
    runnable::RunHooks,
};

const DRIVER: &str = "NvidiaRerankDriver";
const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_MODEL: &str = "nvidia/nv-rerankqa-mistral-4b-v3";

/// How the service treats passages longer than the model's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Truncate {
    #[default]
    None,
    End,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    truncate: Option<Truncate>,
}

#[derive(Deserialize)]
struct RankingResponse {
    rankings: Vec<Ranking>,
}

/// Reranker for NVIDIA NIM `/v1/ranking` endpoints.
pub struct NvidiaRerankDriver {
    base_url: String,
    model: String,
    truncate: Truncate,
    headers: HeaderMap,
    client: reqwest::Client,
    envelope: DriverEnvelope,
    hooks: RunHooks,
}

impl NvidiaRerankDriver {
    /// `headers` are sent with every request; pass an empty map for
    /// unauthenticated local deployments.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            truncate: Truncate::default(),
            headers,
            client: reqwest::Client::new(),
            envelope: DriverEnvelope::default(),
            hooks: RunHooks::default(),
        }
    }

    /// Reads the API key only when `api_key_var` is configured.
    #[instrument]
    pub fn from_config(json_config: Option<&str>) -> Result<Self, DriverError> {
        let config: ModelConfig = parse_config(DRIVER, json_config)?;
        let headers = match &config.api_key_var {
            Some(var) => bearer_headers(DRIVER, &read_api_key(DRIVER, var)?)?,
            None => HeaderMap::new(),
        };
        Ok(Self::new(
            config.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            headers,
        )
        .with_truncate(config.truncate.unwrap_or_default()))
    }

    #[must_use]
    pub fn with_truncate(mut self, truncate: Truncate) -> Self {
        self.truncate = truncate;
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

        let url = format!("{}/v1/ranking", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "query": {"text": query},
            "passages": artifacts.iter().map(|a| json!({"text": a.to_text()})).collect::<Vec<_>>(),
            "truncate": self.truncate,
        });

        self.envelope
            .call(DRIVER, "run", |_| async {
                let output =
                    post_json(&self.client, DRIVER, "run", &url, &self.headers, &body).await?;
                let response: RankingResponse = serde_json::from_value(output)
                    .map_err(|e| DriverError::protocol(DRIVER, "run", e))?;
                apply_rankings(DRIVER, artifacts, response.rankings)
            })
            .await
    }
}

#[async_trait]
impl RerankDriver for NvidiaRerankDriver {
    #[instrument(skip(self, artifacts), fields(model = %self.model, count = artifacts.len()))]
    async fn run(
        &self,
        query: &str,
        artifacts: Vec<TextArtifact>,
    ) -> Result<Vec<TextArtifact>, DriverError> {
        self.hooks.run(DRIVER, self.rerank(query, &artifacts)).await
    }
}
