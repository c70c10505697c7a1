use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::{
    artifacts::{ArtifactMeta, ListArtifact, TextArtifact},
    drivers::{
        prompt::{Prompt, PromptDriver, PromptParams},
        DriverError,
    },
};

#[async_trait]
pub trait SummaryEngine: Send + Sync {
    async fn summarize_text(&self, text: &str) -> Result<TextArtifact, DriverError>;

    /// Summarizes the text of every artifact in `artifacts`. The summary's
    /// meta lists the artifacts as its sources.
    async fn summarize_artifacts(&self, artifacts: &ListArtifact) -> Result<TextArtifact, DriverError> {
        let summary = self.summarize_text(&artifacts.to_text()).await?;
        Ok(summary.with_meta(ArtifactMeta::derived(artifacts.value.clone())))
    }
}

/// Summarizes with a prompt driver. Input larger than the driver's token
/// budget is summarized chunk by chunk, each step folding the running
/// summary into the next chunk.
pub struct PromptSummaryEngine {
    prompt_driver: Arc<dyn PromptDriver>,
    params: PromptParams,
    /// Share of the input budget given to a single chunk.
    chunk_ratio: f64,
}

impl PromptSummaryEngine {
    pub fn new(prompt_driver: Arc<dyn PromptDriver>) -> Self {
        Self {
            prompt_driver,
            params: PromptParams {
                temperature: 0.0,
                ..PromptParams::default()
            },
            chunk_ratio: 0.5,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: PromptParams) -> Self {
        self.params = params;
        self
    }

    fn prompt(text: &str, previous: Option<&str>) -> Prompt {
        let system = match previous {
            None => "Summarize the following text concisely. Keep every important fact.".to_string(),
            Some(summary) => format!(
                "Extend the summary below with the facts of the following text. Keep every \
                 important fact.\n\nSummary so far:\n{summary}"
            ),
        };
        Prompt::Conversation(vec![
            TextArtifact::new(system).annotated("role", json!("system")),
            TextArtifact::new(text),
        ])
    }

    fn chunks(&self, text: &str) -> Vec<String> {
        let tokenizer = self.prompt_driver.tokenizer();
        let budget = (tokenizer.max_input_tokens() as f64 * self.chunk_ratio) as usize;
        let budget = budget.max(1);
        if tokenizer.count_tokens(text) <= budget {
            return vec![text.to_string()];
        }
        tokenizer
            .encode(text)
            .chunks(budget)
            .map(|tokens| tokenizer.decode(tokens))
            .collect()
    }
}

#[async_trait]
impl SummaryEngine for PromptSummaryEngine {
    #[instrument(skip_all, fields(driver = self.prompt_driver.name()))]
    async fn summarize_text(&self, text: &str) -> Result<TextArtifact, DriverError> {
        let chunks = self.chunks(text);
        debug!(chunks = chunks.len(), "Summarizing");

        let mut summary: Option<TextArtifact> = None;
        for chunk in &chunks {
            let prompt = Self::prompt(chunk, summary.as_ref().map(|s| s.value.as_str()));
            summary = Some(self.prompt_driver.complete(&prompt, &self.params).await?);
        }
        Ok(summary.unwrap_or_else(|| TextArtifact::new("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        drivers::{prompt::message_role, DriverEnvelope},
        retry::RetryPolicy,
        tokenizers::{SimpleTokenizer, Tokenizer},
    };
    use std::sync::Mutex;

    /// Answers with the number of the call and records every prompt.
    struct CountingPromptDriver {
        tokenizer: SimpleTokenizer,
        envelope: DriverEnvelope,
        prompts: Mutex<Vec<Prompt>>,
    }

    impl CountingPromptDriver {
        fn new(max_input_tokens: usize) -> Self {
            Self {
                tokenizer: SimpleTokenizer::new("counting", 1, max_input_tokens, 100).unwrap(),
                envelope: DriverEnvelope {
                    retry_policy: RetryPolicy::no_retry(),
                    ..DriverEnvelope::default()
                },
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PromptDriver for CountingPromptDriver {
        fn name(&self) -> &'static str {
            "CountingPromptDriver"
        }
        fn tokenizer(&self) -> &dyn Tokenizer {
            &self.tokenizer
        }
        fn envelope(&self) -> &DriverEnvelope {
            &self.envelope
        }
        async fn try_complete(
            &self,
            prompt: &Prompt,
            _params: &PromptParams,
        ) -> Result<TextArtifact, DriverError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.clone());
            Ok(TextArtifact::new(format!("summary {}", prompts.len())))
        }
    }

    #[tokio::test]
    async fn test_short_text_single_call() {
        let driver = Arc::new(CountingPromptDriver::new(1000));
        let engine = PromptSummaryEngine::new(driver.clone());
        let list = ListArtifact::default()
            .with_item(TextArtifact::new("a"))
            .with_item(TextArtifact::new("b"));

        let summary = engine.summarize_artifacts(&list).await.unwrap();

        assert_eq!(summary.value, "summary 1");
        assert_eq!(summary.meta.sources().unwrap().len(), 2);
        let prompts = driver.prompts.lock().unwrap();
        let messages = prompts[0].messages();
        assert_eq!(message_role(messages[0]), "system");
        assert_eq!(messages[1].value, "a\n\nb");
    }

    #[tokio::test]
    async fn test_long_text_folds_summaries() {
        let driver = Arc::new(CountingPromptDriver::new(400));
        let engine = PromptSummaryEngine::new(driver.clone());

        let summary = engine.summarize_text(&"z".repeat(450)).await.unwrap();

        assert_eq!(summary.value, "summary 3");
        let prompts = driver.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[2].messages()[0].value.contains("summary 2"));
    }
}
