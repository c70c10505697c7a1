mod openai;

pub use openai::OpenAiChatPromptDriver;

use async_trait::async_trait;

use super::{DriverEnvelope, DriverError};
use crate::{
    artifacts::{Artifact, ListArtifact, TextArtifact},
    tokenizers::Tokenizer,
};

const DEFAULT_TEMP: f64 = 1.0;

/// Input of a prompt driver: a single text or a conversation of texts.
///
/// Conversation entries may carry a `role` meta annotation (`system`,
/// `user`, `assistant`); entries without one are sent as `user`.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Text(TextArtifact),
    Conversation(Vec<TextArtifact>),
}

impl Prompt {
    #[must_use]
    pub fn messages(&self) -> Vec<&TextArtifact> {
        match self {
            Self::Text(t) => vec![t],
            Self::Conversation(ts) => ts.iter().collect(),
        }
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        self.messages()
            .iter()
            .map(|t| t.value.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Builds a conversation from a list that only holds text artifacts.
    #[must_use]
    pub fn from_list(list: &ListArtifact) -> Option<Self> {
        list.iter()
            .map(Artifact::as_text)
            .collect::<Option<Vec<_>>>()
            .map(|texts| Self::Conversation(texts.into_iter().cloned().collect()))
    }
}

impl From<TextArtifact> for Prompt {
    fn from(value: TextArtifact) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Prompt {
    fn from(value: &str) -> Self {
        Self::Text(TextArtifact::new(value))
    }
}

impl From<Vec<TextArtifact>> for Prompt {
    fn from(value: Vec<TextArtifact>) -> Self {
        Self::Conversation(value)
    }
}

/// Role of a conversation entry, read from its `role` annotation.
#[must_use]
pub fn message_role(artifact: &TextArtifact) -> &str {
    artifact
        .meta
        .get("role")
        .and_then(|v| v.as_str())
        .unwrap_or("user")
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptParams {
    pub temperature: f64,
    /// Falls back to the tokenizer's `max_output_tokens` when unset.
    pub max_tokens: Option<usize>,
    pub stop: Vec<String>,
}

impl Default for PromptParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMP,
            max_tokens: None,
            stop: Vec::new(),
        }
    }
}

#[async_trait]
pub trait PromptDriver: Send + Sync {
    fn name(&self) -> &'static str;
    fn tokenizer(&self) -> &dyn Tokenizer;
    fn envelope(&self) -> &DriverEnvelope;

    /// One vendor round trip, without retries.
    async fn try_complete(
        &self,
        prompt: &Prompt,
        params: &PromptParams,
    ) -> Result<TextArtifact, DriverError>;

    /// Checks the prompt against the tokenizer's input budget, then calls
    /// [`PromptDriver::try_complete`] inside the retry envelope.
    async fn complete(
        &self,
        prompt: &Prompt,
        params: &PromptParams,
    ) -> Result<TextArtifact, DriverError> {
        let tokens_left = self.tokenizer().count_input_tokens_left(&prompt.to_text());
        if tokens_left < 0 {
            return Err(DriverError::ContextOverflow {
                driver: self.name(),
                operation: "complete",
                message: format!(
                    "prompt exceeds the {} input tokens of `{}` by {}",
                    self.tokenizer().max_input_tokens(),
                    self.tokenizer().model(),
                    -tokens_left
                ),
            });
        }
        self.envelope()
            .call(self.name(), "complete", |_| self.try_complete(prompt, params))
            .await
    }

    fn max_tokens(&self, params: &PromptParams) -> usize {
        params
            .max_tokens
            .unwrap_or_else(|| self.tokenizer().max_output_tokens())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::BlobArtifact;
    use serde_json::json;

    #[test]
    fn test_prompt_from_list() {
        let list = ListArtifact::default()
            .with_item(TextArtifact::new("a"))
            .with_item(TextArtifact::new("b"));
        let prompt = Prompt::from_list(&list).unwrap();
        assert_eq!(prompt.to_text(), "a\n\nb");

        let mixed = list.with_item(BlobArtifact::new(b"c".to_vec()));
        assert_eq!(Prompt::from_list(&mixed), None);
    }

    #[test]
    fn test_message_role_defaults_to_user() {
        assert_eq!(message_role(&TextArtifact::new("hi")), "user");
        let system = TextArtifact::new("be brief").annotated("role", json!("system"));
        assert_eq!(message_role(&system), "system");
    }
}
