use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Add;

use super::ArtifactMeta;
use crate::{
    drivers::{embedding::EmbeddingDriver, DriverError},
    tokenizers::Tokenizer,
};

/// Plain text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextArtifact {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "ArtifactMeta::is_empty")]
    pub meta: ArtifactMeta,
}

impl TextArtifact {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            encoding: None,
            meta: ArtifactMeta::default(),
        }
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: ArtifactMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Returns the artifact with one more meta annotation.
    #[must_use]
    pub fn annotated(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.annotate(key, value);
        self
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        self.value.clone()
    }

    #[must_use]
    pub fn token_count(&self, tokenizer: &dyn Tokenizer) -> usize {
        tokenizer.count_tokens(&self.value)
    }

    pub async fn generate_embedding(
        &self,
        driver: &dyn EmbeddingDriver,
    ) -> Result<Vec<f64>, DriverError> {
        driver.embed_text_artifact(self).await
    }
}

impl Add for TextArtifact {
    type Output = TextArtifact;

    /// Concatenates the values, keeping the left hand side's meta.
    fn add(mut self, rhs: Self) -> Self::Output {
        self.value.push_str(&rhs.value);
        self
    }
}

impl From<&str> for TextArtifact {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TextArtifact {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Human readable advisory message, e.g. the outcome of a storage operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoArtifact {
    pub value: String,
    #[serde(default, skip_serializing_if = "ArtifactMeta::is_empty")]
    pub meta: ArtifactMeta,
}

impl InfoArtifact {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            meta: ArtifactMeta::default(),
        }
    }

    #[must_use]
    pub fn annotated(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.annotate(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizers::SimpleTokenizer;
    use serde_json::json;

    #[test]
    fn test_concatenation() {
        let joined = TextArtifact::new("foo ") + TextArtifact::new("bar");
        assert_eq!(joined.value, "foo bar");
    }

    #[test]
    fn test_token_count() {
        let tokenizer = SimpleTokenizer::new("test-model", 3, 100, 10).unwrap();
        let artifact = TextArtifact::new("foobar");
        assert_eq!(artifact.token_count(&tokenizer), 2);
    }

    #[test]
    fn test_annotated() {
        let artifact = TextArtifact::new("a").annotated("logit", json!(0.9));
        assert_eq!(artifact.meta.get("logit"), Some(&json!(0.9)));
    }
}
