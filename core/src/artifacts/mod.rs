mod blob;
mod list;
mod meta;
mod text;
mod url;

pub use blob::{BlobArtifact, ImageArtifact};
pub use list::ListArtifact;
pub use meta::{ArtifactMeta, DerivedArtifactMeta, WebArtifactMeta};
pub use text::{InfoArtifact, TextArtifact};
pub use url::UrlArtifact;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    error::RemoteFetchError,
    retry::{RetryPolicy, Retryable},
    tokenizers::Tokenizer,
};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    RemoteFetch(#[from] RemoteFetchError),
    #[error("Failed to (de)serialize artifact: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Retryable for ArtifactError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteFetch(e) => e.is_retryable(),
            Self::Serialization(_) => false,
        }
    }
}

/// A typed content record passed between drivers and storage.
///
/// Serializes as `{"type": "<Variant>Artifact", "value": ..., "meta": {...}}`,
/// which is enough to rebuild the concrete variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Artifact {
    #[serde(rename = "TextArtifact")]
    Text(TextArtifact),
    #[serde(rename = "BlobArtifact")]
    Blob(BlobArtifact),
    #[serde(rename = "ImageArtifact")]
    Image(ImageArtifact),
    #[serde(rename = "InfoArtifact")]
    Info(InfoArtifact),
    #[serde(rename = "ListArtifact")]
    List(ListArtifact),
    #[serde(rename = "UrlArtifact")]
    Url(UrlArtifact),
    #[serde(rename = "ImageUrlArtifact")]
    ImageUrl(UrlArtifact),
    #[serde(rename = "AudioUrlArtifact")]
    AudioUrl(UrlArtifact),
    #[serde(rename = "VideoUrlArtifact")]
    VideoUrl(UrlArtifact),
}

impl Artifact {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "TextArtifact",
            Self::Blob(_) => "BlobArtifact",
            Self::Image(_) => "ImageArtifact",
            Self::Info(_) => "InfoArtifact",
            Self::List(_) => "ListArtifact",
            Self::Url(_) => "UrlArtifact",
            Self::ImageUrl(_) => "ImageUrlArtifact",
            Self::AudioUrl(_) => "AudioUrlArtifact",
            Self::VideoUrl(_) => "VideoUrlArtifact",
        }
    }

    #[must_use]
    pub fn meta(&self) -> &ArtifactMeta {
        match self {
            Self::Text(a) => &a.meta,
            Self::Blob(a) => &a.meta,
            Self::Image(a) => &a.meta,
            Self::Info(a) => &a.meta,
            Self::List(a) => &a.meta,
            Self::Url(a) | Self::ImageUrl(a) | Self::AudioUrl(a) | Self::VideoUrl(a) => &a.meta,
        }
    }

    fn meta_mut(&mut self) -> &mut ArtifactMeta {
        match self {
            Self::Text(a) => &mut a.meta,
            Self::Blob(a) => &mut a.meta,
            Self::Image(a) => &mut a.meta,
            Self::Info(a) => &mut a.meta,
            Self::List(a) => &mut a.meta,
            Self::Url(a) | Self::ImageUrl(a) | Self::AudioUrl(a) | Self::VideoUrl(a) => {
                &mut a.meta
            }
        }
    }

    /// Returns the artifact with one more meta annotation.
    #[must_use]
    pub fn annotated(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta_mut().annotate(key, value);
        self
    }

    /// Returns the artifact with `entries` merged into its meta.
    #[must_use]
    pub fn merge_meta(mut self, entries: serde_json::Map<String, Value>) -> Self {
        self.meta_mut().merge(entries);
        self
    }

    /// Best-effort text rendering, never fails.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(a) => a.to_text(),
            Self::Blob(a) => a.to_text(),
            Self::Image(a) => a.to_text(),
            Self::Info(a) => a.value.clone(),
            Self::List(a) => a.to_text(),
            Self::Url(a) | Self::ImageUrl(a) | Self::AudioUrl(a) | Self::VideoUrl(a) => a.to_text(),
        }
    }

    /// Raw bytes of the artifact. URL variants are downloaded with the
    /// optional `headers` under the default [`RetryPolicy`].
    pub async fn to_bytes(&self, headers: Option<&HeaderMap>) -> Result<Vec<u8>, ArtifactError> {
        self.to_bytes_with_policy(headers, &RetryPolicy::default()).await
    }

    pub async fn to_bytes_with_policy(
        &self,
        headers: Option<&HeaderMap>,
        policy: &RetryPolicy,
    ) -> Result<Vec<u8>, ArtifactError> {
        match self {
            Self::Blob(a) => Ok(a.value.clone()),
            Self::Image(a) => Ok(a.value.clone()),
            Self::Url(a) | Self::ImageUrl(a) | Self::AudioUrl(a) | Self::VideoUrl(a) => {
                Ok(a.fetch_with_policy(headers, policy).await?)
            }
            other => Ok(other.to_text().into_bytes()),
        }
    }

    /// Token count for text artifacts, `None` for everything else.
    #[must_use]
    pub fn token_count(&self, tokenizer: &dyn Tokenizer) -> Option<usize> {
        match self {
            Self::Text(a) => Some(a.token_count(tokenizer)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&TextArtifact> {
        match self {
            Self::Text(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn to_json(&self) -> Result<String, ArtifactError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<TextArtifact> for Artifact {
    fn from(value: TextArtifact) -> Self {
        Self::Text(value)
    }
}

impl From<BlobArtifact> for Artifact {
    fn from(value: BlobArtifact) -> Self {
        Self::Blob(value)
    }
}

impl From<ImageArtifact> for Artifact {
    fn from(value: ImageArtifact) -> Self {
        Self::Image(value)
    }
}

impl From<InfoArtifact> for Artifact {
    fn from(value: InfoArtifact) -> Self {
        Self::Info(value)
    }
}

impl From<ListArtifact> for Artifact {
    fn from(value: ListArtifact) -> Self {
        Self::List(value)
    }
}

impl From<UrlArtifact> for Artifact {
    fn from(value: UrlArtifact) -> Self {
        Self::Url(value)
    }
}
