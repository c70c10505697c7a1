use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Artifact;

/// Metadata attached to an artifact.
///
/// The generic case is an open map. Well known shapes get their own variant
/// so consumers can match on them instead of probing keys. Every variant
/// keeps an open map for additive annotations (rerank logits, usage, ...).
///
/// Serialized untagged: generic meta is the plain map, the other variants
/// are recognized by their exact field set (`sources`/`url` plus `extra`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactMeta {
    Derived(DerivedArtifactMeta),
    Web(WebArtifactMeta),
    Generic(Map<String, Value>),
}

/// Meta of an artifact produced from other artifacts (summaries, extractions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivedArtifactMeta {
    pub sources: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Meta of an artifact that was retrieved from a web page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebArtifactMeta {
    pub url: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Default for ArtifactMeta {
    fn default() -> Self {
        Self::Generic(Map::new())
    }
}

impl ArtifactMeta {
    #[must_use]
    pub fn derived(sources: Vec<Artifact>) -> Self {
        Self::Derived(DerivedArtifactMeta {
            sources,
            extra: Map::new(),
        })
    }

    #[must_use]
    pub fn web(url: impl Into<String>) -> Self {
        Self::Web(WebArtifactMeta {
            url: url.into(),
            extra: Map::new(),
        })
    }

    /// True for a generic meta without any entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Generic(m) if m.is_empty())
    }

    fn entries(&self) -> &Map<String, Value> {
        match self {
            Self::Generic(m) => m,
            Self::Derived(d) => &d.extra,
            Self::Web(w) => &w.extra,
        }
    }

    fn entries_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            Self::Generic(m) => m,
            Self::Derived(d) => &mut d.extra,
            Self::Web(w) => &mut w.extra,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries().get(key)
    }

    /// Adds (or overwrites) a single annotation. The variant is preserved.
    pub fn annotate(&mut self, key: impl Into<String>, value: Value) {
        self.entries_mut().insert(key.into(), value);
    }

    /// Merges `other` into the open map of this meta.
    pub fn merge(&mut self, other: Map<String, Value>) {
        self.entries_mut().extend(other);
    }

    #[must_use]
    pub fn sources(&self) -> Option<&[Artifact]> {
        match self {
            Self::Derived(d) => Some(&d.sources),
            _ => None,
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Web(w) => Some(&w.url),
            _ => None,
        }
    }
}
