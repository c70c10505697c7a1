use serde::{Deserialize, Serialize};

use super::{Artifact, ArtifactMeta};

fn default_item_separator() -> String {
    "\n\n".to_string()
}

fn is_default_item_separator(separator: &String) -> bool {
    separator == "\n\n"
}

/// An ordered sequence of artifacts. Duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListArtifact {
    pub value: Vec<Artifact>,
    #[serde(
        default = "default_item_separator",
        skip_serializing_if = "is_default_item_separator"
    )]
    pub item_separator: String,
    #[serde(default, skip_serializing_if = "ArtifactMeta::is_empty")]
    pub meta: ArtifactMeta,
}

impl Default for ListArtifact {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ListArtifact {
    #[must_use]
    pub fn new(value: Vec<Artifact>) -> Self {
        Self {
            value,
            item_separator: default_item_separator(),
            meta: ArtifactMeta::default(),
        }
    }

    #[must_use]
    pub fn with_item_separator(mut self, separator: impl Into<String>) -> Self {
        self.item_separator = separator.into();
        self
    }

    #[must_use]
    pub fn with_item(mut self, artifact: impl Into<Artifact>) -> Self {
        self.value.push(artifact.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    #[must_use]
    pub fn has_items(&self) -> bool {
        !self.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Artifact> {
        self.value.iter()
    }

    /// The type name shared by every item, `None` when empty or mixed.
    #[must_use]
    pub fn child_type(&self) -> Option<&'static str> {
        let first = self.value.first()?.type_name();
        self.value
            .iter()
            .all(|a| a.type_name() == first)
            .then_some(first)
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        self.value
            .iter()
            .map(Artifact::to_text)
            .collect::<Vec<_>>()
            .join(&self.item_separator)
    }
}

impl FromIterator<Artifact> for ListArtifact {
    fn from_iter<T: IntoIterator<Item = Artifact>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for ListArtifact {
    type Item = Artifact;
    type IntoIter = std::vec::IntoIter<Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.value.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{BlobArtifact, TextArtifact};

    #[test]
    fn test_empty_list() {
        let list = ListArtifact::default();
        assert!(list.is_empty());
        assert!(!list.has_items());
        assert_eq!(list.child_type(), None);
        assert_eq!(list.to_text(), "");
    }

    #[test]
    fn test_preserves_order_and_duplicates() {
        let list = ListArtifact::default()
            .with_item(TextArtifact::new("a"))
            .with_item(TextArtifact::new("b"))
            .with_item(TextArtifact::new("a"));
        assert_eq!(list.len(), 3);
        assert_eq!(list.to_text(), "a\n\nb\n\na");
        assert_eq!(list.child_type(), Some("TextArtifact"));
    }

    #[test]
    fn test_mixed_child_type() {
        let list = ListArtifact::default()
            .with_item(TextArtifact::new("a"))
            .with_item(BlobArtifact::new(b"b".to_vec()));
        assert_eq!(list.child_type(), None);
    }
}
