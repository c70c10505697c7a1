use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ArtifactMeta;

/// Raw bytes with an optional name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobArtifact {
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "ArtifactMeta::is_empty")]
    pub meta: ArtifactMeta,
}

impl BlobArtifact {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            name: None,
            encoding: None,
            meta: ArtifactMeta::default(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
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

    #[must_use]
    pub fn annotated(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.annotate(key, value);
        self
    }

    /// Decodes the bytes with the blob's encoding, replacing invalid
    /// sequences. Latin-1 maps every byte; anything else is read as UTF-8.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self.encoding.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("latin-1" | "latin1" | "iso-8859-1") => {
                self.value.iter().map(|&b| char::from(b)).collect()
            }
            _ => String::from_utf8_lossy(&self.value).into_owned(),
        }
    }
}

/// Encoded image bytes, as produced by image generation drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageArtifact {
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    pub format: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "ArtifactMeta::is_empty")]
    pub meta: ArtifactMeta,
}

impl ImageArtifact {
    pub fn new(value: impl Into<Vec<u8>>, format: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            value: value.into(),
            format: format.into(),
            width,
            height,
            meta: ArtifactMeta::default(),
        }
    }

    #[must_use]
    pub fn with_meta(mut self, meta: ArtifactMeta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn annotated(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.annotate(key, value);
        self
    }

    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("image/{}", self.format)
    }

    #[must_use]
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.value)
    }

    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.base64())
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        format!(
            "Image, format: {}, size: {} bytes",
            self.format,
            self.value.len()
        )
    }
}

pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_serializes_as_base64() {
        let blob = BlobArtifact::new(b"foo".to_vec()).with_name("foo");
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json["value"], "Zm9v");
        assert_eq!(json["name"], "foo");
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_blob_to_text_is_lossy() {
        let blob = BlobArtifact::new(vec![b'o', b'k', 0xff]);
        assert_eq!(blob.to_text(), "ok\u{fffd}");
        assert_eq!(blob.with_encoding("latin-1").to_text(), "ok\u{ff}");
    }

    #[test]
    fn test_image_data_url() {
        let image = ImageArtifact::new(b"png".to_vec(), "png", 1, 1);
        assert_eq!(image.to_data_url(), "data:image/png;base64,cG5n");
        assert_eq!(image.to_text(), "Image, format: png, size: 3 bytes");
    }
}
