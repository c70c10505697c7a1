use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};
use tracing::debug;

use super::ParserDriver;
use crate::{
    artifacts::{Artifact, TextArtifact},
    drivers::DriverError,
};

const DRIVER: &str = "TextParserDriver";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl TextEncoding {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
        }
    }

    /// Decodes `data`, returning the offset of the first invalid byte on
    /// failure.
    fn decode(self, data: &[u8]) -> Result<String, (usize, String)> {
        match self {
            Self::Utf8 => std::str::from_utf8(data)
                .map(str::to_string)
                .map_err(|e| (e.valid_up_to(), e.to_string())),
            Self::Ascii => match data.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err((
                    offset,
                    format!("byte 0x{:02x} is not ascii", data[offset]),
                )),
                None => Ok(data.iter().map(|&b| char::from(b)).collect()),
            },
            Self::Latin1 => Ok(data.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextEncoding {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(DriverError::Config {
                driver: DRIVER,
                message: format!("Unsupported encoding `{other}`"),
            }),
        }
    }
}

/// Decodes bytes into a [`TextArtifact`] carrying the encoding used.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParserDriver {
    encoding: TextEncoding,
}

impl TextParserDriver {
    #[must_use]
    pub fn new(encoding: TextEncoding) -> Self {
        Self { encoding }
    }

    #[must_use]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }
}

impl ParserDriver for TextParserDriver {
    fn try_parse(&self, data: &[u8], meta: &Map<String, Value>) -> Result<Artifact, DriverError> {
        let text = self
            .encoding
            .decode(data)
            .map_err(|(offset, message)| DriverError::Parse {
                driver: DRIVER,
                operation: "try_parse",
                offset,
                message,
            })?;
        debug!(encoding = %self.encoding, bytes = data.len(), "Parsed text");

        let mut artifact = TextArtifact::new(text).with_encoding(self.encoding.as_str());
        artifact.meta.merge(meta.clone());
        Ok(artifact.into())
    }
}
