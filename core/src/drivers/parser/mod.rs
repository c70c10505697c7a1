//! Parser drivers turn raw bytes into artifacts.

#[cfg(feature = "pdf")]
mod pdf;
mod text;

#[cfg(feature = "pdf")]
pub use pdf::PdfParserDriver;
pub use text::{TextEncoding, TextParserDriver};

use serde_json::{Map, Value};

use super::DriverError;
use crate::artifacts::Artifact;

pub trait ParserDriver: Send + Sync {
    /// Parses `data`; `meta` is merged into the produced artifact's meta.
    fn try_parse(&self, data: &[u8], meta: &Map<String, Value>) -> Result<Artifact, DriverError>;
}
