use serde_json::{Map, Value};
use tracing::error;

use super::ParserDriver;
use crate::{
    artifacts::{Artifact, ListArtifact, TextArtifact},
    drivers::DriverError,
};

const DRIVER: &str = "PdfParserDriver";

/// Extracts the text of a PDF, one [`TextArtifact`] per page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfParserDriver;

impl ParserDriver for PdfParserDriver {
    fn try_parse(&self, data: &[u8], meta: &Map<String, Value>) -> Result<Artifact, DriverError> {
        let text = pdf_extract::extract_text_from_mem(data).map_err(|e| {
            error!(error = %e, "Failed to extract pdf text");
            DriverError::Parse {
                driver: DRIVER,
                operation: "try_parse",
                offset: 0,
                message: e.to_string(),
            }
        })?;

        let pages = text
            .split('\u{c}')
            .filter(|page| !page.trim().is_empty())
            .map(|page| {
                let mut artifact = TextArtifact::new(page.trim());
                artifact.meta.merge(meta.clone());
                Artifact::from(artifact)
            });
        Ok(pages.collect::<ListArtifact>().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_parse_error() {
        let err = PdfParserDriver.try_parse(b"not a pdf", &Map::new()).unwrap_err();
        assert!(matches!(err, DriverError::Parse { driver: DRIVER, .. }));
    }
}
