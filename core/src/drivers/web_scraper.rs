//! Web scraper contract. The HTML implementation lives in the
//! `artifex_webscraper` integration crate.

use async_trait::async_trait;
use std::time::Duration;

use super::DriverError;
use crate::artifacts::{ArtifactMeta, TextArtifact};

/// Per call scraping options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeOptions {
    /// CSS selector; only matching elements are kept.
    pub selector: Option<String>,
    /// Keep the text content of the page instead of its markup.
    pub text_only: bool,
    /// Whole-request deadline. Expiry surfaces as a `RemoteFetch` error
    /// with `timeout` set.
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
}

impl ScrapeOptions {
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    #[must_use]
    pub fn text_only(mut self) -> Self {
        self.text_only = true;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[async_trait]
pub trait WebScraperDriver: Send + Sync {
    async fn scrape_url(&self, url: &str, options: &ScrapeOptions) -> Result<String, DriverError>;

    /// Scrapes `url` into a text artifact whose meta records the page url.
    async fn scrape_to_artifact(
        &self,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<TextArtifact, DriverError> {
        let content = self.scrape_url(url, options).await?;
        Ok(TextArtifact::new(content).with_meta(ArtifactMeta::web(url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoScraper;

    #[async_trait]
    impl WebScraperDriver for EchoScraper {
        async fn scrape_url(&self, url: &str, options: &ScrapeOptions) -> Result<String, DriverError> {
            Ok(format!("{url} {:?}", options.selector))
        }
    }

    #[tokio::test]
    async fn test_scrape_to_artifact_has_web_meta() {
        let options = ScrapeOptions::default().with_selector("main");
        let artifact = EchoScraper
            .scrape_to_artifact("https://example.com", &options)
            .await
            .unwrap();
        assert_eq!(artifact.value, "https://example.com Some(\"main\")");
        assert_eq!(artifact.meta.url(), Some("https://example.com"));
    }
}
