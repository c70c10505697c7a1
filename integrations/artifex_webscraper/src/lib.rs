//! HTML web scraper implementing [`WebScraperDriver`].
//!
//! Fetches a page with `reqwest`, optionally narrows it down to the elements
//! matching a CSS selector, and returns either their markup or their text.

use artifex::{
    drivers::{
        web_scraper::{ScrapeOptions, WebScraperDriver},
        DriverEnvelope, DriverError,
    },
    error::RemoteFetchError,
    observability::Instrumentation,
    retry::RetryPolicy,
};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, error, instrument};

const DRIVER: &str = "HtmlWebScraperDriver";

/// Web scraper for HTML pages.
///
/// ```rust,no_run
/// use artifex::drivers::web_scraper::{ScrapeOptions, WebScraperDriver};
/// use artifex_webscraper::HtmlWebScraperDriver;
///
/// # async fn run() -> Result<(), artifex::drivers::DriverError> {
/// let options = ScrapeOptions::default().with_selector("div.content").text_only();
/// let page = HtmlWebScraperDriver::new()
///     .scrape_to_artifact("https://example.com", &options)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct HtmlWebScraperDriver {
    client: reqwest::Client,
    envelope: DriverEnvelope,
}

impl HtmlWebScraperDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.envelope.retry_policy = retry_policy;
        self
    }

    #[must_use]
    pub fn with_instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.envelope.instrumentation = instrumentation;
        self
    }

    async fn fetch(&self, url: &str, options: &ScrapeOptions) -> Result<String, DriverError> {
        let mut request = self.client.get(url);
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| DriverError::Config {
                driver: DRIVER,
                message: format!("Invalid header name `{name}`: {e}"),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| DriverError::Config {
                driver: DRIVER,
                message: format!("Invalid value for header `{name}`: {e}"),
            })?;
            request = request.header(name, value);
        }

        let exchange = async {
            let response = request.send().await.map_err(|e| {
                error!(error = ?e, url, "Request failed");
                DriverError::from_reqwest(DRIVER, "scrape_url", url, &e)
            })?;
            let status = response.status();
            debug!(%status, url, "Received page");
            let body = response
                .text()
                .await
                .map_err(|e| DriverError::from_reqwest(DRIVER, "scrape_url", url, &e))?;
            if status.is_success() {
                Ok(body)
            } else {
                Err(DriverError::from_response(
                    DRIVER,
                    "scrape_url",
                    url,
                    status.as_u16(),
                    body,
                ))
            }
        };

        match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange)
                .await
                .map_err(|_| DriverError::RemoteFetch {
                    driver: DRIVER,
                    operation: "scrape_url",
                    source: RemoteFetchError::timed_out(url),
                })?,
            None => exchange.await,
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector).map_err(|e| DriverError::Config {
        driver: DRIVER,
        message: format!("Invalid CSS selector `{selector}`: {e}"),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Narrows `html` down to `selector` matches and renders markup or text.
fn extract(html: &str, selector: Option<&Selector>, text_only: bool) -> String {
    let document = Html::parse_document(html);
    match (selector, text_only) {
        (Some(selector), true) => document
            .select(selector)
            .map(element_text)
            .collect::<Vec<_>>()
            .join("\n"),
        (Some(selector), false) => document
            .select(selector)
            .map(|e| e.html())
            .collect::<Vec<_>>()
            .join("\n"),
        (None, true) => element_text(document.root_element()),
        (None, false) => html.to_string(),
    }
}

#[async_trait]
impl WebScraperDriver for HtmlWebScraperDriver {
    #[instrument(skip(self, options), fields(selector = ?options.selector))]
    async fn scrape_url(&self, url: &str, options: &ScrapeOptions) -> Result<String, DriverError> {
        let selector = options.selector.as_deref().map(parse_selector).transpose()?;
        let html = self
            .envelope
            .call(DRIVER, "scrape_url", |_| self.fetch(url, options))
            .await?;
        Ok(extract(&html, selector.as_ref(), options.text_only))
    }
}
