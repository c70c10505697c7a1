use crate::{
    artifacts::ArtifactError, drivers::DriverError, memory::ToolMemoryError,
    retry::RetryPolicyError, tokenizers::TokenizerError,
};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("Tool memory error: {0}")]
    ToolMemory(#[from] ToolMemoryError),
    #[error("Retry policy error: {0}")]
    RetryPolicy(#[from] RetryPolicyError),
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
}

/// Failure to fetch a remote resource over HTTP.
///
/// `status` is set whenever the server answered, `timeout` when the request
/// never completed within the client's deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFetchError {
    pub url: String,
    pub status: Option<u16>,
    pub timeout: bool,
    pub message: String,
}

impl RemoteFetchError {
    pub fn from_status(url: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
            timeout: false,
            message: message.into(),
        }
    }

    pub fn from_reqwest(url: impl Into<String>, error: &reqwest::Error) -> Self {
        Self {
            url: url.into(),
            status: error.status().map(|s| s.as_u16()),
            timeout: error.is_timeout(),
            message: error.to_string(),
        }
    }

    pub fn timed_out(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: None,
            timeout: true,
            message: "request timed out".to_string(),
        }
    }
}

impl fmt::Display for RemoteFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to fetch `{}`", self.url)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {status})")?;
        }
        if self.timeout {
            write!(f, " (timeout)")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for RemoteFetchError {}
