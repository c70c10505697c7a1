//! # Artifex - Core API Documentation
//!
//! Artifex is a toolkit for building LLM applications out of typed content
//! records (artifacts) and pluggable provider adapters (drivers).
//!
//! ## Features
//!
//! - **Artifacts**: text, blobs, images, URLs and lists of them, with
//!   tagged JSON serialization and additive metadata
//! - **Drivers** for every role a workflow needs:
//!   - **Prompt**: chat completions (OpenAI here, Anthropic in `artifex_anthropic`)
//!   - **Embedding**: an HTTP driver composed with a vendor model driver
//!   - **Image generation**: text-to-image and image-to-image
//!   - **Rerank**: NVIDIA NIM, local cosine similarity, Cohere in `artifex_cohere`
//!   - **Parser**, **SQL**, **Storage**, **Vector store** and **Web scraper**
//! - **Retry envelope** with exponential back-off around every remote call
//! - **Tool memory**: namespaced storage routing artifacts to backends by type
//!
//! ## Examples
//!
//! ### Completing a prompt
//!
//! ```rust,no_run
//! use artifex::drivers::prompt::{OpenAiChatPromptDriver, PromptDriver, PromptParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), artifex::error::Error> {
//!     // Reads OPENAI_API_KEY
//!     let driver = OpenAiChatPromptDriver::from_config(None)?;
//!     let answer = driver
//!         .complete(&"Explain quantum computing".into(), &PromptParams::default())
//!         .await?;
//!     println!("{}", answer.value);
//!     Ok(())
//! }
//! ```
//!
//! ### Storing tool output in memory
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use artifex::{
//!     artifacts::{BlobArtifact, TextArtifact},
//!     drivers::{
//!         embedding::{HttpEmbeddingDriver, OpenAiEmbeddingModel},
//!         vector::LocalVectorStoreDriver,
//!     },
//!     engines::VectorQueryEngine,
//!     memory::{BlobArtifactStorage, TextArtifactStorage, ToolMemory},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), artifex::error::Error> {
//!     let embedder = HttpEmbeddingDriver::new(OpenAiEmbeddingModel::from_config(None)?);
//!     let engine = VectorQueryEngine::new(Arc::new(LocalVectorStoreDriver::new(Arc::new(embedder))));
//!
//!     let memory = ToolMemory::new("default")
//!         .with_storage(Arc::new(TextArtifactStorage::new(engine)))
//!         .with_storage(Arc::new(BlobArtifactStorage::new()));
//!
//!     memory.store_artifact("notes", TextArtifact::new("remember me").into()).await?;
//!     memory.store_artifact("files", BlobArtifact::new(b"raw".to_vec()).into()).await?;
//!     let notes = memory.load_artifacts("notes").await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Retrying with a custom policy
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use artifex::{drivers::rerank::{NvidiaRerankDriver, RerankDriver}, retry::RetryPolicy};
//!
//! # async fn run() -> Result<(), artifex::error::Error> {
//! let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(4), 3)?
//!     .with_after_hook(|attempt| eprintln!("attempt {} failed: {}", attempt.attempt, attempt.error));
//! let reranker = NvidiaRerankDriver::from_config(None)?.with_retry_policy(policy);
//! let ranked = reranker.run("rust", vec!["a".into(), "b".into()]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! Name | Description | Default?
//! ---|---|---
//! `pdf` | enables the PDF parser driver | No

/// Typed content records and their metadata
pub mod artifacts;

/// Helpers for the `from_config` constructors of vendor drivers
pub mod config;

/// Provider adapters, one narrow trait per role
pub mod drivers;

/// Query and summary engines composed from drivers
pub mod engines;

/// Error types for all library operations
pub mod error;

/// Namespaced tool memory and its storage backends
pub mod memory;

/// Mime type detection
pub mod mime;

/// Instrumentation hooks reported to by every driver call
pub mod observability;

/// Bounded exponential back-off around remote calls
pub mod retry;

/// `before_run` / `after_run` callbacks of runnable components
pub mod runnable;

/// Tokenizers sized against model context windows
pub mod tokenizers;

pub use error::Error;
