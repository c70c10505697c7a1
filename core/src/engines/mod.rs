//! Engines compose drivers into higher level operations used by tool
//! memory.

mod summary;
mod vector_query;

pub use summary::{PromptSummaryEngine, SummaryEngine};
pub use vector_query::VectorQueryEngine;
