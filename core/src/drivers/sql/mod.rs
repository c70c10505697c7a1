//! SQL drivers.
//!
//! `Ok(None)` means the statement ran without producing a result set;
//! `Ok(Some(vec![]))` means a query matched zero rows.

mod databricks;

pub use databricks::DatabricksSqlDriver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use super::DriverError;

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowResult {
    pub columns: Vec<String>,
    pub cells: Vec<Scalar>,
}

impl RowResult {
    /// Cell of the named column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.cells.get(i))
    }
}

#[async_trait]
pub trait SqlDriver: Send + Sync {
    async fn execute_query(&self, query: &str) -> Result<Option<Vec<RowResult>>, DriverError>;

    /// Runs `query` and returns the provider's result rows as JSON text.
    async fn execute_query_raw(&self, query: &str) -> Result<Option<String>, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_and_display() {
        let row = RowResult {
            columns: vec!["id".into(), "name".into()],
            cells: vec![Scalar::Int(1), Scalar::Null],
        };
        assert_eq!(row.get("id"), Some(&Scalar::Int(1)));
        assert_eq!(row.get("name").map(ToString::to_string).as_deref(), Some("NULL"));
        assert_eq!(row.get("missing"), None);
    }
}
