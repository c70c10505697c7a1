use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{RowResult, Scalar, SqlDriver};
use crate::{
    config::{parse_config, read_api_key},
    drivers::{
        http::{bearer_headers, get_json, post_json},
        DriverEnvelope, DriverError,
    },
    observability::Instrumentation,
    retry::RetryPolicy,
};

const DRIVER: &str = "DatabricksSqlDriver";
const TOKEN_ENV_VAR: &str = "DATABRICKS_TOKEN";
const DEFAULT_WAIT_TIMEOUT: &str = "30s";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    host: Option<String>,
    warehouse_id: Option<String>,
    token_var: Option<String>,
    wait_timeout: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StatementResponse {
    status: StatementStatus,
    manifest: Option<Manifest>,
    result: Option<StatementResult>,
}

#[derive(Deserialize, Debug)]
struct StatementStatus {
    state: String,
    error: Option<StatementErrorInfo>,
}

#[derive(Deserialize, Debug)]
struct StatementErrorInfo {
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Manifest {
    schema: Schema,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize, Debug)]
struct Schema {
    #[serde(default)]
    columns: Vec<Column>,
}

#[derive(Deserialize, Debug)]
struct Column {
    name: String,
    type_name: String,
}

/// One chunk of an inline result; further chunks are linked.
#[derive(Deserialize, Debug)]
struct StatementResult {
    #[serde(default)]
    data_array: Vec<Vec<Value>>,
    next_chunk_internal_link: Option<String>,
}

/// A succeeded statement with all of its result chunks.
#[derive(Debug)]
struct StatementRows {
    manifest: Option<Manifest>,
    rows: Vec<Vec<Value>>,
}

/// SQL over the Databricks statement execution API, with inline JSON
/// results.
pub struct DatabricksSqlDriver {
    host: String,
    statements_url: String,
    warehouse_id: String,
    wait_timeout: String,
    headers: HeaderMap,
    client: reqwest::Client,
    envelope: DriverEnvelope,
}

impl DatabricksSqlDriver {
    pub fn new(host: &str, warehouse_id: impl Into<String>, token: &str) -> Result<Self, DriverError> {
        let host = host.trim_end_matches('/').to_string();
        Ok(Self {
            statements_url: format!("{host}/api/2.0/sql/statements"),
            host,
            warehouse_id: warehouse_id.into(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT.to_string(),
            headers: bearer_headers(DRIVER, token)?,
            client: reqwest::Client::new(),
            envelope: DriverEnvelope::default(),
        })
    }

    /// `host` and `warehouse_id` are required in the config.
    #[instrument]
    pub fn from_config(json_config: Option<&str>) -> Result<Self, DriverError> {
        let config: ModelConfig = parse_config(DRIVER, json_config)?;
        let missing = |field: &str| DriverError::Config {
            driver: DRIVER,
            message: format!("Missing `{field}`"),
        };
        let host = config.host.ok_or_else(|| missing("host"))?;
        let warehouse_id = config.warehouse_id.ok_or_else(|| missing("warehouse_id"))?;
        let token = read_api_key(DRIVER, config.token_var.as_deref().unwrap_or(TOKEN_ENV_VAR))?;

        let mut driver = Self::new(&host, warehouse_id, &token)?;
        if let Some(wait_timeout) = config.wait_timeout {
            driver.wait_timeout = wait_timeout;
        }
        Ok(driver)
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

    async fn execute(
        &self,
        operation: &'static str,
        query: &str,
    ) -> Result<StatementRows, DriverError> {
        let body = json!({
            "statement": query,
            "warehouse_id": self.warehouse_id,
            "wait_timeout": self.wait_timeout,
            "on_wait_timeout": "CANCEL",
            "disposition": "INLINE",
            "format": "JSON_ARRAY",
        });
        let output = self
            .envelope
            .call(DRIVER, operation, |_| {
                post_json(
                    &self.client,
                    DRIVER,
                    operation,
                    &self.statements_url,
                    &self.headers,
                    &body,
                )
            })
            .await?;

        let response: StatementResponse = serde_json::from_value(output)
            .map_err(|e| DriverError::protocol(DRIVER, operation, e))?;
        if response.status.state != "SUCCEEDED" {
            let reason = response
                .status
                .error
                .and_then(|e| e.message)
                .unwrap_or_default();
            return Err(DriverError::protocol(
                DRIVER,
                operation,
                format!("Statement ended in state {}: {reason}", response.status.state),
            ));
        }
        debug!(operation, "Statement succeeded");

        if response.manifest.as_ref().is_some_and(|m| m.truncated) {
            return Err(DriverError::protocol(
                DRIVER,
                operation,
                "Result set exceeds the inline size limit and was truncated",
            ));
        }

        let mut rows = Vec::new();
        let mut chunk = response.result;
        while let Some(StatementResult {
            data_array,
            next_chunk_internal_link,
        }) = chunk.take()
        {
            rows.extend(data_array);
            let Some(link) = next_chunk_internal_link else {
                break;
            };
            let url = format!("{}{link}", self.host);
            debug!(operation, %link, "Fetching next result chunk");
            let output = self
                .envelope
                .call(DRIVER, operation, |_| {
                    get_json(&self.client, DRIVER, operation, &url, &self.headers)
                })
                .await?;
            chunk = Some(
                serde_json::from_value(output)
                    .map_err(|e| DriverError::protocol(DRIVER, operation, e))?,
            );
        }

        Ok(StatementRows {
            manifest: response.manifest,
            rows,
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|t| t.and_utc())
        })
}

/// Converts a JSON_ARRAY cell (a string or null) by its column type.
fn to_scalar(type_name: &str, cell: &Value) -> Result<Scalar, String> {
    let raw = match cell {
        Value::Null => return Ok(Scalar::Null),
        Value::String(s) => s.as_str(),
        Value::Bool(b) => return Ok(Scalar::Bool(*b)),
        other => return Err(format!("unexpected cell {other}")),
    };
    let invalid = |e: String| format!("invalid {type_name} `{raw}`: {e}");

    match type_name {
        "BOOLEAN" => raw.parse().map(Scalar::Bool).map_err(|e| invalid(format!("{e}"))),
        "BYTE" | "SHORT" | "INT" | "LONG" | "TINYINT" | "SMALLINT" | "BIGINT" => raw
            .parse()
            .map(Scalar::Int)
            .map_err(|e| invalid(format!("{e}"))),
        "FLOAT" | "DOUBLE" | "DECIMAL" => raw
            .parse()
            .map(Scalar::Float)
            .map_err(|e| invalid(format!("{e}"))),
        "BINARY" => STANDARD
            .decode(raw)
            .map(Scalar::Bytes)
            .map_err(|e| invalid(format!("{e}"))),
        "DATE" | "TIMESTAMP" | "TIMESTAMP_NTZ" => parse_timestamp(raw)
            .map(Scalar::Timestamp)
            .ok_or_else(|| invalid("unrecognized format".to_string())),
        _ => Ok(Scalar::String(raw.to_string())),
    }
}

#[async_trait]
impl SqlDriver for DatabricksSqlDriver {
    #[instrument(skip(self))]
    async fn execute_query(&self, query: &str) -> Result<Option<Vec<RowResult>>, DriverError> {
        let response = self.execute("execute_query", query).await?;
        let Some(manifest) = response.manifest.filter(|m| !m.schema.columns.is_empty()) else {
            return Ok(None);
        };
        let columns = manifest.schema.columns;
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

        response
            .rows
            .iter()
            .map(|row| {
                let cells = columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| to_scalar(&column.type_name, cell))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| DriverError::protocol(DRIVER, "execute_query", e))?;
                Ok(RowResult {
                    columns: names.clone(),
                    cells,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    #[instrument(skip(self))]
    async fn execute_query_raw(&self, query: &str) -> Result<Option<String>, DriverError> {
        let response = self.execute("execute_query_raw", query).await?;
        if response
            .manifest
            .as_ref()
            .map_or(true, |m| m.schema.columns.is_empty())
        {
            return Ok(None);
        }
        serde_json::to_string(&response.rows)
            .map(Some)
            .map_err(|e| DriverError::protocol(DRIVER, "execute_query_raw", e))
    }
}
