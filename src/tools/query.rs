//! The `query` tool.
//!
//! Runs one read statement against a labelled database. Stacked statements
//! and administrative statements are rejected by the executor before any
//! connection is touched.

use crate::db::{PoolFactory, QueryExecutor};
use crate::error::DbResult;
use crate::models::{ColumnMetadata, JsonRow, MAX_ROW_LIMIT, QueryParam, QueryRequest, QueryResult};
use crate::tools::format::{Footer, OutputFormat, render};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;

fn default_decode_binary() -> bool {
    true
}

/// Input for the query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// Database label from list_databases
    pub database: String,
    /// A single SQL statement. Stacked statements and DDL/admin statements are rejected.
    pub sql: String,
    /// Positional parameters bound to `?` placeholders
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// Maximum rows to return (1-10000). Omit for no limit.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Statement timeout in seconds (1-300). Default: server setting, normally 30
    #[serde(default)]
    pub timeout_secs: Option<u32>,
    /// Output format: "json" (default), "table" or "markdown"
    #[serde(default)]
    pub format: OutputFormat,
    /// If true (default), try to decode binary columns as UTF-8 text first (fallback to base64). If false, always use base64 encoding.
    #[serde(default = "default_decode_binary")]
    pub decode_binary: bool,
}

impl QueryInput {
    pub fn to_request(&self) -> QueryRequest {
        let mut request = QueryRequest::new(&self.database, &self.sql)
            .with_params(self.params.clone())
            .with_decode_binary(self.decode_binary);
        if let Some(limit) = self.limit {
            request = request.with_limit(limit);
        }
        if let Some(timeout) = self.timeout_secs {
            request = request.with_timeout(timeout);
        }
        request
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ColumnMetadataOutput {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
}

impl From<ColumnMetadata> for ColumnMetadataOutput {
    fn from(meta: ColumnMetadata) -> Self {
        Self {
            name: meta.name,
            type_name: meta.type_name,
            nullable: meta.nullable,
        }
    }
}

/// Output from the query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Column metadata. Empty if format is table/markdown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnMetadataOutput>,
    /// Result rows as key-value maps. Empty if format is table/markdown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<JsonRow>,
    /// Pre-formatted output when format is table or markdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// True if more rows matched than were returned
    pub truncated: bool,
    /// Number of rows returned
    pub row_count: usize,
    /// Number of rows the statement produced
    pub total_rows: usize,
    /// Row limit that was applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<u32>,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl QueryOutput {
    pub fn from_result(result: QueryResult, format: OutputFormat, warning: Option<String>) -> Self {
        let row_count = result.row_count();
        let footer = Footer::new(row_count, result.total_rows).with_time(result.execution_time_ms);
        let formatted = render(format, &result.columns, &result.rows, footer);

        let (columns, rows) = if formatted.is_some() {
            (Vec::new(), Vec::new())
        } else {
            (
                result.columns.into_iter().map(Into::into).collect(),
                result.rows,
            )
        };

        Self {
            columns,
            rows,
            formatted,
            truncated: result.truncated,
            row_count,
            total_rows: result.total_rows,
            row_limit: result.row_limit,
            execution_time_ms: result.execution_time_ms,
            warning,
        }
    }
}

fn limit_warning(request: &QueryRequest) -> Option<String> {
    if !request.limit_capped() {
        return None;
    }
    request.limit.map(|requested| {
        format!(
            "Requested limit {} exceeds maximum allowed ({}). Results capped to {} rows.",
            requested, MAX_ROW_LIMIT, MAX_ROW_LIMIT
        )
    })
}

pub struct QueryToolHandler<F: PoolFactory<Pool = MySqlPool>> {
    executor: QueryExecutor<F>,
}

impl<F: PoolFactory<Pool = MySqlPool>> QueryToolHandler<F> {
    pub fn new(executor: QueryExecutor<F>) -> Self {
        Self { executor }
    }

    pub async fn query(&self, input: QueryInput) -> DbResult<QueryOutput> {
        let request = input.to_request();
        let result = self.executor.run_query(&request).await?;

        info!(
            database = %request.database,
            row_count = result.row_count(),
            total_rows = result.total_rows,
            truncated = result.truncated,
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );

        Ok(QueryOutput::from_result(
            result,
            input.format,
            limit_warning(&request),
        ))
    }
}
