//! The `explain` tool.
//!
//! Uses `EXPLAIN ANALYZE` where the server supports it and falls back to
//! plain `EXPLAIN`. The statement's transaction is always rolled back.

use crate::db::{PoolFactory, QueryExecutor};
use crate::error::{DbError, DbResult};
use crate::models::{ExplainMode, ExplainResult, JsonRow, QueryParam};
use crate::tools::format::{Footer, OutputFormat, render};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;

/// Input for the explain tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExplainInput {
    /// Database label from list_databases
    pub database: String,
    /// A single statement to explain
    pub sql: String,
    /// Positional parameters bound to `?` placeholders
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// Timeout in seconds (1-300). Default: server setting, normally 30
    #[serde(default)]
    pub timeout_secs: Option<u32>,
    /// Output format: "json" (default), "table" or "markdown"
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output from the explain tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExplainOutput {
    /// "analyze" when EXPLAIN ANALYZE ran, "plan" for the estimated plan
    pub mode: ExplainMode,
    /// EXPLAIN result rows. Empty if format is table/markdown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plan: Vec<JsonRow>,
    /// The SQL statement that was explained
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    pub execution_time_ms: u64,
}

impl ExplainOutput {
    pub fn from_result(result: ExplainResult, sql: &str, format: OutputFormat) -> Self {
        let count = result.rows.len();
        let footer = Footer::new(count, count).with_time(result.execution_time_ms);
        let formatted = render(format, &result.columns, &result.rows, footer);
        let plan = if formatted.is_some() {
            Vec::new()
        } else {
            result.rows
        };

        Self {
            mode: result.mode,
            plan,
            sql: sql.to_string(),
            formatted,
            execution_time_ms: result.execution_time_ms,
        }
    }
}

pub struct ExplainToolHandler<F: PoolFactory<Pool = MySqlPool>> {
    executor: QueryExecutor<F>,
}

impl<F: PoolFactory<Pool = MySqlPool>> ExplainToolHandler<F> {
    pub fn new(executor: QueryExecutor<F>) -> Self {
        Self { executor }
    }

    pub async fn explain(&self, input: ExplainInput) -> DbResult<ExplainOutput> {
        let sql = input.sql.trim();
        if sql.is_empty() {
            return Err(DbError::invalid_input("SQL statement is required"));
        }

        let result = self
            .executor
            .explain(&input.database, sql, &input.params, input.timeout_secs)
            .await?;

        info!(
            database = %input.database,
            mode = %result.mode,
            rows = result.rows.len(),
            execution_time_ms = result.execution_time_ms,
            "Explained statement"
        );

        Ok(ExplainOutput::from_result(result, sql, input.format))
    }
}
