//! Query-related data models.
//!
//! This module defines types for SQL query requests and results.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: u32 = 10000;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 30;

/// Maximum query timeout in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u32 = 300;

/// A positional parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Bool(bool),
    /// Stored as i64 for maximum range
    Int(i64),
    Float(f64),
    String(String),
    /// Arrays and objects, bound as MySQL JSON
    Json(JsonValue),
}

impl QueryParam {
    /// Kind of value, for logs that must not show the value itself.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Database label
    pub database: String,
    pub sql: String,
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// No limit when absent; otherwise clamped to 1-10000
    #[serde(default)]
    pub limit: Option<u32>,
    /// Default: configured query timeout, max: 300
    #[serde(default)]
    pub timeout_secs: Option<u32>,
    /// Default: false
    #[serde(default)]
    pub decode_binary: bool,
}

impl QueryRequest {
    /// Create a new query request with default options.
    pub fn new(database: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            sql: sql.into(),
            params: Vec::new(),
            limit: None,
            timeout_secs: None,
            decode_binary: false,
        }
    }

    /// Add a parameter to this query.
    pub fn with_param(mut self, param: QueryParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_params(mut self, params: Vec<QueryParam>) -> Self {
        self.params = params;
        self
    }

    /// Set the row limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout_secs: u32) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_decode_binary(mut self, decode_binary: bool) -> Self {
        self.decode_binary = decode_binary;
        self
    }

    /// Row limit after clamping to `[1, MAX_ROW_LIMIT]`; `None` means unlimited.
    pub fn effective_limit(&self) -> Option<u32> {
        self.limit.map(|l| l.clamp(1, MAX_ROW_LIMIT))
    }

    /// True when the caller asked for more rows than the gateway allows.
    pub fn limit_capped(&self) -> bool {
        self.limit.is_some_and(|l| l > MAX_ROW_LIMIT)
    }

    /// Timeout after clamping to `[1, MAX_QUERY_TIMEOUT_SECS]`.
    pub fn effective_timeout(&self, default_secs: u32) -> u32 {
        self.timeout_secs
            .unwrap_or(default_secs)
            .clamp(1, MAX_QUERY_TIMEOUT_SECS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// MySQL type name (e.g., "BIGINT", "VARCHAR")
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }
}

pub type JsonRow = serde_json::Map<String, JsonValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<JsonRow>,
    /// True when `rows` holds fewer rows than the statement produced
    pub truncated: bool,
    /// Rows the statement actually produced
    pub total_rows: usize,
    /// Limit that was applied, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<u32>,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Build a result from the full row set, truncating to `limit`.
    ///
    /// The true total is recorded before truncation so it is never lost.
    pub fn from_rows(
        columns: Vec<ColumnMetadata>,
        mut rows: Vec<JsonRow>,
        limit: Option<u32>,
        execution_time_ms: u64,
    ) -> Self {
        let total_rows = rows.len();
        let truncated = match limit {
            Some(limit) if total_rows > limit as usize => {
                rows.truncate(limit as usize);
                true
            }
            _ => false,
        };
        Self {
            columns,
            rows,
            truncated,
            total_rows,
            row_limit: limit,
            execution_time_ms,
        }
    }

    /// Get the number of rows returned.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Which EXPLAIN form produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExplainMode {
    /// `EXPLAIN ANALYZE`: the statement was executed and timed
    Analyze,
    /// Plain `EXPLAIN`: estimated plan only
    Plan,
}

impl ExplainMode {
    pub fn statement(&self, sql: &str) -> String {
        match self {
            Self::Analyze => format!("EXPLAIN ANALYZE {}", sql),
            Self::Plan => format!("EXPLAIN {}", sql),
        }
    }
}

impl std::fmt::Display for ExplainMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analyze => f.write_str("analyze"),
            Self::Plan => f.write_str("plan"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResult {
    pub mode: ExplainMode,
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<JsonRow>,
    pub execution_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<JsonRow> {
        (0..n)
            .map(|i| {
                let mut row = JsonRow::new();
                row.insert("id".into(), JsonValue::from(i as u64));
                row
            })
            .collect()
    }

    #[test]
    fn test_query_param_types() {
        assert_eq!(QueryParam::Null.type_name(), "null");
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(
            QueryParam::String("hello".to_string()).type_name(),
            "string"
        );
    }

    #[test]
    fn test_query_param_untagged_deserialize() {
        let params: Vec<QueryParam> =
            serde_json::from_str(r#"[null, true, 7, 1.5, "x", {"a": 1}]"#).unwrap();
        assert_eq!(params[0], QueryParam::Null);
        assert_eq!(params[1], QueryParam::Bool(true));
        assert_eq!(params[2], QueryParam::Int(7));
        assert_eq!(params[3], QueryParam::Float(1.5));
        assert_eq!(params[4], QueryParam::String("x".into()));
        assert_eq!(params[5].type_name(), "json");
    }

    #[test]
    fn test_query_request_defaults() {
        let req = QueryRequest::new("shop", "SELECT * FROM users");
        assert_eq!(req.effective_limit(), None);
        assert!(!req.limit_capped());
        assert_eq!(req.effective_timeout(DEFAULT_QUERY_TIMEOUT_SECS), 30);
    }

    #[test]
    fn test_query_request_bounds() {
        let req = QueryRequest::new("shop", "SELECT * FROM users")
            .with_limit(99999)
            .with_timeout(999);
        assert_eq!(req.effective_limit(), Some(MAX_ROW_LIMIT));
        assert!(req.limit_capped());
        assert_eq!(req.effective_timeout(30), MAX_QUERY_TIMEOUT_SECS);

        let zero = QueryRequest::new("shop", "SELECT 1")
            .with_limit(0)
            .with_timeout(0);
        assert_eq!(zero.effective_limit(), Some(1));
        assert_eq!(zero.effective_timeout(30), 1);
    }

    #[test]
    fn test_from_rows_truncates_and_keeps_total() {
        let result = QueryResult::from_rows(Vec::new(), rows(2500), Some(100), 3);
        assert!(result.truncated);
        assert_eq!(result.row_count(), 100);
        assert_eq!(result.total_rows, 2500);
        assert_eq!(result.row_limit, Some(100));
    }

    #[test]
    fn test_from_rows_exact_limit_not_truncated() {
        let result = QueryResult::from_rows(Vec::new(), rows(10), Some(10), 1);
        assert!(!result.truncated);
        assert_eq!(result.row_count(), 10);
        assert_eq!(result.total_rows, 10);
    }

    #[test]
    fn test_from_rows_without_limit() {
        let result = QueryResult::from_rows(Vec::new(), rows(42), None, 1);
        assert!(!result.truncated);
        assert_eq!(result.total_rows, 42);
        assert_eq!(result.row_limit, None);
    }

    #[test]
    fn test_explain_mode_statement() {
        assert_eq!(
            ExplainMode::Analyze.statement("SELECT 1"),
            "EXPLAIN ANALYZE SELECT 1"
        );
        assert_eq!(ExplainMode::Plan.statement("SELECT 1"), "EXPLAIN SELECT 1");
        assert_eq!(ExplainMode::Plan.to_string(), "plan");
    }
}
