//! Error types for the MySQL gateway.
//!
//! Every failure a tool call can produce is a [`DbError`]. Safety-gate
//! rejections are user errors and never reach a pool; connection and
//! execution failures carry a suggestion the agent can act on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error(
        "Multiple statements are not allowed: found ';' followed by more SQL. Submit exactly one statement per request."
    )]
    MultiStatementRejected,

    #[error("Administrative statement blocked: {verb} statements are not allowed through this gateway")]
    AdministrativeStatement { verb: String },

    #[error("Database '{label}' not found. Available databases: {}", format_labels(.available))]
    LabelNotFound {
        label: String,
        available: Vec<String>,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// SQLSTATE, e.g. "42S02" for an unknown table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_labels(labels: &[String]) -> String {
    if labels.is_empty() {
        "(none configured)".to_string()
    } else {
        labels.join(", ")
    }
}

impl DbError {
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn administrative(verb: impl Into<String>) -> Self {
        Self::AdministrativeStatement { verb: verb.into() }
    }

    pub fn label_not_found(label: impl Into<String>, available: Vec<String>) -> Self {
        Self::LabelNotFound {
            label: label.into(),
            available,
        }
    }

    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Next step for the caller, when there is an obvious one.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::MultiStatementRejected => {
                Some("Remove everything after the first ';' and send it as a separate request")
            }
            Self::LabelNotFound { .. } => Some("Call list_databases to see the configured labels"),
            _ => None,
        }
    }

    /// True for errors rejected before any database I/O was attempted.
    pub fn is_safety_rejection(&self) -> bool {
        matches!(
            self,
            Self::MultiStatementRejected | Self::AdministrativeStatement { .. }
        )
    }
}

/// Hint for a server-reported error, keyed by MySQL error number.
fn server_error_suggestion(number: Option<u16>) -> &'static str {
    match number {
        Some(1044 | 1045 | 1142 | 1143) => {
            "The configured account lacks permission for this; check its grants"
        }
        Some(1049) => "The database in the connection target does not exist",
        Some(1054) => "Unknown column; call describe_table to see the real column names",
        Some(1064) => "Fix the SQL syntax; only MySQL dialect is accepted",
        Some(1146) => "Unknown table; call list_tables to see what exists",
        Some(1205 | 1213) => "Lock contention; retry the request",
        Some(1792) => "This database is read-only through the gateway; writes are rejected",
        Some(3024) => "The statement hit max_execution_time; narrow the query",
        _ => "Check the SQL and the objects it references",
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;

        match err {
            E::Database(db_err) => {
                let number = db_err
                    .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                    .map(|e| e.number());
                DbError::database(
                    db_err.message(),
                    db_err.code().map(|c| c.into_owned()),
                    server_error_suggestion(number),
                )
            }
            E::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "The connection target for this database is malformed",
            ),
            E::PoolTimedOut => DbError::connection(
                "Timed out waiting for a pooled connection",
                "The server may be unreachable or every connection is busy; retry shortly",
            ),
            E::PoolClosed => DbError::connection(
                "Connection pool is closed",
                "The pool was retired by a configuration reload or shutdown; retry the request",
            ),
            E::Io(e) => DbError::connection(
                format!("Network error talking to MySQL: {e}"),
                "Check that the server is up and reachable from the gateway host",
            ),
            E::Tls(e) => DbError::connection(
                format!("TLS handshake failed: {e}"),
                "Verify the ssl mode and certificate paths for this database",
            ),
            E::Protocol(msg) => DbError::connection(
                format!("Unexpected reply from server: {msg}"),
                "The server may not speak the MySQL protocol version the gateway expects",
            ),
            E::RowNotFound => DbError::database(
                "Statement returned no rows",
                None,
                "Widen the query conditions",
            ),
            E::ColumnNotFound(column) => {
                DbError::schema(format!("Result has no column '{column}'"), column)
            }
            E::ColumnDecode { index, source } => {
                DbError::internal(format!("Could not decode result column {index}: {source}"))
            }
            other => DbError::internal(format!("Driver error: {other}")),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbError to MCP ErrorData.
///
/// Caller mistakes map to `invalid_params`, unknown labels to
/// `resource_not_found`, and infrastructure failures to `internal_error`.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::MultiStatementRejected
            | DbError::AdministrativeStatement { .. }
            | DbError::InvalidInput { .. }
            | DbError::Schema { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), suggestion_data(err.suggestion()))
            }

            DbError::LabelNotFound { available, .. } => rmcp::ErrorData::resource_not_found(
                err.to_string(),
                Some(serde_json::json!({
                    "available": available,
                    "suggestion": err.suggestion(),
                })),
            ),

            DbError::Connection { suggestion, .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), suggestion_data(Some(suggestion)))
            }
            DbError::Timeout { .. } => rmcp::ErrorData::internal_error(
                err.to_string(),
                suggestion_data(Some(
                    "Consider a larger timeout_secs or a more selective query",
                )),
            ),

            // The database's own message is surfaced verbatim.
            DbError::Database {
                message,
                sql_state,
                suggestion,
            } => {
                let msg = match sql_state {
                    Some(state) => format!("{message} (SQLSTATE {state})"),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, suggestion_data(Some(suggestion)))
            }

            DbError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_label_not_found_lists_available() {
        let err = DbError::label_not_found("ghost", vec!["orders".into(), "billing".into()]);
        let msg = err.to_string();
        assert!(msg.contains("'ghost'"));
        assert!(msg.contains("orders, billing"));
    }

    #[test]
    fn test_label_not_found_with_no_labels() {
        let err = DbError::label_not_found("ghost", Vec::new());
        assert!(err.to_string().contains("(none configured)"));
    }

    #[test]
    fn test_safety_rejections() {
        assert!(DbError::MultiStatementRejected.is_safety_rejection());
        assert!(DbError::administrative("DROP").is_safety_rejection());
        assert!(!DbError::timeout("query", 30).is_safety_rejection());
    }

    #[test]
    fn test_multi_statement_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = DbError::MultiStatementRejected.into();
        assert_eq!(mcp_err.code.0, -32602);
        assert!(mcp_err.data.is_some());
    }

    #[test]
    fn test_administrative_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = DbError::administrative("GRANT").into();
        assert_eq!(mcp_err.code.0, -32602);
        assert!(mcp_err.message.contains("GRANT"));
    }

    #[test]
    fn test_label_not_found_maps_to_resource_not_found() {
        let err = DbError::label_not_found("x", vec!["a".into(), "b".into()]);
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32002);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["available"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_connection_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData = DbError::connection("failed", "try again").into();
        assert_eq!(mcp_err.code.0, -32603);
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "try again");
    }

    #[test]
    fn test_timeout_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData = DbError::timeout("query", 30).into();
        assert_eq!(mcp_err.code.0, -32603);
    }

    #[test]
    fn test_database_error_includes_code() {
        let err = DbError::database(
            "Table 'shop.nope' doesn't exist",
            Some("42S02".to_string()),
            "check table",
        );
        let mcp_err: rmcp::ErrorData = err.into();
        assert!(mcp_err.message.contains("42S02"));
        assert!(mcp_err.message.contains("doesn't exist"));
    }

    #[test]
    fn test_server_error_suggestions() {
        assert!(server_error_suggestion(Some(1146)).contains("list_tables"));
        assert!(server_error_suggestion(Some(1792)).contains("read-only"));
        assert_eq!(
            server_error_suggestion(None),
            server_error_suggestion(Some(9999))
        );
    }

    #[test]
    fn test_pool_closed_is_connection_error() {
        let err = DbError::from(sqlx::Error::PoolClosed);
        assert!(matches!(err, DbError::Connection { .. }));
        assert!(err.suggestion().unwrap().contains("retry"));
    }

    #[test]
    fn test_schema_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = DbError::schema("Table not found", "users").into();
        assert_eq!(mcp_err.code.0, -32602);
    }
}
