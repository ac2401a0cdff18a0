//! Administrative statement guard.
//!
//! Blocks statements that mutate schema, privileges or server state,
//! regardless of whether the target database is configured read-only. The
//! check looks only at the first real token (after leading whitespace and
//! comments), so it is cheap and never parses the statement.

use crate::error::{DbError, DbResult};
use crate::tools::sql_validator::skip_leading_trivia;

/// Verbs that are never allowed through the gateway.
pub const ADMINISTRATIVE_VERBS: &[&str] = &[
    "CREATE",
    "DROP",
    "ALTER",
    "TRUNCATE",
    "RENAME",
    "GRANT",
    "REVOKE",
    "LOAD",
    "INSTALL",
    "UNINSTALL",
    "FLUSH",
    "RESET",
    "PURGE",
    "KILL",
    "SHUTDOWN",
    "LOCK",
    "UNLOCK",
    "OPTIMIZE",
    "REPAIR",
    "IMPORT",
    "CHANGE",
    "SET",
    "HANDLER",
    "PREPARE",
    "EXECUTE",
    "DEALLOCATE",
];

/// First token of `sql`, ending at the first byte outside `[A-Za-z0-9_]`.
fn first_token(sql: &str) -> &str {
    let rest = skip_leading_trivia(sql);
    let end = rest
        .bytes()
        .position(|b| !(b.is_ascii_alphanumeric() || b == b'_'))
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Return the denylisted verb the statement starts with, if any.
pub fn administrative_verb(sql: &str) -> Option<&'static str> {
    let token = first_token(sql);
    if token.is_empty() {
        return None;
    }
    ADMINISTRATIVE_VERBS
        .iter()
        .copied()
        .find(|verb| verb.eq_ignore_ascii_case(token))
}

/// Returns `true` when the first real token is an administrative verb.
///
/// ```
/// use mysql_gateway_mcp::tools::guard::is_administrative_statement;
///
/// assert!(is_administrative_statement("DROP TABLE users"));
/// assert!(is_administrative_statement("/* why */ grant all on *.* to x"));
/// assert!(!is_administrative_statement("SELECT 1"));
/// assert!(!is_administrative_statement("-- just a comment"));
/// ```
pub fn is_administrative_statement(sql: &str) -> bool {
    administrative_verb(sql).is_some()
}

/// Reject administrative statements before any connection is acquired.
pub fn ensure_not_administrative(sql: &str) -> DbResult<()> {
    match administrative_verb(sql) {
        Some(verb) => Err(DbError::administrative(verb)),
        None => Ok(()),
    }
}
