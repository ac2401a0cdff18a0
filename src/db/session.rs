//! Scoped acquisition of a pooled connection.
//!
//! A [`ScopedSession`] wraps a checked-out MySQL connection for the duration
//! of one tool call. When the descriptor is read-only the session is switched
//! to `READ ONLY` before any transaction is opened and switched back in
//! [`ScopedSession::release`]. A session that cannot be put back into a known
//! state is closed instead of being returned to the pool.

use crate::db::pool::connection_suggestion;
use crate::error::{DbError, DbResult};
use sqlx::pool::PoolConnection;
use sqlx::{Executor, MySql, MySqlConnection, MySqlPool};
use tracing::{debug, warn};

pub const APPLY_READ_ONLY: &str = "SET SESSION TRANSACTION READ ONLY";
pub const RESET_READ_WRITE: &str = "SET SESSION TRANSACTION READ WRITE";

pub struct ScopedSession {
    conn: Option<PoolConnection<MySql>>,
    label: String,
    read_only: bool,
    discarded: bool,
}

impl ScopedSession {
    /// Check out a connection and apply the read-only contract if requested.
    ///
    /// If the contract cannot be applied the connection is closed and the
    /// request fails; it is never used in write mode by accident.
    pub async fn acquire(pool: &MySqlPool, label: &str, read_only: bool) -> DbResult<Self> {
        let mut conn = pool.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DbError::connection(
                    format!("Failed to acquire a connection for '{}': {}", label, e),
                    connection_suggestion(&e),
                )
            }
            other => DbError::from(other),
        })?;

        if read_only {
            if let Err(e) = (&mut *conn).execute(APPLY_READ_ONLY).await {
                conn.close_on_drop();
                return Err(DbError::connection(
                    format!("Failed to apply read-only session for '{}': {}", label, e),
                    "The server rejected SET SESSION TRANSACTION READ ONLY",
                ));
            }
        }

        Ok(Self {
            conn: Some(conn),
            label: label.to_string(),
            read_only,
            discarded: false,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn connection(&mut self) -> DbResult<&mut MySqlConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| DbError::internal("Session connection already released"))
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    /// Mark the connection as unusable; it is closed on release.
    pub fn discard(&mut self) {
        self.discarded = true;
    }

    /// Reset the session and hand the connection back to the pool.
    ///
    /// Reset failures are logged and the connection is closed rather than
    /// returned.
    pub async fn release(mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        if self.discarded {
            debug!(database = %self.label, "Closing discarded connection");
            conn.close_on_drop();
            return;
        }

        if self.read_only {
            if let Err(e) = (&mut *conn).execute(RESET_READ_WRITE).await {
                warn!(
                    database = %self.label,
                    error = %e,
                    "Failed to reset session to read-write; closing connection"
                );
                conn.close_on_drop();
            }
        }
    }
}

impl Drop for ScopedSession {
    // Reached when the owning future is cancelled before `release`.
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if self.read_only || self.discarded {
                warn!(
                    database = %self.label,
                    "Session dropped without release; closing connection"
                );
                conn.close_on_drop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_statements() {
        assert!(APPLY_READ_ONLY.ends_with("READ ONLY"));
        assert!(RESET_READ_WRITE.ends_with("READ WRITE"));
        assert!(crate::tools::guard::is_administrative_statement(APPLY_READ_ONLY));
    }
}
