//! Query execution engine.
//!
//! [`QueryExecutor`] is the composition root for every tool that touches a
//! database:
//!
//! 1. statement gates (single statement, not administrative), before any
//!    pool is looked up
//! 2. label resolution and pool lookup through the [`ConnectionManager`]
//! 3. a [`ScopedSession`] carrying the read-only contract
//! 4. an explicit transaction bounded by the query timeout
//! 5. release of the session on every path
//!
//! Metadata reads and health checks skip the gates (the SQL is ours) but go
//! through the same scoped session.

use crate::db::connections::ConnectionManager;
use crate::db::params::bind_all;
use crate::db::pool::{MySqlPoolFactory, PoolFactory};
use crate::db::schema::SchemaInspector;
use crate::db::session::ScopedSession;
use crate::db::types::{columns_of, rows_to_json};
use crate::error::{DbError, DbResult};
use crate::models::{
    ConnectionDescriptor, ExplainMode, ExplainResult, HealthReport, MAX_QUERY_TIMEOUT_SECS,
    QueryParam, QueryRequest, QueryResult, SchemaInfo, TableInfo, TableSchema,
};
use crate::tools::guard::ensure_not_administrative;
use crate::tools::sql_validator::ensure_single_statement;
use futures_util::future::{BoxFuture, join_all};
use sqlx::mysql::MySqlRow;
use sqlx::{Connection, MySqlConnection, MySqlPool};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// How an executed statement's transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Commit,
    Rollback,
}

pub struct QueryExecutor<F: PoolFactory<Pool = MySqlPool> = MySqlPoolFactory> {
    manager: Arc<ConnectionManager<F>>,
    default_timeout_secs: u32,
}

impl<F: PoolFactory<Pool = MySqlPool>> Clone for QueryExecutor<F> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            default_timeout_secs: self.default_timeout_secs,
        }
    }
}

impl<F: PoolFactory<Pool = MySqlPool>> QueryExecutor<F> {
    pub fn new(manager: Arc<ConnectionManager<F>>, default_timeout_secs: u32) -> Self {
        Self {
            manager,
            default_timeout_secs,
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager<F>> {
        &self.manager
    }

    pub fn default_timeout_secs(&self) -> u32 {
        self.default_timeout_secs
    }

    /// Run one statement and return its rows, truncated to the request limit.
    pub async fn run_query(&self, request: &QueryRequest) -> DbResult<QueryResult> {
        ensure_single_statement(&request.sql)?;
        ensure_not_administrative(&request.sql)?;

        let descriptor = self.manager.descriptor(&request.database).await?;
        let timeout_secs = request.effective_timeout(self.default_timeout_secs);
        let limit = request.effective_limit();

        debug!(
            database = %descriptor.label,
            params = request.params.len(),
            limit = ?limit,
            timeout_secs,
            "Executing query"
        );

        let start = Instant::now();
        let mut session = self.open_session(&descriptor).await?;
        let outcome = fetch_in_transaction(
            &mut session,
            &request.sql,
            &request.params,
            timeout_secs,
            Finish::Commit,
        )
        .await;
        session.release().await;
        let rows = outcome?;

        let columns = columns_of(&rows);
        let json_rows = rows_to_json(&rows, request.decode_binary);
        let result = QueryResult::from_rows(
            columns,
            json_rows,
            limit,
            start.elapsed().as_millis() as u64,
        );

        if result.truncated {
            debug!(
                database = %descriptor.label,
                total_rows = result.total_rows,
                limit = ?result.row_limit,
                "Query result truncated"
            );
        }
        Ok(result)
    }

    /// Show the execution plan of a statement.
    ///
    /// `EXPLAIN ANALYZE` is tried first; if the server rejects it the plain
    /// `EXPLAIN` form is used. The transaction is always rolled back because
    /// `ANALYZE` really executes the statement.
    pub async fn explain(
        &self,
        label: &str,
        sql: &str,
        params: &[QueryParam],
        timeout_secs: Option<u32>,
    ) -> DbResult<ExplainResult> {
        ensure_single_statement(sql)?;
        ensure_not_administrative(sql)?;

        let descriptor = self.manager.descriptor(label).await?;
        let timeout_secs = timeout_secs
            .unwrap_or(self.default_timeout_secs)
            .clamp(1, MAX_QUERY_TIMEOUT_SECS);

        let start = Instant::now();
        let mut session = self.open_session(&descriptor).await?;

        let mut mode = ExplainMode::Analyze;
        let mut outcome = fetch_in_transaction(
            &mut session,
            &mode.statement(sql),
            params,
            timeout_secs,
            Finish::Rollback,
        )
        .await;

        if let Err(DbError::Database { message, .. }) = &outcome {
            if !session.is_discarded() {
                debug!(
                    database = %descriptor.label,
                    error = %message,
                    "EXPLAIN ANALYZE rejected, falling back to EXPLAIN"
                );
                mode = ExplainMode::Plan;
                outcome = fetch_in_transaction(
                    &mut session,
                    &mode.statement(sql),
                    params,
                    timeout_secs,
                    Finish::Rollback,
                )
                .await;
            }
        }
        session.release().await;
        let rows = outcome?;

        Ok(ExplainResult {
            mode,
            columns: columns_of(&rows),
            rows: rows_to_json(&rows, true),
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    pub async fn list_tables(
        &self,
        label: &str,
        schema: Option<String>,
        include_views: bool,
    ) -> DbResult<Vec<TableInfo>> {
        self.with_read_session(label, "list tables", move |conn| {
            Box::pin(async move {
                SchemaInspector::list_tables(conn, schema.as_deref(), include_views).await
            })
        })
        .await
    }

    pub async fn describe_table(
        &self,
        label: &str,
        table: String,
        schema: Option<String>,
    ) -> DbResult<TableSchema> {
        self.with_read_session(label, "describe table", move |conn| {
            Box::pin(async move {
                SchemaInspector::describe_table(conn, &table, schema.as_deref()).await
            })
        })
        .await
    }

    pub async fn list_schemas(&self, label: &str) -> DbResult<Vec<SchemaInfo>> {
        self.with_read_session(label, "list schemas", |conn| {
            Box::pin(async move { SchemaInspector::list_schemas(conn).await })
        })
        .await
    }

    /// Check one label, or every configured label when `label` is `None`.
    ///
    /// Failures are reported per label; only an unknown label fails
    /// the call.
    pub async fn health_check(&self, label: Option<&str>) -> DbResult<Vec<HealthReport>> {
        let targets: Vec<ConnectionDescriptor> = match label {
            Some(label) => vec![self.manager.descriptor(label).await?],
            None => self.manager.descriptors().await.iter().cloned().collect(),
        };

        Ok(join_all(targets.iter().map(|d| self.check_one(d))).await)
    }

    async fn check_one(&self, descriptor: &ConnectionDescriptor) -> HealthReport {
        let start = Instant::now();
        let outcome = self
            .with_session(descriptor, "health check", |conn| {
                Box::pin(async move {
                    let version: String = sqlx::query_scalar("SELECT VERSION()")
                        .fetch_one(&mut *conn)
                        .await?;
                    Ok(version)
                })
            })
            .await;

        match outcome {
            Ok(version) => HealthReport {
                database: descriptor.label.clone(),
                ok: true,
                server_version: Some(version),
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => {
                warn!(database = %descriptor.label, error = %e, "Health check failed");
                HealthReport {
                    database: descriptor.label.clone(),
                    ok: false,
                    server_version: None,
                    latency_ms: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn open_session(&self, descriptor: &ConnectionDescriptor) -> DbResult<ScopedSession> {
        let pool = self.manager.pool_for(descriptor).await?;
        ScopedSession::acquire(&pool, &descriptor.label, descriptor.read_only).await
    }

    async fn with_read_session<T, Op>(&self, label: &str, operation: &str, op: Op) -> DbResult<T>
    where
        Op: for<'c> FnOnce(&'c mut MySqlConnection) -> BoxFuture<'c, DbResult<T>>,
    {
        let descriptor = self.manager.descriptor(label).await?;
        self.with_session(&descriptor, operation, op).await
    }

    /// Run `op` on a scoped session, bounded by the default timeout.
    async fn with_session<T, Op>(
        &self,
        descriptor: &ConnectionDescriptor,
        operation: &str,
        op: Op,
    ) -> DbResult<T>
    where
        Op: for<'c> FnOnce(&'c mut MySqlConnection) -> BoxFuture<'c, DbResult<T>>,
    {
        let mut session = self.open_session(descriptor).await?;
        let limit = Duration::from_secs(u64::from(self.default_timeout_secs));

        let outcome = match session.connection() {
            Ok(conn) => timeout(limit, op(conn)).await,
            Err(e) => Ok(Err(e)),
        };
        let outcome = match outcome {
            Ok(result) => result,
            Err(_) => {
                session.discard();
                Err(DbError::timeout(operation, self.default_timeout_secs))
            }
        };

        session.release().await;
        outcome
    }
}

/// Execute `sql` inside a transaction on the session's connection.
///
/// Execution errors roll back and return the original error. On timeout the
/// session is discarded so the connection never returns to the pool with a
/// statement still running.
async fn fetch_in_transaction(
    session: &mut ScopedSession,
    sql: &str,
    params: &[QueryParam],
    timeout_secs: u32,
    finish: Finish,
) -> DbResult<Vec<MySqlRow>> {
    let label = session.label().to_string();
    let limit = Duration::from_secs(u64::from(timeout_secs));

    let conn = session.connection()?;
    let mut tx = conn.begin().await?;
    let fetched = timeout(limit, fetch_rows(&mut tx, sql, params)).await;

    let rows = match fetched {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => {
            if let Err(rb) = tx.rollback().await {
                warn!(database = %label, error = %rb, "Rollback failed");
                session.discard();
            }
            return Err(e);
        }
        Err(_) => {
            drop(tx);
            session.discard();
            return Err(DbError::timeout("query execution", timeout_secs));
        }
    };

    match finish {
        Finish::Commit => tx.commit().await?,
        Finish::Rollback => {
            if let Err(rb) = tx.rollback().await {
                warn!(database = %label, error = %rb, "Rollback failed");
                session.discard();
            }
        }
    }
    Ok(rows)
}

async fn fetch_rows(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[QueryParam],
) -> DbResult<Vec<MySqlRow>> {
    // Prepared protocol only, even without parameters; it accepts exactly one statement.
    let rows = bind_all(sql, params).fetch_all(conn).await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> QueryExecutor {
        let manager = ConnectionManager::mysql(
            vec![ConnectionDescriptor::from_uri("orders", "mysql://u:p@127.0.0.1:1/orders")],
            Duration::from_secs(1),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        QueryExecutor::new(Arc::new(manager), 30)
    }

    #[tokio::test]
    async fn test_stacked_query_rejected_before_pool_lookup() {
        let executor = executor();
        let request = QueryRequest::new("orders", "SELECT 1; DROP TABLE users");
        let err = executor.run_query(&request).await.unwrap_err();
        assert!(matches!(err, DbError::MultiStatementRejected));
        assert_eq!(executor.manager().registry().pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_administrative_query_rejected() {
        let executor = executor();
        let request = QueryRequest::new("orders", "DROP TABLE users");
        let err = executor.run_query(&request).await.unwrap_err();
        assert!(matches!(err, DbError::AdministrativeStatement { .. }));
        assert_eq!(executor.manager().registry().pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_label() {
        let executor = executor();
        let request = QueryRequest::new("ghost", "SELECT 1");
        let err = executor.run_query(&request).await.unwrap_err();
        assert!(matches!(err, DbError::LabelNotFound { .. }));
    }

    #[tokio::test]
    async fn test_explain_gated() {
        let executor = executor();
        let err = executor
            .explain("orders", "SELECT 1;SELECT 2", &[], None)
            .await
            .unwrap_err();
        assert!(err.is_safety_rejection());
    }
}
