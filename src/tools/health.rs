//! The `health_check` tool.

use crate::db::{PoolFactory, QueryExecutor};
use crate::error::DbResult;
use crate::models::HealthReport;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct HealthCheckInput {
    /// Database label to check. Omit to check every configured database.
    #[serde(default)]
    pub database: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct HealthCheckOutput {
    /// True when every checked database answered
    pub healthy: bool,
    pub databases: Vec<HealthReport>,
}

impl HealthCheckOutput {
    pub fn from_reports(databases: Vec<HealthReport>) -> Self {
        Self {
            healthy: databases.iter().all(|r| r.ok),
            databases,
        }
    }
}

pub struct HealthToolHandler<F: PoolFactory<Pool = MySqlPool>> {
    executor: QueryExecutor<F>,
}

impl<F: PoolFactory<Pool = MySqlPool>> HealthToolHandler<F> {
    pub fn new(executor: QueryExecutor<F>) -> Self {
        Self { executor }
    }

    pub async fn health_check(&self, input: HealthCheckInput) -> DbResult<HealthCheckOutput> {
        let database = input
            .database
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        let reports = self.executor.health_check(database).await?;
        let output = HealthCheckOutput::from_reports(reports);

        info!(
            checked = output.databases.len(),
            healthy = output.healthy,
            "Health check completed"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(database: &str, ok: bool) -> HealthReport {
        HealthReport {
            database: database.into(),
            ok,
            server_version: ok.then(|| "8.0.36".to_string()),
            latency_ms: ok.then_some(3),
            error: (!ok).then(|| "Connection refused".to_string()),
        }
    }

    #[test]
    fn test_one_failure_marks_unhealthy() {
        let out = HealthCheckOutput::from_reports(vec![report("a", true), report("b", false)]);
        assert!(!out.healthy);
        assert_eq!(out.databases.len(), 2);

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["databases"][1]["error"], "Connection refused");
        assert!(json["databases"][1].get("server_version").is_none());
    }

    #[test]
    fn test_input_database_optional() {
        let input: HealthCheckInput = serde_json::from_str("{}").unwrap();
        assert!(input.database.is_none());
    }
}
