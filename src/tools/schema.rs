//! Schema introspection tools: `list_tables`, `describe_table`, `list_schemas`.

use crate::db::{PoolFactory, QueryExecutor};
use crate::error::{DbError, DbResult};
use crate::models::{SchemaInfo, TableInfo, TableSchema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Database label from list_databases
    pub database: String,
    /// Schema to list. Defaults to the schema in the connection target.
    #[serde(default)]
    pub schema: Option<String>,
    /// Include views in the result. Default: true
    #[serde(default = "default_true")]
    pub include_views: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub database: String,
    pub tables: Vec<TableInfo>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Database label from list_databases
    pub database: String,
    /// Name of the table to describe
    pub table: String,
    /// Schema containing the table. Defaults to the schema in the connection target.
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeTableOutput {
    pub database: String,
    #[serde(flatten)]
    pub structure: TableSchema,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListSchemasInput {
    /// Database label from list_databases
    pub database: String,
    /// Include mysql, information_schema, performance_schema and sys. Default: false
    #[serde(default)]
    pub include_system: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListSchemasOutput {
    pub database: String,
    pub schemas: Vec<SchemaInfo>,
    pub count: usize,
}

impl ListSchemasOutput {
    fn new(database: String, schemas: Vec<SchemaInfo>, include_system: bool) -> Self {
        let schemas: Vec<SchemaInfo> = schemas
            .into_iter()
            .filter(|s| include_system || !s.is_system)
            .collect();
        Self {
            database,
            count: schemas.len(),
            schemas,
        }
    }
}

/// Empty or whitespace-only names are rejected; surrounding whitespace is
/// dropped.
fn identifier(value: &str, what: &str) -> DbResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DbError::invalid_input(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_identifier(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct SchemaToolHandler<F: PoolFactory<Pool = MySqlPool>> {
    executor: QueryExecutor<F>,
}

impl<F: PoolFactory<Pool = MySqlPool>> SchemaToolHandler<F> {
    pub fn new(executor: QueryExecutor<F>) -> Self {
        Self { executor }
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        let schema = optional_identifier(input.schema);
        let tables = self
            .executor
            .list_tables(&input.database, schema, input.include_views)
            .await?;
        let count = tables.len();

        info!(database = %input.database, count, "Listed tables");

        Ok(ListTablesOutput {
            database: input.database,
            tables,
            count,
        })
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> DbResult<DescribeTableOutput> {
        let table = identifier(&input.table, "table")?;
        let schema = optional_identifier(input.schema);

        let structure = self
            .executor
            .describe_table(&input.database, table, schema)
            .await?;

        info!(
            database = %input.database,
            table = %structure.qualified_name(),
            columns = structure.columns.len(),
            "Described table"
        );

        Ok(DescribeTableOutput {
            database: input.database,
            structure,
        })
    }

    pub async fn list_schemas(&self, input: ListSchemasInput) -> DbResult<ListSchemasOutput> {
        let schemas = self.executor.list_schemas(&input.database).await?;
        let output = ListSchemasOutput::new(input.database, schemas, input.include_system);

        info!(database = %output.database, count = output.count, "Listed schemas");
        Ok(output)
    }
}
