//! MCP tool implementations.
//!
//! - `sql_validator`: statement scanner and the single-statement gate
//! - `guard`: administrative-statement gate
//! - `query`, `explain`: statement execution tools
//! - `schema`: `list_tables`, `describe_table`, `list_schemas`
//! - `health`: `health_check`
//! - `format`: table/markdown rendering

pub mod explain;
pub mod format;
pub mod guard;
pub mod health;
pub mod query;
pub mod schema;
pub mod sql_validator;

pub use explain::{ExplainInput, ExplainOutput, ExplainToolHandler};
pub use format::OutputFormat;
pub use health::{HealthCheckInput, HealthCheckOutput, HealthToolHandler};
pub use query::{QueryInput, QueryOutput, QueryToolHandler};
pub use schema::{
    DescribeTableInput, DescribeTableOutput, ListSchemasInput, ListSchemasOutput,
    ListTablesInput, ListTablesOutput, SchemaToolHandler,
};
