//! Data models for the MySQL gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

pub use connection::{
    ConnectTarget, ConnectionConfigError, ConnectionDescriptor, DatabaseSummary, HealthReport,
    PoolFingerprint, SslMode, TlsSettings,
};
pub use query::{
    ColumnMetadata, DEFAULT_QUERY_TIMEOUT_SECS, ExplainMode, ExplainResult, JsonRow,
    MAX_QUERY_TIMEOUT_SECS, MAX_ROW_LIMIT, QueryParam, QueryRequest, QueryResult,
};
pub use schema::{
    ColumnDefinition, ColumnRef, ForeignKey, IndexInfo, ReferentialAction, SchemaInfo,
    TableInfo, TableKind, TableSchema, TableStorage, typed_default,
};
