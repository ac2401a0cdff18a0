//! Database layer.
//!
//! - `pool`: pool factory seam and the per-label pool registry
//! - `connections`: descriptor catalog and label resolution
//! - `session`: scoped connection checkout with the read-only contract
//! - `executor`: query, explain, metadata and health operations
//! - `schema`: `information_schema` introspection
//! - `types` / `params`: row decoding and parameter binding

pub mod connections;
pub mod executor;
pub mod params;
pub mod pool;
pub mod schema;
pub mod session;
pub mod types;

pub use connections::ConnectionManager;
pub use executor::QueryExecutor;
pub use pool::{MySqlPoolFactory, PoolFactory, PoolRegistry};
pub use schema::SchemaInspector;
pub use session::ScopedSession;
