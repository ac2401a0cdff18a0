//! MySQL Gateway MCP Library
//!
//! MCP (Model Context Protocol) tools that let an AI assistant run single,
//! read-intent statements against a configured fleet of MySQL databases.
//! Stacked and administrative statements are rejected before any connection
//! is acquired, and pools are built lazily per database label.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod reload;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::GatewayService;
