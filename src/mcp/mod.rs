//! MCP server integration module.
//!
//! Connects the MCP protocol to the gateway's tool handlers using the rmcp
//! framework.

pub mod service;

pub use service::GatewayService;
