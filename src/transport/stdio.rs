//! Stdio transport for the MCP server.
//!
//! Reads JSON-RPC messages from stdin and writes responses to stdout.

use crate::db::QueryExecutor;
use crate::error::{DbError, DbResult};
use crate::mcp::GatewayService;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};

pub struct StdioTransport {
    executor: QueryExecutor,
}

impl StdioTransport {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = GatewayService::new(self.executor.clone());
        let running_service = service
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        self.executor.manager().close_all().await;
                        return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        info!("Closing all database pools");
        self.executor.manager().close_all().await;

        if shutdown_requested {
            // A blocking stdin read cannot be interrupted by select!.
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionManager;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_stdio_transport_creation() {
        let manager = Arc::new(ConnectionManager::mysql(
            Vec::new(),
            Duration::from_secs(1),
            Duration::from_secs(60),
            Duration::from_secs(1),
        ));
        let transport = StdioTransport::new(QueryExecutor::new(manager, 30));
        assert_eq!(transport.name(), "stdio");
    }
}
