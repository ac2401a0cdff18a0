//! Streamable HTTP transport for the MCP server.

use crate::db::QueryExecutor;
use crate::error::{DbError, DbResult};
use crate::mcp::GatewayService;
use crate::transport::{Transport, wait_for_signal};
use axum::Router;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Open SSE streams can keep graceful shutdown waiting forever.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport with one [`GatewayService`] per MCP session. All sessions
/// share the executor and therefore the pool registry.
pub struct HttpTransport {
    executor: QueryExecutor,
    bind_addr: String,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        executor: QueryExecutor,
        bind_addr: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            bind_addr: bind_addr.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    fn router(&self) -> Router {
        let executor = self.executor.clone();
        let service = StreamableHttpService::new(
            move || Ok(GatewayService::new(executor.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        match self.endpoint.trim_end_matches('/') {
            // nest_service panics on "/"
            "" => Router::new().fallback_service(service),
            path => Router::new().nest_service(path, service),
        }
    }
}

/// After the first signal, give in-flight streams [`GRACEFUL_TIMEOUT`] to
/// finish. A second signal cuts the wait short.
async fn grace_period(stopping: Arc<Notify>) {
    stopping.notified().await;
    info!(
        timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
        "Waiting for HTTP sessions to close (signal again to force exit)"
    );
    tokio::select! {
        _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => warn!("Graceful shutdown timed out"),
        _ = wait_for_signal() => warn!("Second signal received, not waiting for sessions"),
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let listener = TcpListener::bind(&self.bind_addr).await.map_err(|e| {
            DbError::internal(format!(
                "Failed to bind HTTP listener on {}: {e}. Check that the port is free",
                self.bind_addr
            ))
        })?;
        info!(addr = %self.bind_addr, endpoint = %self.endpoint, "MCP HTTP endpoint ready");

        let stopping = Arc::new(Notify::new());
        let on_signal = Arc::clone(&stopping);
        let server = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            wait_for_signal().await;
            on_signal.notify_one();
        });

        let outcome = tokio::select! {
            result = server.into_future() => result.map_err(|e| {
                error!(error = %e, "HTTP server failed");
                DbError::internal(format!("HTTP server error: {e}"))
            }),
            _ = grace_period(stopping) => Ok(()),
        };

        info!("Closing all database pools");
        self.executor.manager().close_all().await;

        outcome
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionManager;

    fn transport(bind_addr: &str, endpoint: &str) -> HttpTransport {
        let manager = Arc::new(ConnectionManager::mysql(
            Vec::new(),
            Duration::from_secs(1),
            Duration::from_secs(60),
            Duration::from_secs(1),
        ));
        HttpTransport::new(QueryExecutor::new(manager, 30), bind_addr, endpoint)
    }

    #[test]
    fn test_http_transport_creation() {
        let transport = transport("127.0.0.1:8080", "/mcp");
        assert_eq!(transport.name(), "http");
        assert_eq!(transport.bind_addr(), "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_router_accepts_root_and_nested_endpoints() {
        for endpoint in ["/", "/mcp", "/api/mcp/"] {
            let _ = transport("127.0.0.1:8080", endpoint).router();
        }
    }

    #[tokio::test]
    async fn test_run_fails_on_unbindable_address() {
        let err = transport("missing-port", "/mcp").run().await.unwrap_err();
        assert!(matches!(err, DbError::Internal { .. }));
        assert!(err.to_string().contains("missing-port"));
    }
}
