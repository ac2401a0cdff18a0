//! MySQL Gateway MCP - Main entry point.

use clap::Parser;
use mysql_gateway_mcp::config::{Config, TransportMode};
use mysql_gateway_mcp::db::{ConnectionManager, QueryExecutor};
use mysql_gateway_mcp::reload::spawn_reload_on_hangup;
use mysql_gateway_mcp::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logs go to stderr: stdout carries the stdio protocol.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_usage_hint() {
    eprintln!();
    eprintln!("Usage: mysql-gateway-mcp --database <label>=<uri>");
    eprintln!("       mysql-gateway-mcp --config <file.json>");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  mysql-gateway-mcp --database orders=mysql://reader:pw@db1:3306/orders");
    eprintln!("  mysql-gateway-mcp --database mysql://reader:pw@db1/orders?pool_size=10");
    eprintln!("  mysql-gateway-mcp --database scratch=mysql://app:pw@db2/scratch?read_only=false");
    eprintln!("  mysql-gateway-mcp --config fleet.json --only orders");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    if config.logging_enabled() {
        init_tracing(&config);
    }

    let descriptors = match config.load_descriptors() {
        Ok(descriptors) => descriptors,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage_hint();
            std::process::exit(1);
        }
    };

    info!(
        transport = %config.transport,
        databases = descriptors.len(),
        "Starting MySQL Gateway MCP v{}",
        env!("CARGO_PKG_VERSION")
    );
    for d in &descriptors {
        info!(
            database = %d.label,
            target = %d.masked_target(),
            read_only = d.read_only,
            pool_size = d.pool_size,
            "Database configured"
        );
    }

    // Pools are built on first use.
    let manager = Arc::new(ConnectionManager::mysql(
        descriptors,
        config.connect_timeout_duration(),
        config.idle_timeout_duration(),
        config.drain_timeout_duration(),
    ));
    spawn_reload_on_hangup(config.clone(), manager.clone());

    let executor = QueryExecutor::new(manager, config.query_timeout);

    let result = match config.transport {
        TransportMode::Stdio => StdioTransport::new(executor).run().await,
        TransportMode::Http => {
            HttpTransport::new(executor, config.http_bind_addr(), &config.mcp_endpoint)
                .run()
                .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
