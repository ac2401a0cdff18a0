//! Configuration hot reload.
//!
//! On `SIGHUP` every configuration source is read again and the resolved
//! descriptors replace the live catalog. A reload that fails to load or
//! validate leaves the previous catalog in place.

use crate::config::{Config, ConfigError};
use crate::db::{ConnectionManager, PoolFactory};
use std::sync::Arc;
use tracing::{error, info};

/// Re-read `config`'s sources and publish the result to `manager`.
///
/// Returns the number of descriptors now active.
pub async fn reload_descriptors<F: PoolFactory>(
    config: &Config,
    manager: &ConnectionManager<F>,
) -> Result<usize, ConfigError> {
    let descriptors = config.load_descriptors()?;
    let count = descriptors.len();
    manager.reload(descriptors).await;
    Ok(count)
}

/// Spawn a task that reloads configuration on every `SIGHUP`.
#[cfg(unix)]
pub fn spawn_reload_on_hangup<F: PoolFactory>(config: Config, manager: Arc<ConnectionManager<F>>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(e) => {
            error!(error = %e, "Failed to install SIGHUP handler; configuration reload disabled");
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, reloading configuration");
            match reload_descriptors(&config, &manager).await {
                Ok(count) => info!(databases = count, "Configuration reload applied"),
                Err(e) => error!(error = %e, "Configuration reload failed; keeping previous databases"),
            }
        }
    });
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup<F: PoolFactory>(_config: Config, _manager: Arc<ConnectionManager<F>>) {
    info!("Configuration reload on SIGHUP is not available on this platform");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionDescriptor;
    use std::time::Duration;

    fn manager() -> ConnectionManager {
        ConnectionManager::mysql(
            vec![ConnectionDescriptor::from_uri("orders", "mysql://app@db1/orders")],
            Duration::from_secs(1),
            Duration::from_secs(60),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_reload_publishes_new_labels() {
        let manager = manager();
        let mut config = Config::default_config();
        config.databases = vec![
            "orders=mysql://app@db1/orders".to_string(),
            "billing=mysql://app@db2/billing".to_string(),
        ];

        let count = reload_descriptors(&config, &manager).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(manager.labels().await, vec!["orders", "billing"]);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_catalog() {
        let manager = manager();
        let mut config = Config::default_config();
        config.databases = vec!["bad label=mysql://app@db1/orders".to_string()];

        assert!(reload_descriptors(&config, &manager).await.is_err());
        assert_eq!(manager.labels().await, vec!["orders"]);
    }
}
