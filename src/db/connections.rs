//! Descriptor catalog and label resolution.
//!
//! [`ConnectionManager`] owns the current list of resolved descriptors and
//! the [`PoolRegistry`]. A reload swaps the whole list atomically; pools are
//! reconciled lazily (fingerprint check on next use) except for removed
//! labels, which are retired immediately.

use crate::db::pool::{MySqlPoolFactory, PoolFactory, PoolRegistry};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionDescriptor, DatabaseSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct ConnectionManager<F: PoolFactory = MySqlPoolFactory> {
    catalog: RwLock<Arc<Vec<ConnectionDescriptor>>>,
    registry: PoolRegistry<F>,
}

impl<F: PoolFactory> ConnectionManager<F> {
    pub fn new(factory: F, descriptors: Vec<ConnectionDescriptor>, drain_timeout: Duration) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(descriptors)),
            registry: PoolRegistry::new(factory, drain_timeout),
        }
    }

    pub fn registry(&self) -> &PoolRegistry<F> {
        &self.registry
    }

    /// Snapshot of the current descriptor list.
    pub async fn descriptors(&self) -> Arc<Vec<ConnectionDescriptor>> {
        Arc::clone(&*self.catalog.read().await)
    }

    /// Configured labels, in configuration order.
    pub async fn labels(&self) -> Vec<String> {
        self.descriptors()
            .await
            .iter()
            .map(|d| d.label.clone())
            .collect()
    }

    /// Resolve a label, failing with the list of available labels.
    pub async fn descriptor(&self, label: &str) -> DbResult<ConnectionDescriptor> {
        let catalog = self.descriptors().await;
        catalog
            .iter()
            .find(|d| d.label == label)
            .cloned()
            .ok_or_else(|| {
                DbError::label_not_found(label, catalog.iter().map(|d| d.label.clone()).collect())
            })
    }

    /// Live pool for a resolved descriptor.
    ///
    /// The label is looked up again in the current catalog, so a descriptor
    /// captured before a reload gets the reloaded pool.
    pub async fn pool_for(&self, descriptor: &ConnectionDescriptor) -> DbResult<F::Pool> {
        let current = self.descriptor(&descriptor.label).await?;
        if current.fingerprint() != descriptor.fingerprint() {
            debug!(
                database = %current.label,
                "Descriptor changed by a reload; using current settings"
            );
        }
        self.registry.get_or_create(&current).await
    }

    /// Public view of every configured database.
    pub async fn summaries(&self) -> Vec<DatabaseSummary> {
        let catalog = self.descriptors().await;
        let mut summaries = Vec::with_capacity(catalog.len());
        for d in catalog.iter() {
            summaries.push(DatabaseSummary {
                database: d.label.clone(),
                target: d.masked_target(),
                read_only: d.read_only,
                pool_size: d.pool_size,
                pool_active: self.registry.is_active(&d.label).await,
            });
        }
        summaries
    }

    /// Publish a new descriptor list and retire pools for removed labels.
    pub async fn reload(&self, descriptors: Vec<ConnectionDescriptor>) {
        let labels: Vec<String> = descriptors.iter().map(|d| d.label.clone()).collect();
        let previous = {
            let mut catalog = self.catalog.write().await;
            std::mem::replace(&mut *catalog, Arc::new(descriptors))
        };

        let added = labels
            .iter()
            .filter(|label| previous.iter().all(|old| &old.label != *label))
            .count();
        let removed = previous
            .iter()
            .filter(|d| !labels.contains(&d.label))
            .count();
        info!(
            databases = labels.len(),
            added,
            removed,
            "Configuration reloaded"
        );

        self.registry.retain(&labels).await;
    }

    /// Drain every pool. Further pool requests fail.
    pub async fn close_all(&self) {
        self.registry.close_all().await;
    }
}

impl ConnectionManager<MySqlPoolFactory> {
    /// Manager using the production MySQL factory.
    pub fn mysql(
        descriptors: Vec<ConnectionDescriptor>,
        acquire_timeout: Duration,
        idle_timeout: Duration,
        drain_timeout: Duration,
    ) -> Self {
        Self::new(
            MySqlPoolFactory::new(acquire_timeout, idle_timeout),
            descriptors,
            drain_timeout,
        )
    }
}
