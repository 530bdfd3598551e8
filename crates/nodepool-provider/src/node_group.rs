//! NodeGroup backed by a single NodePool
//!
//! The group keeps a cached copy of the pool's sizing fields. Reads are served
//! from the cache; writes go to the API server first and only touch the cache
//! once the server has accepted them. The next refresh replaces the group, so
//! the cache never outlives one autoscaler cycle.
//!
//! Size mutations on one group are serialized: the read-compute-write of the
//! target count runs under a per-group async lock, so two tasks sharing a
//! group cannot both compute from the same stale target.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use nodepool_common::crd::NodePool;
use nodepool_common::Error;

use crate::client::{NodePoolClient, ReconcileSuppression, TargetCountUpdate};
use crate::cloud_provider::{NodeGroup, NodeGroupOptions};
use crate::config::{NodeTemplate, ProviderConfig};
use crate::instance::{is_counted, to_instance, Instance};
use crate::template::build_template_node;

/// Node group for one NodePool
pub struct PoolNodeGroup {
    id: String,
    min_size: u32,
    max_size: u32,
    target_size: AtomicU32,
    resize_lock: Mutex<()>,
    template: NodeTemplate,
    suppression_window: Duration,
    client: Arc<dyn NodePoolClient>,
}

impl PoolNodeGroup {
    /// Build a group seeded from the pool's stored spec
    pub fn from_pool(pool: &NodePool, client: Arc<dyn NodePoolClient>, config: &ProviderConfig) -> Self {
        Self {
            id: pool.name_any(),
            min_size: pool.spec.min_count,
            max_size: pool.spec.max_count,
            target_size: AtomicU32::new(pool.spec.target_count),
            resize_lock: Mutex::new(()),
            template: config.template.clone(),
            suppression_window: config.suppression_window(),
            client,
        }
    }

    /// Write a new target count, stamping a fresh suppression window
    async fn write_target(&self, target: u32) -> Result<(), Error> {
        let suppression = ReconcileSuppression::from_now(self.suppression_window)?;
        let update = TargetCountUpdate::new(&self.id, target, suppression);
        self.client.set_pool_target_count(&update).await
    }

    /// Accept `desired` only if it lands in `[min_size, max_size]`
    ///
    /// Both bounds are checked whichever way the change goes.
    fn bounded_target(&self, desired: i64, what: &str) -> Result<u32, Error> {
        if desired > i64::from(self.max_size) {
            return Err(Error::invalid_argument(
                &self.id,
                format!("{}: desired {} exceeds max {}", what, desired, self.max_size),
            ));
        }
        if desired < i64::from(self.min_size) {
            return Err(Error::invalid_argument(
                &self.id,
                format!("{}: desired {} is below min {}", what, desired, self.min_size),
            ));
        }
        u32::try_from(desired).map_err(|e| {
            Error::internal_with_context("target size", format!("desired {}: {}", desired, e))
        })
    }

    fn positive_delta(&self, delta: u32, what: &str) -> Result<(), Error> {
        if delta == 0 {
            return Err(Error::invalid_argument(
                &self.id,
                format!("{} delta must be positive", what),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for PoolNodeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolNodeGroup")
            .field("id", &self.id)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("target_size", &self.target_size())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl NodeGroup for PoolNodeGroup {
    fn id(&self) -> &str {
        &self.id
    }

    fn min_size(&self) -> u32 {
        self.min_size
    }

    fn max_size(&self) -> u32 {
        self.max_size
    }

    fn target_size(&self) -> u32 {
        self.target_size.load(Ordering::Acquire)
    }

    async fn increase_size(&self, delta: u32) -> Result<(), Error> {
        self.positive_delta(delta, "size increase")?;
        let _guard = self.resize_lock.lock().await;

        let current = self.target_size();
        let desired = self.bounded_target(i64::from(current) + i64::from(delta), "size increase")?;

        self.write_target(desired).await?;
        self.target_size.store(desired, Ordering::Release);

        info!(pool = %self.id, from = current, to = desired, "Increased node group size");
        Ok(())
    }

    async fn decrease_target_size(&self, delta: u32) -> Result<(), Error> {
        self.positive_delta(delta, "size decrease")?;
        let _guard = self.resize_lock.lock().await;

        let current = self.target_size();
        let desired = self.bounded_target(i64::from(current) - i64::from(delta), "size decrease")?;

        self.write_target(desired).await?;
        self.target_size.store(desired, Ordering::Release);

        info!(pool = %self.id, from = current, to = desired, "Decreased node group target size");
        Ok(())
    }

    /// Lower the target first so the NodePool controller doesn't backfill,
    /// then request deletion of each node in order
    ///
    /// Stops at the first hard failure and reports which nodes were already
    /// requested; nothing is rolled back. Nodes that are already gone count
    /// as done.
    async fn delete_nodes(&self, nodes: &[Node]) -> Result<(), Error> {
        if nodes.is_empty() {
            return Ok(());
        }

        let names: Vec<String> = nodes.iter().map(|n| n.name_any()).collect();
        if names.iter().any(|name| name.is_empty()) {
            return Err(Error::invalid_argument(
                &self.id,
                "cannot delete a node without a name",
            ));
        }

        let _guard = self.resize_lock.lock().await;

        let current = self.target_size();
        let removed = u32::try_from(names.len()).unwrap_or(u32::MAX);
        let desired = current
            .saturating_sub(removed)
            .max(self.min_size)
            .min(self.max_size);

        self.write_target(desired).await?;
        self.target_size.store(desired, Ordering::Release);

        let mut requested = Vec::with_capacity(names.len());
        for name in names {
            match self.client.mark_node_for_deletion(&name).await {
                Ok(()) => requested.push(name),
                Err(e) if e.is_not_found() => {
                    debug!(pool = %self.id, node = %name, "Node already gone");
                    requested.push(name);
                }
                Err(e) => {
                    warn!(
                        pool = %self.id,
                        node = %name,
                        requested = requested.len(),
                        error = %e,
                        "Node deletion failed, stopping batch"
                    );
                    return Err(Error::PartialDeletion {
                        group: self.id.clone(),
                        node: name,
                        deleted: requested,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(
            pool = %self.id,
            nodes = requested.len(),
            from = current,
            to = desired,
            "Requested node deletions"
        );
        Ok(())
    }

    async fn nodes(&self) -> Result<Vec<Instance>, Error> {
        let nodes = self.client.list_nodes(&self.id).await?;

        let counted = nodes.iter().filter(|n| is_counted(n)).count();
        debug!(
            pool = %self.id,
            members = nodes.len(),
            counted = counted,
            terminating = nodes.len() - counted,
            "Listed node group members"
        );

        Ok(nodes.iter().map(to_instance).collect())
    }

    fn template_node_info(&self) -> Node {
        build_template_node(&self.id, &self.template)
    }

    fn debug(&self) -> String {
        format!(
            "pool: {}, minSize: {}, maxSize: {}, targetSize: {}",
            self.id,
            self.min_size,
            self.max_size,
            self.target_size()
        )
    }

    fn exist(&self) -> bool {
        true
    }

    async fn create(&self) -> Result<Arc<dyn NodeGroup>, Error> {
        Err(Error::not_implemented("node group creation"))
    }

    async fn delete(&self) -> Result<(), Error> {
        Err(Error::not_implemented("node group deletion"))
    }

    fn autoprovisioned(&self) -> bool {
        false
    }

    fn options(&self, defaults: &NodeGroupOptions) -> Result<NodeGroupOptions, Error> {
        Ok(defaults.clone())
    }
}
