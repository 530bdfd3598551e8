//! The provider the autoscaler talks to: a registry of NodePool-backed groups
//!
//! The registry owns the set of [`PoolNodeGroup`]s and swaps it wholesale on
//! every successful refresh. Readers take a cheap snapshot of the current
//! set; a refresh that fails leaves the previous set in place.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use nodepool_common::{Error, GPU_LABEL, PROVIDER_NAME};

use crate::client::{KubeNodePoolClient, NodePoolClient};
use crate::cloud_provider::{
    CloudProvider, NodeGroup, NodeGroupRequest, PricingModel, ResourceLimiter,
};
use crate::config::ProviderConfig;
use crate::instance::owning_pool;
use crate::node_group::PoolNodeGroup;

/// Cloud provider exposing one node group per live NodePool
pub struct NodePoolCloudProvider {
    client: Arc<dyn NodePoolClient>,
    config: ProviderConfig,
    node_groups: RwLock<Vec<Arc<PoolNodeGroup>>>,
}

impl NodePoolCloudProvider {
    /// Create a provider with an empty group set; call
    /// [`CloudProvider::refresh`] to populate it
    pub fn new(client: Arc<dyn NodePoolClient>, config: ProviderConfig) -> Self {
        Self {
            client,
            config,
            node_groups: RwLock::new(Vec::new()),
        }
    }

    /// Create a provider talking to the API server through `client`
    pub fn from_kube_client(client: kube::Client, config: ProviderConfig) -> Self {
        Self::new(Arc::new(KubeNodePoolClient::new(client)), config)
    }

    /// Look up a group by pool name in the current set
    pub fn group(&self, id: &str) -> Option<Arc<PoolNodeGroup>> {
        self.node_groups
            .read()
            .iter()
            .find(|g| g.id() == id)
            .cloned()
    }
}

#[async_trait]
impl CloudProvider for NodePoolCloudProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn node_groups(&self) -> Vec<Arc<dyn NodeGroup>> {
        self.node_groups
            .read()
            .iter()
            .map(|g| g.clone() as Arc<dyn NodeGroup>)
            .collect()
    }

    /// Resolve the node by name first: the caller's copy may be a partial
    /// projection without labels
    async fn node_group_for_node(&self, node: &Node) -> Result<Option<Arc<dyn NodeGroup>>, Error> {
        let name = node.name_any();
        let live = match self.client.get_node(&name).await {
            Ok(live) => live,
            Err(e) if e.is_not_found() => {
                debug!(node = %name, "Node not found, not under provider control");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(pool) = owning_pool(&live) else {
            debug!(node = %name, "Node has no pool label, not under provider control");
            return Ok(None);
        };

        let group = self.group(pool);
        if group.is_none() {
            debug!(node = %name, pool = %pool, "Node belongs to a pool not in the registry");
        }
        Ok(group.map(|g| g as Arc<dyn NodeGroup>))
    }

    async fn has_instance(&self, _node: &Node) -> Result<bool, Error> {
        Ok(true)
    }

    async fn refresh(&self) -> Result<(), Error> {
        let pools = self.client.list_pools().await?;

        let mut groups = Vec::with_capacity(pools.len());
        for pool in &pools {
            if pool.is_terminating() {
                debug!(pool = %pool.name_any(), "Skipping NodePool being deleted");
                continue;
            }
            if !pool.target_within_bounds() {
                warn!(
                    pool = %pool.name_any(),
                    min = pool.spec.min_count,
                    max = pool.spec.max_count,
                    target = pool.spec.target_count,
                    "NodePool target count is outside its bounds"
                );
            }

            let group = PoolNodeGroup::from_pool(pool, self.client.clone(), &self.config);
            debug!(group = %group.debug(), "Registered node group");
            groups.push(Arc::new(group));
        }

        let skipped = pools.len() - groups.len();
        let count = groups.len();
        *self.node_groups.write() = groups;

        info!(groups = count, skipped = skipped, "Refreshed node groups");
        Ok(())
    }

    fn gpu_label(&self) -> &str {
        GPU_LABEL
    }

    fn resource_limiter(&self) -> Result<ResourceLimiter, Error> {
        Ok(self.config.resource_limits.clone())
    }

    fn pricing(&self) -> Result<Arc<dyn PricingModel>, Error> {
        Err(Error::not_implemented("pricing"))
    }

    async fn available_machine_types(&self) -> Result<Vec<String>, Error> {
        Err(Error::not_implemented("machine type listing"))
    }

    async fn new_node_group(&self, _request: &NodeGroupRequest) -> Result<Arc<dyn NodeGroup>, Error> {
        Err(Error::not_implemented("node group auto-provisioning"))
    }

    fn available_gpu_types(&self) -> Result<BTreeSet<String>, Error> {
        Err(Error::not_implemented("GPU type listing"))
    }

    async fn cleanup(&self) -> Result<(), Error> {
        Ok(())
    }
}
