//! Contract between the autoscaler control loop and a node-group provider
//!
//! The control loop calls [`CloudProvider::refresh`] once per cycle, reads
//! sizes from the groups it gets back, and calls the mutating [`NodeGroup`]
//! methods when it decides to scale. Everything is awaited in sequence; no
//! method spawns background work.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, Pod, Taint};
use serde::Deserialize;

use nodepool_common::Error;

use crate::instance::Instance;

/// One scalable group of nodes
#[async_trait]
pub trait NodeGroup: Send + Sync {
    /// Stable identifier of the group
    fn id(&self) -> &str;

    /// Smallest size the group may be scaled to
    fn min_size(&self) -> u32;

    /// Largest size the group may be scaled to
    fn max_size(&self) -> u32;

    /// Cached desired size; never touches the API server
    fn target_size(&self) -> u32;

    /// Raise the target size by `delta`
    async fn increase_size(&self, delta: u32) -> Result<(), Error>;

    /// Lower the target size by `delta` without removing specific nodes
    async fn decrease_target_size(&self, delta: u32) -> Result<(), Error>;

    /// Remove specific nodes and shrink the target size to match
    async fn delete_nodes(&self, nodes: &[Node]) -> Result<(), Error>;

    /// Current members with their lifecycle status
    async fn nodes(&self) -> Result<Vec<Instance>, Error>;

    /// Synthetic node describing what a new member would look like
    fn template_node_info(&self) -> Node;

    /// One-line summary for logs
    fn debug(&self) -> String;

    /// Whether the group exists in the backing store
    fn exist(&self) -> bool;

    /// Create the group in the backing store
    async fn create(&self) -> Result<Arc<dyn NodeGroup>, Error>;

    /// Delete the group from the backing store
    async fn delete(&self) -> Result<(), Error>;

    /// Whether the group was created by node auto-provisioning
    fn autoprovisioned(&self) -> bool;

    /// Per-group autoscaling options, given the autoscaler's defaults
    fn options(&self, defaults: &NodeGroupOptions) -> Result<NodeGroupOptions, Error>;
}

/// Autoscaling knobs the autoscaler lets a group override
#[derive(Clone, Debug, PartialEq)]
pub struct NodeGroupOptions {
    /// Utilization below which a node is a scale-down candidate
    pub scale_down_utilization_threshold: f64,
    /// Same, for GPU nodes
    pub scale_down_gpu_utilization_threshold: f64,
    /// How long a node must be unneeded before removal
    pub scale_down_unneeded_time: Duration,
    /// How long a node may stay unready before removal
    pub scale_down_unready_time: Duration,
    /// How long a new node may take to register
    pub max_node_provision_time: Duration,
}

/// Cluster-wide resource floors and ceilings
///
/// Keys are resource names such as `cpu` or `memory`; a missing key means
/// no limit on that side.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceLimiter {
    /// Lower limits per resource
    pub min_limits: BTreeMap<String, u64>,
    /// Upper limits per resource
    pub max_limits: BTreeMap<String, u64>,
}

impl ResourceLimiter {
    /// Lower limit for `resource`, zero when unset
    pub fn min_limit(&self, resource: &str) -> u64 {
        self.min_limits.get(resource).copied().unwrap_or(0)
    }

    /// Upper limit for `resource`, if any
    pub fn max_limit(&self, resource: &str) -> Option<u64> {
        self.max_limits.get(resource).copied()
    }
}

/// Prices for nodes and pods over a time range
pub trait PricingModel: Send + Sync {
    /// Cost of running `node` between `start` and `end`
    fn node_price(&self, node: &Node, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<f64, Error>;

    /// Cost of running `pod` between `start` and `end`
    fn pod_price(&self, pod: &Pod, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<f64, Error>;
}

/// Shape of a node group the autoscaler would like to have created
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeGroupRequest {
    /// Machine type to back the group with
    pub machine_type: String,
    /// Labels for the group's nodes
    pub labels: BTreeMap<String, String>,
    /// Labels reserved for the system
    pub system_labels: BTreeMap<String, String>,
    /// Taints for the group's nodes
    pub taints: Vec<Taint>,
}

/// A source of node groups the autoscaler can drive
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Constant identifier of the provider
    fn name(&self) -> &str;

    /// Snapshot of the groups found by the last successful refresh
    fn node_groups(&self) -> Vec<Arc<dyn NodeGroup>>;

    /// Group owning `node`, or `None` if the node is not under this provider's control
    async fn node_group_for_node(&self, node: &Node) -> Result<Option<Arc<dyn NodeGroup>>, Error>;

    /// Whether `node` has a backing instance
    async fn has_instance(&self, node: &Node) -> Result<bool, Error>;

    /// Rebuild the group set from the backing store
    async fn refresh(&self) -> Result<(), Error>;

    /// Label marking GPU nodes
    fn gpu_label(&self) -> &str;

    /// Resource limits the provider was configured with
    fn resource_limiter(&self) -> Result<ResourceLimiter, Error>;

    /// Pricing information
    fn pricing(&self) -> Result<Arc<dyn PricingModel>, Error>;

    /// Machine types a new group could use
    async fn available_machine_types(&self) -> Result<Vec<String>, Error>;

    /// Build (but not create) a new group
    async fn new_node_group(&self, request: &NodeGroupRequest)
        -> Result<Arc<dyn NodeGroup>, Error>;

    /// GPU types the provider can offer
    fn available_gpu_types(&self) -> Result<BTreeSet<String>, Error>;

    /// Release resources held by the provider
    async fn cleanup(&self) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_reads_configured_limits() {
        let limiter: ResourceLimiter = serde_json::from_value(serde_json::json!({
            "minLimits": { "cpu": 2 },
            "maxLimits": { "cpu": 64, "memory": 274877906944u64 }
        }))
        .unwrap();

        assert_eq!(limiter.min_limit("cpu"), 2);
        assert_eq!(limiter.min_limit("memory"), 0);
        assert_eq!(limiter.max_limit("cpu"), Some(64));
        assert_eq!(limiter.max_limit("memory"), Some(274_877_906_944));
        assert_eq!(limiter.max_limit("nvidia.com/gpu"), None);
    }

    #[test]
    fn empty_limiter_has_no_limits() {
        let limiter: ResourceLimiter = serde_json::from_str("{}").unwrap();
        assert_eq!(limiter, ResourceLimiter::default());
        assert_eq!(limiter.max_limit("cpu"), None);
    }
}
