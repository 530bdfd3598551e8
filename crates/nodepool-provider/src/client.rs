//! NodePool/Node client for the provider
//!
//! Provides a trait-based facade over the two custom resources, allowing
//! tests to swap in a fake store while production code talks to the API
//! server. No business logic lives here: calls are translated, NotFound and
//! Conflict are classified, and everything else is passed through.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use nodepool_common::crd::{NodePool, PoolNode};
use nodepool_common::{pool_selector, Error, ANNOTATION_RECONCILE_SCHEDULED_AFTER};

/// Kind label used in errors about NodePools
pub const POOL_KIND: &str = "NodePool";

/// Kind label used in errors about Node CRs
pub const MEMBER_KIND: &str = "Node.clusters.kloudlite.io";

/// Kind label used in errors about Kubernetes Nodes
pub const KUBE_NODE_KIND: &str = "Node";

/// Point in time before which the NodePool controller must not recompute
/// `targetCount` from its node census
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileSuppression {
    until: DateTime<Utc>,
}

impl ReconcileSuppression {
    /// Suppress reconciliation until `until`
    pub fn until(until: DateTime<Utc>) -> Self {
        Self { until }
    }

    /// Suppress reconciliation for `window` from now
    pub fn from_now(window: Duration) -> Result<Self, Error> {
        let window = TimeDelta::from_std(window).map_err(|e| {
            Error::internal_with_context("suppression", format!("window out of range: {}", e))
        })?;
        let until = Utc::now().checked_add_signed(window).ok_or_else(|| {
            Error::internal_with_context("suppression", "window overflows the clock")
        })?;
        Ok(Self { until })
    }

    /// End of the suppression window
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.until
    }

    /// Annotation value in the RFC 3339 form the controller parses
    pub fn annotation_value(&self) -> String {
        self.until.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// A target-count write: the new value plus the suppression hint that must
/// ride along with it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetCountUpdate {
    /// NodePool to write
    pub pool: String,
    /// New `spec.targetCount`
    pub target_count: u32,
    /// Stamped into the pool's annotations on the same write
    pub suppression: ReconcileSuppression,
}

impl TargetCountUpdate {
    /// Build a write for `pool`
    pub fn new(pool: impl Into<String>, target_count: u32, suppression: ReconcileSuppression) -> Self {
        Self {
            pool: pool.into(),
            target_count,
            suppression,
        }
    }
}

/// Trait abstracting NodePool and Node operations
///
/// This trait allows mocking the API server in tests while using the real
/// Kubernetes client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodePoolClient: Send + Sync {
    /// Get a NodePool by name
    async fn get_pool(&self, name: &str) -> Result<NodePool, Error>;

    /// List every NodePool, including ones being deleted
    async fn list_pools(&self) -> Result<Vec<NodePool>, Error>;

    /// List a pool's members, resolved to their Kubernetes Nodes
    ///
    /// Members whose Kubernetes Node does not exist yet (or any more) come
    /// back as a placeholder carrying the member's name, labels and
    /// deletion timestamp.
    async fn list_nodes(&self, pool: &str) -> Result<Vec<Node>, Error>;

    /// Get a Kubernetes Node by name
    async fn get_node(&self, name: &str) -> Result<Node, Error>;

    /// Request one new member for `pool`; its name shows up on the next list
    async fn create_node(&self, pool: &str) -> Result<(), Error>;

    /// Request removal of a member; it may linger while the controller drains it
    async fn mark_node_for_deletion(&self, name: &str) -> Result<(), Error>;

    /// Read-modify-write a pool's `targetCount` and suppression annotation
    ///
    /// Fails with [`Error::Conflict`] if the pool changed between the read
    /// and the write. Never retries.
    async fn set_pool_target_count(&self, update: &TargetCountUpdate) -> Result<(), Error>;
}

/// Real client implementation backed by the Kubernetes API server
pub struct KubeNodePoolClient {
    client: Client,
}

impl KubeNodePoolClient {
    /// Create a new KubeNodePoolClient wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pools(&self) -> Api<NodePool> {
        Api::all(self.client.clone())
    }

    /// Untyped view of NodePools, so writes keep fields we don't model
    fn pool_objects(&self) -> Api<DynamicObject> {
        Api::all_with(self.client.clone(), &ApiResource::erase::<NodePool>(&()))
    }

    fn members(&self) -> Api<PoolNode> {
        Api::all(self.client.clone())
    }

    fn kube_nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl NodePoolClient for KubeNodePoolClient {
    async fn get_pool(&self, name: &str) -> Result<NodePool, Error> {
        self.pools()
            .get(name)
            .await
            .map_err(|e| Error::from_kube(POOL_KIND, name, e))
    }

    async fn list_pools(&self) -> Result<Vec<NodePool>, Error> {
        let pools = self.pools().list(&ListParams::default()).await?;
        debug!(count = pools.items.len(), "Listed NodePools");
        Ok(pools.items)
    }

    async fn list_nodes(&self, pool: &str) -> Result<Vec<Node>, Error> {
        let members = self
            .members()
            .list(&ListParams::default().labels(&pool_selector(pool)))
            .await?;

        let mut nodes = Vec::with_capacity(members.items.len());
        for member in &members.items {
            let name = member.name_any();
            match self.get_node(&name).await {
                Ok(node) => nodes.push(node),
                Err(e) if e.is_not_found() => {
                    debug!(pool = %pool, node = %name, "Kubernetes Node not registered, using member placeholder");
                    nodes.push(placeholder_node(member));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(nodes)
    }

    async fn get_node(&self, name: &str) -> Result<Node, Error> {
        self.kube_nodes()
            .get(name)
            .await
            .map_err(|e| Error::from_kube(KUBE_NODE_KIND, name, e))
    }

    async fn create_node(&self, pool: &str) -> Result<(), Error> {
        let created = self
            .members()
            .create(&PostParams::default(), &PoolNode::member_of(pool))
            .await
            .map_err(|e| Error::from_kube(MEMBER_KIND, pool, e))?;

        info!(pool = %pool, node = %created.name_any(), "Requested new pool member");
        Ok(())
    }

    async fn mark_node_for_deletion(&self, name: &str) -> Result<(), Error> {
        self.members()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| Error::from_kube(MEMBER_KIND, name, e))?;

        info!(node = %name, "Node marked for deletion, NodePool controller takes it from here");
        Ok(())
    }

    async fn set_pool_target_count(&self, update: &TargetCountUpdate) -> Result<(), Error> {
        let api = self.pool_objects();

        let mut obj = api
            .get(&update.pool)
            .await
            .map_err(|e| Error::from_kube(POOL_KIND, &update.pool, e))?;

        apply_target_count(&mut obj, update)?;

        // The fetched resourceVersion rides along, so a concurrent change is a 409
        api.replace(&update.pool, &PostParams::default(), &obj)
            .await
            .map_err(|e| Error::from_kube(POOL_KIND, &update.pool, e))?;

        info!(
            pool = %update.pool,
            target = update.target_count,
            suppressed_until = %update.suppression.annotation_value(),
            "Updated NodePool target count"
        );
        Ok(())
    }
}

/// Stamp a target-count update onto a fetched NodePool object
fn apply_target_count(obj: &mut DynamicObject, update: &TargetCountUpdate) -> Result<(), Error> {
    let spec = obj
        .data
        .get_mut("spec")
        .and_then(|s| s.as_object_mut())
        .ok_or_else(|| Error::serialization_for_kind(POOL_KIND, "NodePool has no spec object"))?;
    spec.insert(
        "targetCount".to_string(),
        serde_json::Value::from(update.target_count),
    );

    obj.annotations_mut().insert(
        ANNOTATION_RECONCILE_SCHEDULED_AFTER.to_string(),
        update.suppression.annotation_value(),
    );

    Ok(())
}

/// Stand-in for a member whose Kubernetes Node is not registered
fn placeholder_node(member: &PoolNode) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(member.name_any()),
            labels: member.metadata.labels.clone(),
            deletion_timestamp: member.metadata.deletion_timestamp.clone(),
            ..Default::default()
        },
        ..Default::default()
    }
}
