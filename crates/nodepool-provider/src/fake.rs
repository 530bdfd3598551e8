//! In-memory NodePoolClient for tests
//!
//! Holds NodePools and Kubernetes Nodes in maps and records every write, so
//! tests can assert on what reached the "API server" rather than on which
//! mock methods were called. Failure switches inject the error classes the
//! provider has to handle.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::core::ErrorResponse;
use kube::ResourceExt;
use parking_lot::Mutex;

use nodepool_common::crd::{NodePool, NodePoolSpec};
use nodepool_common::{Error, ANNOTATION_RECONCILE_SCHEDULED_AFTER, NODEPOOL_NAME_LABEL};

use crate::client::{NodePoolClient, TargetCountUpdate, KUBE_NODE_KIND, MEMBER_KIND, POOL_KIND};

/// Build a NodePool with the given bounds and target
pub(crate) fn sample_pool(name: &str, min: u32, max: u32, target: u32) -> NodePool {
    NodePool::new(
        name,
        NodePoolSpec {
            min_count: min,
            max_count: max,
            target_count: target,
        },
    )
}

/// Build a Kubernetes Node labelled as a member of `pool`
///
/// Ready nodes carry a `Ready=True` condition; others carry no conditions.
pub(crate) fn sample_node(name: &str, pool: &str, ready: bool) -> Node {
    let conditions = ready.then(|| {
        vec![NodeCondition {
            type_: "Ready".to_string(),
            status: "True".to_string(),
            ..Default::default()
        }]
    });

    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                NODEPOOL_NAME_LABEL.to_string(),
                pool.to_string(),
            )])),
            ..Default::default()
        },
        status: Some(NodeStatus {
            conditions,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A 500 from the API server
pub(crate) fn server_error() -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "etcdserver: request timed out".to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    })
}

#[derive(Default)]
pub(crate) struct FakeStore {
    pools: Mutex<BTreeMap<String, NodePool>>,
    nodes: Mutex<BTreeMap<String, Node>>,
    writes: Mutex<Vec<TargetCountUpdate>>,
    deletion_requests: Mutex<Vec<String>>,
    failing_deletions: Mutex<BTreeSet<String>>,
    created: AtomicUsize,
    pool_lists: AtomicUsize,
    fail_list_pools: AtomicBool,
    conflict_writes: AtomicBool,
    hang_writes: AtomicBool,
}

impl FakeStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn add_pool(&self, pool: NodePool) {
        self.pools.lock().insert(pool.name_any(), pool);
    }

    pub(crate) fn remove_pool(&self, name: &str) {
        self.pools.lock().remove(name);
    }

    /// Mark a stored pool as being deleted
    pub(crate) fn terminate_pool(&self, name: &str) {
        if let Some(pool) = self.pools.lock().get_mut(name) {
            pool.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        }
    }

    pub(crate) fn pool(&self, name: &str) -> Option<NodePool> {
        self.pools.lock().get(name).cloned()
    }

    pub(crate) fn add_node(&self, node: Node) {
        self.nodes.lock().insert(node.name_any(), node);
    }

    pub(crate) fn writes(&self) -> Vec<TargetCountUpdate> {
        self.writes.lock().clone()
    }

    pub(crate) fn deletion_requests(&self) -> Vec<String> {
        self.deletion_requests.lock().clone()
    }

    pub(crate) fn pool_lists(&self) -> usize {
        self.pool_lists.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_list_pools(&self, fail: bool) {
        self.fail_list_pools.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn conflict_writes(&self, conflict: bool) {
        self.conflict_writes.store(conflict, Ordering::SeqCst);
    }

    /// Make target-count writes never complete
    pub(crate) fn hang_writes(&self, hang: bool) {
        self.hang_writes.store(hang, Ordering::SeqCst);
    }

    pub(crate) fn fail_deletion_of(&self, node: &str) {
        self.failing_deletions.lock().insert(node.to_string());
    }
}

#[async_trait]
impl NodePoolClient for FakeStore {
    async fn get_pool(&self, name: &str) -> Result<NodePool, Error> {
        self.pool(name)
            .ok_or_else(|| Error::not_found(POOL_KIND, name))
    }

    async fn list_pools(&self) -> Result<Vec<NodePool>, Error> {
        self.pool_lists.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_pools.load(Ordering::SeqCst) {
            return Err(server_error().into());
        }
        Ok(self.pools.lock().values().cloned().collect())
    }

    async fn list_nodes(&self, pool: &str) -> Result<Vec<Node>, Error> {
        Ok(self
            .nodes
            .lock()
            .values()
            .filter(|n| n.labels().get(NODEPOOL_NAME_LABEL).map(String::as_str) == Some(pool))
            .cloned()
            .collect())
    }

    async fn get_node(&self, name: &str) -> Result<Node, Error> {
        self.nodes
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(KUBE_NODE_KIND, name))
    }

    async fn create_node(&self, pool: &str) -> Result<(), Error> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        self.add_node(sample_node(&format!("{}-node-{}", pool, n), pool, false));
        Ok(())
    }

    async fn mark_node_for_deletion(&self, name: &str) -> Result<(), Error> {
        if self.failing_deletions.lock().contains(name) {
            return Err(server_error().into());
        }

        let mut nodes = self.nodes.lock();
        let node = nodes
            .get_mut(name)
            .ok_or_else(|| Error::not_found(MEMBER_KIND, name))?;
        node.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        self.deletion_requests.lock().push(name.to_string());
        Ok(())
    }

    async fn set_pool_target_count(&self, update: &TargetCountUpdate) -> Result<(), Error> {
        if self.hang_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.conflict_writes.load(Ordering::SeqCst) {
            return Err(Error::conflict(
                POOL_KIND,
                update.pool.clone(),
                "the object has been modified; please apply your changes to the latest version",
            ));
        }

        let mut pools = self.pools.lock();
        let pool = pools
            .get_mut(&update.pool)
            .ok_or_else(|| Error::not_found(POOL_KIND, update.pool.clone()))?;
        pool.spec.target_count = update.target_count;
        pool.annotations_mut().insert(
            ANNOTATION_RECONCILE_SCHEDULED_AFTER.to_string(),
            update.suppression.annotation_value(),
        );
        self.writes.lock().push(update.clone());
        Ok(())
    }
}
