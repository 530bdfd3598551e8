//! Node CRD: one requested member of a NodePool
//!
//! The NodePool controller turns each of these into a machine, and the
//! machine registers a Kubernetes `Node` of the same name.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::NODEPOOL_NAME_LABEL;

/// Declarative pool member (`clusters.kloudlite.io/v1, Kind=Node`).
///
/// The derive names the root type after the kind; use it as [`PoolNode`]
/// to keep it apart from the core Kubernetes `Node`.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "clusters.kloudlite.io",
    version = "v1",
    kind = "Node",
    printcolumn = r#"{"name":"Pool","type":"string","jsonPath":".spec.nodepoolName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PoolNodeSpec {
    /// Name of the owning NodePool
    pub nodepool_name: String,
}

/// A `clusters.kloudlite.io/v1` Node, as distinct from a Kubernetes `Node`
pub type PoolNode = Node;

impl PoolNode {
    /// Build a new, unnamed member request for `pool`
    ///
    /// The API server picks the final name from the `<pool>-node-` prefix.
    pub fn member_of(pool: &str) -> Self {
        Self {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}-node-", pool)),
                labels: Some(BTreeMap::from([(
                    NODEPOOL_NAME_LABEL.to_string(),
                    pool.to_string(),
                )])),
                ..Default::default()
            },
            spec: PoolNodeSpec {
                nodepool_name: pool.to_string(),
            },
        }
    }

    /// Whether the member is on its way out
    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
