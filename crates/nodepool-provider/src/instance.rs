//! Instance status derivation for pool members
//!
//! The autoscaler only needs a coarse lifecycle: is the machine going away,
//! has its kubelet reported in yet, or do we not know. Health beyond that is
//! the scheduler's business.

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

use nodepool_common::NODEPOOL_NAME_LABEL;

/// Node condition type reported by the kubelet once it is up
pub const CONDITION_READY: &str = "Ready";

/// Error code attached to members whose state cannot be classified
pub const UNKNOWN_STATE_CODE: &str = "unknown";

/// Error message attached to members whose state cannot be classified
pub const UNKNOWN_STATE_MESSAGE: &str = "unknown instance state";

/// One pool member as seen by the autoscaler
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    /// Node name
    pub id: String,
    /// Derived lifecycle status
    pub status: InstanceStatus,
}

/// Coarse lifecycle classification of a pool member
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstanceStatus {
    /// The node has reported a Ready condition (of any value)
    Running,
    /// The node is marked for deletion
    Deleting,
    /// The node could not be classified
    Error(InstanceErrorInfo),
}

/// Class of an instance error, as understood by the autoscaler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceErrorClass {
    /// Failure not tied to capacity exhaustion
    Other,
}

/// Details carried by [`InstanceStatus::Error`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceErrorInfo {
    /// Error class
    pub class: InstanceErrorClass,
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl InstanceErrorInfo {
    fn unknown_state() -> Self {
        Self {
            class: InstanceErrorClass::Other,
            code: UNKNOWN_STATE_CODE.to_string(),
            message: UNKNOWN_STATE_MESSAGE.to_string(),
        }
    }
}

/// Derive the instance status of a node
///
/// Deletion wins over everything else. Otherwise any reported Ready
/// condition counts as running, whatever its value.
pub fn instance_status(node: &Node) -> InstanceStatus {
    if node.metadata.deletion_timestamp.is_some() {
        return InstanceStatus::Deleting;
    }

    let has_ready = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| conds.iter().any(|c| c.type_ == CONDITION_READY))
        .unwrap_or(false);

    if has_ready {
        InstanceStatus::Running
    } else {
        InstanceStatus::Error(InstanceErrorInfo::unknown_state())
    }
}

/// Pair a node's name with its derived status
pub fn to_instance(node: &Node) -> Instance {
    Instance {
        id: node.name_any(),
        status: instance_status(node),
    }
}

/// Whether the node still counts toward its pool's size
pub fn is_counted(node: &Node) -> bool {
    node.metadata.deletion_timestamp.is_none()
}

/// Name of the pool that owns the node, if it carries a non-empty ownership label
pub fn owning_pool(node: &Node) -> Option<&str> {
    node.labels()
        .get(NODEPOOL_NAME_LABEL)
        .map(String::as_str)
        .filter(|pool| !pool.is_empty())
}
