//! Template node for scale-up simulation
//!
//! The autoscaler asks each group what a fresh member would look like so it
//! can test whether pending pods would fit. The answer is synthetic: it is
//! never registered anywhere.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeStatus};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use nodepool_common::NODEPOOL_NAME_LABEL;

use crate::config::NodeTemplate;
use crate::instance::CONDITION_READY;

/// Name given to every template node
pub const TEMPLATE_NODE_NAME: &str = "template-node";

/// Build the template node for `pool`
pub fn build_template_node(pool: &str, template: &NodeTemplate) -> Node {
    let capacity = BTreeMap::from([
        ("pods".to_string(), Quantity(template.pods.to_string())),
        ("cpu".to_string(), Quantity(template.cpu.to_string())),
        ("memory".to_string(), Quantity(template.memory_bytes.to_string())),
        ("storage".to_string(), Quantity(template.storage_bytes.to_string())),
    ]);

    Node {
        metadata: ObjectMeta {
            name: Some(TEMPLATE_NODE_NAME.to_string()),
            labels: Some(BTreeMap::from([(
                NODEPOOL_NAME_LABEL.to_string(),
                pool.to_string(),
            )])),
            ..Default::default()
        },
        status: Some(NodeStatus {
            allocatable: Some(capacity.clone()),
            capacity: Some(capacity),
            conditions: Some(ready_conditions()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Conditions of a healthy node: Ready, and no pressure of any kind
fn ready_conditions() -> Vec<NodeCondition> {
    let condition = |type_: &str, status: &str| NodeCondition {
        type_: type_.to_string(),
        status: status.to_string(),
        ..Default::default()
    };

    vec![
        condition(CONDITION_READY, "True"),
        condition("MemoryPressure", "False"),
        condition("DiskPressure", "False"),
        condition("PIDPressure", "False"),
        condition("NetworkUnavailable", "False"),
    ]
}
