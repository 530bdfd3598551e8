//! NodePool CRD: a homogeneous group of worker nodes with member-count bounds

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// NodePool describes a group of interchangeable worker nodes.
///
/// `minCount` and `maxCount` belong to the operator; `targetCount` is what
/// the autoscaler writes. Fields the NodePool controller adds on top of these
/// are preserved by the provider's writes but not modelled here.
///
/// Example:
/// ```yaml
/// apiVersion: clusters.kloudlite.io/v1
/// kind: NodePool
/// metadata:
///   name: general
/// spec:
///   minCount: 1
///   maxCount: 5
///   targetCount: 2
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "clusters.kloudlite.io",
    version = "v1",
    kind = "NodePool",
    printcolumn = r#"{"name":"Min","type":"integer","jsonPath":".spec.minCount"}"#,
    printcolumn = r#"{"name":"Max","type":"integer","jsonPath":".spec.maxCount"}"#,
    printcolumn = r#"{"name":"Target","type":"integer","jsonPath":".spec.targetCount"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolSpec {
    /// Largest member count the autoscaler may request (inclusive)
    pub max_count: u32,

    /// Smallest member count the autoscaler may request (inclusive)
    pub min_count: u32,

    /// Desired member count; authoritative in the API server
    #[serde(default)]
    pub target_count: u32,
}

impl NodePool {
    /// Whether the pool is being torn down and must be left alone
    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Whether `minCount <= targetCount <= maxCount` holds in the stored spec
    pub fn target_within_bounds(&self) -> bool {
        let spec = &self.spec;
        spec.min_count <= spec.target_count && spec.target_count <= spec.max_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    fn sample_pool(min: u32, max: u32, target: u32) -> NodePool {
        NodePool::new(
            "general",
            NodePoolSpec {
                min_count: min,
                max_count: max,
                target_count: target,
            },
        )
    }

    #[test]
    fn api_identity_matches_wire_constants() {
        assert_eq!(NodePool::group(&()), crate::API_GROUP);
        assert_eq!(NodePool::version(&()), crate::API_VERSION);
        assert_eq!(NodePool::kind(&()), "NodePool");
        assert_eq!(NodePool::plural(&()), "nodepools");
    }

    #[test]
    fn pool_is_cluster_scoped() {
        let pool = sample_pool(1, 5, 2);
        assert!(pool.metadata.namespace.is_none());
    }

    #[test]
    fn spec_deserializes_camel_case_and_ignores_unknown_fields() {
        let pool: NodePool = serde_json::from_value(serde_json::json!({
            "apiVersion": "clusters.kloudlite.io/v1",
            "kind": "NodePool",
            "metadata": { "name": "gpu" },
            "spec": {
                "minCount": 0,
                "maxCount": 3,
                "targetCount": 1,
                "cloudProvider": "aws"
            }
        }))
        .unwrap();

        assert_eq!(pool.spec.min_count, 0);
        assert_eq!(pool.spec.max_count, 3);
        assert_eq!(pool.spec.target_count, 1);
    }

    #[test]
    fn missing_target_count_defaults_to_zero() {
        let spec: NodePoolSpec =
            serde_json::from_value(serde_json::json!({ "minCount": 0, "maxCount": 2 })).unwrap();
        assert_eq!(spec.target_count, 0);
    }

    #[test]
    fn terminating_follows_deletion_timestamp() {
        let mut pool = sample_pool(1, 5, 2);
        assert!(!pool.is_terminating());

        pool.metadata.deletion_timestamp = Some(
            k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(
                "2024-01-01T00:00:00Z".parse().unwrap(),
            ),
        );
        assert!(pool.is_terminating());
    }

    #[test]
    fn target_bounds_check() {
        assert!(sample_pool(1, 5, 2).target_within_bounds());
        assert!(sample_pool(1, 5, 1).target_within_bounds());
        assert!(sample_pool(1, 5, 5).target_within_bounds());
        assert!(!sample_pool(1, 5, 0).target_within_bounds());
        assert!(!sample_pool(1, 5, 6).target_within_bounds());
    }
}
