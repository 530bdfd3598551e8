//! Common types for the node-pool autoscaler provider: CRDs, errors, and wire constants
//!
//! The constants below are a contract with the external NodePool controller,
//! which owns the CRDs and provisions the machines. Changing any of them
//! breaks that controller's view of what this provider writes.

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Name the autoscaler uses to select this provider
pub const PROVIDER_NAME: &str = "kloudlite";

/// API group of the NodePool and Node custom resources
pub const API_GROUP: &str = "clusters.kloudlite.io";

/// API version of the NodePool and Node custom resources
pub const API_VERSION: &str = "v1";

/// Label carried by Node CRs and Kubernetes Nodes naming their owning NodePool
pub const NODEPOOL_NAME_LABEL: &str = "kloudlite.io/nodepool.name";

/// Label marking nodes that expose GPUs
pub const GPU_LABEL: &str = "kloudlite.io/node.has-gpu";

/// Annotation telling the NodePool controller not to recompute `targetCount`
/// from the live node census before the RFC 3339 timestamp it holds
pub const ANNOTATION_RECONCILE_SCHEDULED_AFTER: &str = "kloudlite.io/reconcile.scheduled-after";

/// Default length of the reconcile-suppression window, in seconds
pub const DEFAULT_SUPPRESSION_WINDOW_SECS: u64 = 10;

/// Label selector matching every member of a pool
pub fn pool_selector(pool: &str) -> String {
    format!("{}={}", NODEPOOL_NAME_LABEL, pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_selector_uses_ownership_label() {
        assert_eq!(pool_selector("p1"), "kloudlite.io/nodepool.name=p1");
    }
}
