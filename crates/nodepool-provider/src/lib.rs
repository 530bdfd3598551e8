//! Cluster autoscaler provider backed by NodePool custom resources
//!
//! This crate provides:
//! - NodePoolClient, a facade over the NodePool and Node CRs
//! - PoolNodeGroup, which turns autoscaler size requests into `targetCount` writes
//! - NodePoolCloudProvider, the registry the autoscaler refreshes and queries
//!
//! Machines are never provisioned here. The NodePool controller watches the
//! target counts this crate writes and does the rest.

pub mod client;
pub mod cloud_provider;
pub mod config;
pub mod instance;
pub mod node_group;
pub mod registry;
pub mod template;

#[cfg(test)]
mod fake;

// Re-export client types
pub use client::{KubeNodePoolClient, NodePoolClient, ReconcileSuppression, TargetCountUpdate};

#[cfg(test)]
pub use client::MockNodePoolClient;

// Re-export the autoscaler-facing contract
pub use cloud_provider::{
    CloudProvider, NodeGroup, NodeGroupOptions, NodeGroupRequest, PricingModel, ResourceLimiter,
};
pub use config::{NodeTemplate, ProviderConfig};
pub use instance::{Instance, InstanceErrorClass, InstanceErrorInfo, InstanceStatus};
pub use node_group::PoolNodeGroup;
pub use registry::NodePoolCloudProvider;
