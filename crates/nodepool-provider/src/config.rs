//! Provider configuration
//!
//! Every field has a default, so an empty document is a valid config.

use std::time::Duration;

use serde::Deserialize;

use nodepool_common::DEFAULT_SUPPRESSION_WINDOW_SECS;

use crate::cloud_provider::ResourceLimiter;

/// Tunables for the node-pool provider
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// How far ahead of each target-count write the reconcile-suppression
    /// annotation points, in seconds
    pub suppression_window_secs: u64,

    /// Capacity advertised by each group's template node
    pub template: NodeTemplate,

    /// Cluster-wide resource limits handed back to the autoscaler
    pub resource_limits: ResourceLimiter,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            suppression_window_secs: DEFAULT_SUPPRESSION_WINDOW_SECS,
            template: NodeTemplate::default(),
            resource_limits: ResourceLimiter::default(),
        }
    }
}

impl ProviderConfig {
    /// Suppression window as a [`Duration`]
    pub fn suppression_window(&self) -> Duration {
        Duration::from_secs(self.suppression_window_secs)
    }
}

/// Capacity of a hypothetical new pool member, used only for scale-up
/// simulation
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeTemplate {
    /// Whole CPU cores
    pub cpu: u32,
    /// Memory in bytes
    pub memory_bytes: u64,
    /// Maximum pods per node
    pub pods: u32,
    /// Ephemeral storage in bytes
    pub storage_bytes: u64,
}

const GIB: u64 = 1024 * 1024 * 1024;

impl Default for NodeTemplate {
    fn default() -> Self {
        Self {
            cpu: 2,
            memory_bytes: 2 * GIB,
            pods: 110,
            storage_bytes: 30 * GIB,
        }
    }
}
