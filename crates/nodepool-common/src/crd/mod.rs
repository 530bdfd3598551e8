//! Custom Resource Definitions consumed by the provider
//!
//! Both kinds are owned by the external NodePool controller. The provider
//! reads them, writes `NodePool.spec.targetCount`, and creates or deletes
//! `Node` members.

mod node_pool;
mod pool_node;

pub use node_pool::{NodePool, NodePoolSpec};
pub use pool_node::{PoolNode, PoolNodeSpec};
