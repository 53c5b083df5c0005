//! Manager configuration.

use crate::agent::ProvisionPolicy;

/// Configuration for the [`ConfigManager`](crate::ConfigManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Initial capacity of each per-kind registry.
    pub registry_capacity: usize,
    /// When to call the service agent for an already provisioned entity.
    pub provision_policy: ProvisionPolicy,
    /// Re-derive back-links and containment from peers when an entity is
    /// first created.
    ///
    /// Off by default: a link declared by a peer before its target existed
    /// stays unresolved until the target's own record lists it or
    /// [`ConfigManager::reconcile_links`](crate::ConfigManager::reconcile_links)
    /// runs.
    pub reconcile_on_create: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            registry_capacity: 64,
            provision_policy: ProvisionPolicy::default(),
            reconcile_on_create: false,
        }
    }
}
