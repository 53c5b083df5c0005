//! Builder for configuring and creating the [`ConfigManager`].

use std::sync::Arc;

use svcmon_core::{ConfigReader, Result, SvcMonError};

use crate::agent::{NoopAgent, ProvisionPolicy, ServiceAgent};
use crate::config::ManagerConfig;
use crate::manager::ConfigManager;
use crate::metrics::ManagerMetrics;

/// Builder for creating a [`ConfigManager`].
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use svcmon_cache::{ConfigManager, ProvisionPolicy};
///
/// let manager = ConfigManager::builder()
///     .reader(Arc::new(my_reader))
///     .agent(Arc::new(my_agent))
///     .registry_capacity(1024)
///     .provision_policy(ProvisionPolicy::Always)
///     .build()?;
/// ```
#[derive(Default)]
pub struct ConfigManagerBuilder {
    reader: Option<Arc<dyn ConfigReader>>,
    agent: Option<Arc<dyn ServiceAgent>>,
    metrics: Option<ManagerMetrics>,
    registry_capacity: Option<usize>,
    provision_policy: Option<ProvisionPolicy>,
    reconcile_on_create: bool,
}

impl ConfigManagerBuilder {
    /// Create a new manager builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config server reader.
    ///
    /// This is required.
    pub fn reader(mut self, reader: impl ConfigReader + 'static) -> Self {
        self.reader = Some(Arc::new(reader));
        self
    }

    /// Set the service agent.
    ///
    /// If not set, a [`NoopAgent`] is used.
    pub fn agent(mut self, agent: impl ServiceAgent + 'static) -> Self {
        self.agent = Some(Arc::new(agent));
        self
    }

    /// Share an existing metrics handle.
    pub fn metrics(mut self, metrics: ManagerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the initial capacity of each registry.
    pub fn registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = Some(capacity);
        self
    }

    /// Set when the service agent is called for already provisioned entities.
    pub fn provision_policy(mut self, policy: ProvisionPolicy) -> Self {
        self.provision_policy = Some(policy);
        self
    }

    /// Adopt links declared by peers when an entity is first created.
    pub fn reconcile_on_create(mut self, enabled: bool) -> Self {
        self.reconcile_on_create = enabled;
        self
    }

    /// Use a complete configuration, overriding individual settings.
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.registry_capacity = Some(config.registry_capacity);
        self.provision_policy = Some(config.provision_policy);
        self.reconcile_on_create = config.reconcile_on_create;
        self
    }

    /// Build the manager.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No reader was provided
    /// - The registry capacity is zero
    pub fn build(self) -> Result<ConfigManager> {
        let reader = self
            .reader
            .ok_or_else(|| SvcMonError::Configuration("reader is required".into()))?;

        let defaults = ManagerConfig::default();
        let registry_capacity = self.registry_capacity.unwrap_or(defaults.registry_capacity);
        if registry_capacity == 0 {
            return Err(SvcMonError::Configuration(
                "registry capacity must be positive".into(),
            ));
        }

        let config = ManagerConfig {
            registry_capacity,
            provision_policy: self.provision_policy.unwrap_or(defaults.provision_policy),
            reconcile_on_create: self.reconcile_on_create,
        };

        let agent = self.agent.unwrap_or_else(|| Arc::new(NoopAgent));
        let metrics = self.metrics.unwrap_or_default();

        Ok(ConfigManager::from_parts(config, reader, agent, metrics))
    }
}
