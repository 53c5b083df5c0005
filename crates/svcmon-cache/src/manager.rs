//! The notification dispatcher.
//!
//! [`ConfigManager`] owns one [`EntityRegistry`] per kind, the config server
//! reader, and the service agent. Every notification is serialized through a
//! single dispatch lock; reads through the typed registry accessors never
//! take it.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use svcmon_core::{ConfigReader, EntityKind, ObjectId, Result, SvcMonError};
use tracing::{debug, trace, warn};

use crate::agent::{ProvisionPolicy, Provisionable, Provisioned, ServiceAgent};
use crate::builder::ConfigManagerBuilder;
use crate::config::ManagerConfig;
use crate::entities::{
    HealthMonitor, InstanceIp, LoadBalancerMember, LoadBalancerPool, LogicalInterface,
    PhysicalInterface, PhysicalRouter, Project, ServiceInstance, ServiceTemplate, VirtualIp,
    VirtualMachineInterface, VirtualNetwork,
};
use crate::entity::ConfigEntity;
use crate::links::LinkDelta;
use crate::metrics::ManagerMetrics;
use crate::registry::{
    BackLink, EntityRegistry, KindRegistry, LinkViolation, Relation, RepairReport,
};
use crate::stats::RegistryStats;

/// Change announced by the config server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// A new object.
    Create,
    /// An existing object changed.
    Update,
    /// An object was deleted.
    Delete,
}

impl Operation {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = SvcMonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            _ => Err(SvcMonError::UnknownOperation {
                operation: s.to_string(),
            }),
        }
    }
}

/// A change notification for one object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// What happened.
    pub operation: Operation,
    /// Kind of the object.
    pub kind: EntityKind,
    /// Uuid of the object.
    pub uuid: ObjectId,
}

impl Notification {
    /// Create a notification.
    pub fn new(operation: Operation, kind: EntityKind, uuid: impl Into<ObjectId>) -> Self {
        Self {
            operation,
            kind,
            uuid: uuid.into(),
        }
    }

    /// Parse a notification from wire strings.
    ///
    /// # Errors
    ///
    /// Returns [`SvcMonError::UnknownOperation`] or [`SvcMonError::UnknownKind`]
    /// when either string is not recognized.
    pub fn parse(operation: &str, type_name: &str, uuid: impl Into<ObjectId>) -> Result<Self> {
        Ok(Self::new(operation.parse()?, type_name.parse()?, uuid))
    }
}

/// What a notification did to the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationOutcome {
    /// A new entity was constructed and refreshed.
    Created,
    /// An existing entity was refreshed.
    Refreshed,
    /// An entity was torn down and erased.
    Removed,
    /// Nothing to do: the uuid was neither registered nor readable.
    Ignored,
}

impl NotificationOutcome {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationOutcome::Created => "created",
            NotificationOutcome::Refreshed => "refreshed",
            NotificationOutcome::Removed => "removed",
            NotificationOutcome::Ignored => "ignored",
        }
    }
}

/// Mirror of the config server's object graph.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use svcmon_cache::testing::{InMemoryConfigServer, RecordBuilder};
/// use svcmon_cache::{ConfigManager, NotificationOutcome};
/// use svcmon_core::{EntityKind, ObjectId};
///
/// let server = Arc::new(InMemoryConfigServer::new());
/// server.put(EntityKind::Project, "p1", RecordBuilder::for_kind(EntityKind::Project, "admin"));
///
/// let manager = ConfigManager::builder().reader(server).build().unwrap();
/// let outcome = manager.on_create(EntityKind::Project, &ObjectId::new("p1")).unwrap();
///
/// assert_eq!(outcome, NotificationOutcome::Created);
/// assert!(manager.projects().contains(&ObjectId::new("p1")));
/// ```
pub struct ConfigManager {
    config: ManagerConfig,
    reader: Arc<dyn ConfigReader>,
    agent: Arc<dyn ServiceAgent>,
    metrics: ManagerMetrics,
    dispatch: Mutex<()>,
    pools: EntityRegistry<LoadBalancerPool>,
    members: EntityRegistry<LoadBalancerMember>,
    virtual_ips: EntityRegistry<VirtualIp>,
    health_monitors: EntityRegistry<HealthMonitor>,
    virtual_networks: EntityRegistry<VirtualNetwork>,
    virtual_machine_interfaces: EntityRegistry<VirtualMachineInterface>,
    service_instances: EntityRegistry<ServiceInstance>,
    service_templates: EntityRegistry<ServiceTemplate>,
    instance_ips: EntityRegistry<InstanceIp>,
    logical_interfaces: EntityRegistry<LogicalInterface>,
    physical_interfaces: EntityRegistry<PhysicalInterface>,
    physical_routers: EntityRegistry<PhysicalRouter>,
    projects: EntityRegistry<Project>,
}

impl ConfigManager {
    /// Create a builder.
    pub fn builder() -> ConfigManagerBuilder {
        ConfigManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ManagerConfig,
        reader: Arc<dyn ConfigReader>,
        agent: Arc<dyn ServiceAgent>,
        metrics: ManagerMetrics,
    ) -> Self {
        let capacity = config.registry_capacity;
        Self {
            reader,
            agent,
            metrics,
            dispatch: Mutex::new(()),
            pools: EntityRegistry::with_capacity(capacity),
            members: EntityRegistry::with_capacity(capacity),
            virtual_ips: EntityRegistry::with_capacity(capacity),
            health_monitors: EntityRegistry::with_capacity(capacity),
            virtual_networks: EntityRegistry::with_capacity(capacity),
            virtual_machine_interfaces: EntityRegistry::with_capacity(capacity),
            service_instances: EntityRegistry::with_capacity(capacity),
            service_templates: EntityRegistry::with_capacity(capacity),
            instance_ips: EntityRegistry::with_capacity(capacity),
            logical_interfaces: EntityRegistry::with_capacity(capacity),
            physical_interfaces: EntityRegistry::with_capacity(capacity),
            physical_routers: EntityRegistry::with_capacity(capacity),
            projects: EntityRegistry::with_capacity(capacity),
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Get the metrics.
    pub fn metrics(&self) -> &ManagerMetrics {
        &self.metrics
    }

    pub(crate) fn reader(&self) -> &dyn ConfigReader {
        self.reader.as_ref()
    }

    /// Load balancer pools.
    pub fn pools(&self) -> &EntityRegistry<LoadBalancerPool> {
        &self.pools
    }

    /// Load balancer members.
    pub fn members(&self) -> &EntityRegistry<LoadBalancerMember> {
        &self.members
    }

    /// Virtual IPs.
    pub fn virtual_ips(&self) -> &EntityRegistry<VirtualIp> {
        &self.virtual_ips
    }

    /// Health monitors.
    pub fn health_monitors(&self) -> &EntityRegistry<HealthMonitor> {
        &self.health_monitors
    }

    /// Virtual networks.
    pub fn virtual_networks(&self) -> &EntityRegistry<VirtualNetwork> {
        &self.virtual_networks
    }

    /// Virtual machine interfaces.
    pub fn virtual_machine_interfaces(&self) -> &EntityRegistry<VirtualMachineInterface> {
        &self.virtual_machine_interfaces
    }

    /// Service instances.
    pub fn service_instances(&self) -> &EntityRegistry<ServiceInstance> {
        &self.service_instances
    }

    /// Service templates.
    pub fn service_templates(&self) -> &EntityRegistry<ServiceTemplate> {
        &self.service_templates
    }

    /// Instance IPs.
    pub fn instance_ips(&self) -> &EntityRegistry<InstanceIp> {
        &self.instance_ips
    }

    /// Logical interfaces.
    pub fn logical_interfaces(&self) -> &EntityRegistry<LogicalInterface> {
        &self.logical_interfaces
    }

    /// Physical interfaces.
    pub fn physical_interfaces(&self) -> &EntityRegistry<PhysicalInterface> {
        &self.physical_interfaces
    }

    /// Physical routers.
    pub fn physical_routers(&self) -> &EntityRegistry<PhysicalRouter> {
        &self.physical_routers
    }

    /// Projects.
    pub fn projects(&self) -> &EntityRegistry<Project> {
        &self.projects
    }

    pub(crate) fn registry_for(&self, kind: EntityKind) -> &dyn KindRegistry {
        match kind {
            EntityKind::LoadBalancerPool => &self.pools,
            EntityKind::LoadBalancerMember => &self.members,
            EntityKind::VirtualIp => &self.virtual_ips,
            EntityKind::HealthMonitor => &self.health_monitors,
            EntityKind::VirtualNetwork => &self.virtual_networks,
            EntityKind::VirtualMachineInterface => &self.virtual_machine_interfaces,
            EntityKind::ServiceInstance => &self.service_instances,
            EntityKind::ServiceTemplate => &self.service_templates,
            EntityKind::InstanceIp => &self.instance_ips,
            EntityKind::LogicalInterface => &self.logical_interfaces,
            EntityKind::PhysicalInterface => &self.physical_interfaces,
            EntityKind::PhysicalRouter => &self.physical_routers,
            EntityKind::Project => &self.projects,
        }
    }

    /// Every mirrored kind.
    pub fn kinds(&self) -> &'static [EntityKind] {
        &EntityKind::ALL
    }

    /// Statistics of the registry for `kind`.
    pub fn stats(&self, kind: EntityKind) -> &RegistryStats {
        self.registry_for(kind).stats()
    }

    /// Number of live entities of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.registry_for(kind).len()
    }

    /// Number of live entities across all kinds.
    pub fn entity_count(&self) -> usize {
        EntityKind::ALL
            .iter()
            .map(|kind| self.registry_for(*kind).len())
            .sum()
    }

    /// Handle a create notification.
    pub fn on_create(&self, kind: EntityKind, uuid: &ObjectId) -> Result<NotificationOutcome> {
        self.handle(&Notification::new(Operation::Create, kind, uuid.clone()))
    }

    /// Handle an update notification.
    pub fn on_update(&self, kind: EntityKind, uuid: &ObjectId) -> Result<NotificationOutcome> {
        self.handle(&Notification::new(Operation::Update, kind, uuid.clone()))
    }

    /// Handle a delete notification.
    pub fn on_delete(&self, kind: EntityKind, uuid: &ObjectId) -> Result<NotificationOutcome> {
        self.handle(&Notification::new(Operation::Delete, kind, uuid.clone()))
    }

    /// Handle a notification given as wire strings.
    ///
    /// # Errors
    ///
    /// Fails without touching any registry when the operation or type name is
    /// not recognized.
    pub fn handle_raw(
        &self,
        operation: &str,
        type_name: &str,
        uuid: impl Into<ObjectId>,
    ) -> Result<NotificationOutcome> {
        let notification = Notification::parse(operation, type_name, uuid).map_err(|error| {
            warn!(operation, type_name, %error, "rejected notification");
            error
        })?;
        self.handle(&notification)
    }

    /// Handle a notification.
    ///
    /// Create and update both read the object and construct or refresh it; a
    /// read that finds the object gone tears it down instead.
    ///
    /// # Errors
    ///
    /// Read, parse, and agent failures are returned to the caller. Read and
    /// parse failures leave the registries untouched.
    pub fn handle(&self, notification: &Notification) -> Result<NotificationOutcome> {
        let _guard = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        let Notification {
            operation,
            kind,
            uuid,
        } = notification;

        trace!(operation = %operation, kind = %kind, uuid = %uuid, "dispatching notification");

        let registry = self.registry_for(*kind);
        let result = match operation {
            Operation::Create | Operation::Update => registry.upsert(self, uuid),
            Operation::Delete => registry.remove(self, uuid),
        };

        match &result {
            Ok(outcome) => {
                self.metrics.record_notification(
                    operation.as_str(),
                    *kind,
                    outcome.as_str(),
                    start.elapsed(),
                );
                debug!(
                    operation = %operation,
                    kind = %kind,
                    uuid = %uuid,
                    outcome = outcome.as_str(),
                    "handled notification"
                );
            }
            Err(error) => {
                self.metrics.record_failure(operation.as_str(), *kind);
                warn!(
                    operation = %operation,
                    kind = %kind,
                    uuid = %uuid,
                    retryable = error.is_retryable(),
                    %error,
                    "notification failed"
                );
            }
        }
        self.metrics.set_entity_count(*kind, registry.len());

        result
    }

    /// Apply the link changes of `uuid` to its peers' back-reference sets.
    ///
    /// Peers' forward slots are never written here; they follow the peers'
    /// own records.
    pub(crate) fn apply_link_deltas(&self, kind: EntityKind, uuid: &ObjectId, deltas: &[LinkDelta]) {
        for delta in deltas {
            let peers = self.registry_for(delta.peer);
            for target in &delta.removed {
                if peers.remove_back_ref(target, kind, uuid) == BackLink::Undeclared {
                    warn!(kind = %kind, peer = %delta.peer, "peer keeps no back-reference set");
                }
            }
            for target in &delta.added {
                match peers.add_back_ref(target, kind, uuid) {
                    BackLink::Linked => {
                        trace!(kind = %kind, uuid = %uuid, peer = %delta.peer, target = %target, "linked");
                    }
                    BackLink::Unresolved => {
                        debug!(
                            kind = %kind,
                            uuid = %uuid,
                            peer = %delta.peer,
                            target = %target,
                            "back-link deferred, target not registered"
                        );
                    }
                    BackLink::Undeclared => {
                        warn!(kind = %kind, peer = %delta.peer, "peer keeps no back-reference set");
                    }
                }
            }
        }
    }

    /// Unlink the torn-down `uuid` from every peer it was linked to.
    ///
    /// Peers drop it from their back-reference sets and clear any forward
    /// reference that still names it.
    pub(crate) fn detach_links(
        &self,
        kind: EntityKind,
        uuid: &ObjectId,
        linked: &[(EntityKind, ObjectId)],
    ) {
        for (peer_kind, peer) in linked {
            match self.registry_for(*peer_kind).forget(peer, kind, uuid) {
                BackLink::Linked => {
                    trace!(kind = %kind, uuid = %uuid, peer_kind = %peer_kind, peer = %peer, "unlinked");
                }
                BackLink::Unresolved => {}
                BackLink::Undeclared => {
                    warn!(kind = %kind, peer_kind = %peer_kind, "peer keeps no link to this kind");
                }
            }
        }
    }

    pub(crate) fn join_container(
        &self,
        parent_kind: EntityKind,
        parent: &ObjectId,
        child_kind: EntityKind,
        child: &ObjectId,
    ) {
        match self.registry_for(parent_kind).add_child(parent, child_kind, child) {
            BackLink::Linked => {
                trace!(parent_kind = %parent_kind, parent = %parent, child = %child, "joined parent");
            }
            BackLink::Unresolved => {
                debug!(
                    parent_kind = %parent_kind,
                    parent = %parent,
                    child_kind = %child_kind,
                    child = %child,
                    "parent not registered, containment deferred"
                );
            }
            BackLink::Undeclared => {
                warn!(parent_kind = %parent_kind, child_kind = %child_kind, "parent holds no such children");
            }
        }
    }

    pub(crate) fn leave_container(
        &self,
        parent_kind: EntityKind,
        parent: &ObjectId,
        child_kind: EntityKind,
        child: &ObjectId,
    ) {
        if self.registry_for(parent_kind).remove_child(parent, child_kind, child) == BackLink::Linked {
            trace!(parent_kind = %parent_kind, parent = %parent, child = %child, "left parent");
        }
    }

    /// Provision `uuid` through the service agent.
    ///
    /// Unregistered uuids are skipped. Under [`ProvisionPolicy::OnChange`]
    /// the call is skipped when the snapshot matches the last one provisioned.
    pub(crate) fn provision<E>(&self, uuid: &ObjectId) -> Result<()>
    where
        E: ConfigEntity + Provisionable,
    {
        let registry = E::registry(self);
        let Some((snapshot, unchanged)) = registry.with(uuid, |entity| {
            let snapshot = entity.snapshot();
            let unchanged = entity
                .last_provisioned()
                .is_some_and(|last| last.snapshot == snapshot);
            (snapshot, unchanged)
        }) else {
            trace!(kind = %E::KIND, uuid = %uuid, "skipping provision of unknown uuid");
            return Ok(());
        };

        if unchanged && self.config.provision_policy == ProvisionPolicy::OnChange {
            self.metrics.record_provision_skipped(E::KIND);
            trace!(kind = %E::KIND, uuid = %uuid, "snapshot unchanged, add skipped");
            return Ok(());
        }

        self.metrics.record_provision_call("add", E::KIND);
        let handle = match self.agent.add(&snapshot) {
            Ok(handle) => handle,
            Err(error) => {
                warn!(kind = %E::KIND, uuid = %uuid, %error, "service agent add failed");
                return Err(error);
            }
        };
        debug!(kind = %E::KIND, uuid = %uuid, handle = %handle, "provisioned");

        registry.update(uuid, |entity| {
            entity.set_last_provisioned(Provisioned { handle, snapshot });
        });
        Ok(())
    }

    /// Deprovision `entity` through the service agent.
    pub(crate) fn deprovision<E>(&self, entity: &E) -> Result<()>
    where
        E: ConfigEntity + Provisionable,
    {
        let snapshot = entity.snapshot();
        let last = entity.last_provisioned().map(|provisioned| &provisioned.handle);

        self.metrics.record_provision_call("delete", E::KIND);
        let result = self.agent.delete(&snapshot, last);
        match &result {
            Ok(()) => debug!(kind = %E::KIND, uuid = %entity.uuid(), "deprovisioned"),
            Err(error) => {
                warn!(kind = %E::KIND, uuid = %entity.uuid(), %error, "service agent delete failed");
            }
        }
        result
    }

    /// Re-derive missing back-links and containment memberships.
    ///
    /// Scans every registry for links and parents declared by entities whose
    /// target was not registered at the time, and writes the missing side.
    pub fn reconcile_links(&self) -> RepairReport {
        let _guard = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = RepairReport::default();

        for kind in EntityKind::ALL {
            let registry = self.registry_for(kind);
            for uuid in registry.ids() {
                report.merge(registry.adopt(self, &uuid));
            }
        }

        debug!(
            back_links_added = report.back_links_added,
            containment_added = report.containment_added,
            "reconciled links"
        );
        report
    }

    /// List forward links missing from the peer's back-reference set, and
    /// children missing from their parent's containment set.
    ///
    /// Links to unregistered peers are not violations; they are deferred.
    pub fn check_consistency(&self) -> Vec<LinkViolation> {
        let _guard = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let mut violations = Vec::new();

        for kind in EntityKind::ALL {
            let registry = self.registry_for(kind);

            for (owner, peer_kind, peer) in registry.forward_links() {
                if self.registry_for(peer_kind).has_link(&peer, kind, &owner) == Some(false) {
                    violations.push(LinkViolation {
                        owner_kind: kind,
                        owner,
                        peer_kind,
                        peer,
                        relation: Relation::Reference,
                    });
                }
            }

            for (child, parent_kind, parent) in registry.containers() {
                if self.registry_for(parent_kind).has_child(&parent, kind, &child) == Some(false) {
                    violations.push(LinkViolation {
                        owner_kind: kind,
                        owner: child,
                        peer_kind: parent_kind,
                        peer: parent,
                        relation: Relation::Containment,
                    });
                }
            }
        }

        violations
    }
}

impl fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigManager")
            .field("config", &self.config)
            .field("entities", &self.entity_count())
            .finish_non_exhaustive()
    }
}
