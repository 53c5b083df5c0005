//! Integration with the downstream service agent.
//!
//! The [`ServiceAgent`] realizes load-balancer entities as running services.
//! It receives a [`ProvisionSnapshot`]: a resolved, self-contained view of
//! one entity, never a reference into the registries.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use svcmon_core::{EntityKind, ObjectId, Result};

use crate::entities::{
    HealthMonitorProperties, MemberProperties, PoolProperties, VirtualIpProperties,
};

/// Opaque result of a successful [`ServiceAgent::add`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ProvisionHandle(String);

impl ProvisionHandle {
    /// Wrap an agent-specific token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProvisionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Load balancer pool as handed to the agent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PoolSnapshot {
    /// Pool uuid.
    pub uuid: ObjectId,
    /// Effective name.
    pub name: String,
    /// Owning project.
    pub project: Option<ObjectId>,
    /// Driver that realizes the pool.
    pub provider: String,
    /// Pool attributes.
    pub properties: PoolProperties,
    /// Known members.
    pub members: BTreeSet<ObjectId>,
    /// Fronting virtual IP.
    pub virtual_ip: Option<ObjectId>,
    /// Attached health monitors.
    pub health_monitors: BTreeSet<ObjectId>,
    /// Service instance realizing the pool.
    pub service_instance: Option<ObjectId>,
}

/// Pool member as handed to the agent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemberSnapshot {
    /// Member uuid.
    pub uuid: ObjectId,
    /// Effective name.
    pub name: String,
    /// Owning pool.
    pub pool: Option<ObjectId>,
    /// Member attributes.
    pub properties: MemberProperties,
}

/// Virtual IP as handed to the agent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VirtualIpSnapshot {
    /// Virtual IP uuid.
    pub uuid: ObjectId,
    /// Effective name.
    pub name: String,
    /// Owning project.
    pub project: Option<ObjectId>,
    /// Virtual IP attributes.
    pub properties: VirtualIpProperties,
    /// Pool behind the virtual IP.
    pub pool: Option<ObjectId>,
    /// Port carrying the address.
    pub virtual_machine_interface: Option<ObjectId>,
}

/// Health monitor as handed to the agent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthMonitorSnapshot {
    /// Health monitor uuid.
    pub uuid: ObjectId,
    /// Effective name.
    pub name: String,
    /// Owning project.
    pub project: Option<ObjectId>,
    /// Monitor attributes.
    pub properties: HealthMonitorProperties,
    /// Pools the monitor is attached to.
    pub pools: BTreeSet<ObjectId>,
}

/// Resolved view of one provisioned entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProvisionSnapshot {
    /// A load balancer pool.
    Pool(PoolSnapshot),
    /// A pool member.
    Member(MemberSnapshot),
    /// A virtual IP.
    VirtualIp(VirtualIpSnapshot),
    /// A health monitor.
    HealthMonitor(HealthMonitorSnapshot),
}

impl ProvisionSnapshot {
    /// Kind of the snapshotted entity.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Pool(_) => EntityKind::LoadBalancerPool,
            Self::Member(_) => EntityKind::LoadBalancerMember,
            Self::VirtualIp(_) => EntityKind::VirtualIp,
            Self::HealthMonitor(_) => EntityKind::HealthMonitor,
        }
    }

    /// Uuid of the snapshotted entity.
    #[must_use]
    pub fn uuid(&self) -> &ObjectId {
        match self {
            Self::Pool(s) => &s.uuid,
            Self::Member(s) => &s.uuid,
            Self::VirtualIp(s) => &s.uuid,
            Self::HealthMonitor(s) => &s.uuid,
        }
    }
}

/// Handle plus the snapshot it was produced from.
#[derive(Clone, Debug, PartialEq)]
pub struct Provisioned {
    /// Handle returned by the agent.
    pub handle: ProvisionHandle,
    /// Snapshot that was provisioned.
    pub snapshot: ProvisionSnapshot,
}

/// When to call [`ServiceAgent::add`] for an entity that was provisioned
/// before.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProvisionPolicy {
    /// Skip the call when the snapshot equals the last provisioned one.
    #[default]
    OnChange,
    /// Call on every trigger and rely on the agent being idempotent.
    Always,
}

/// Downstream agent that realizes entities as running services.
///
/// Only load balancer pools, members, virtual IPs, and health monitors are
/// ever passed to the agent.
pub trait ServiceAgent: Send + Sync {
    /// Provision or update the service object for `snapshot`.
    ///
    /// Must be idempotent for an unchanged snapshot.
    fn add(&self, snapshot: &ProvisionSnapshot) -> Result<ProvisionHandle>;

    /// Deprovision the service object for `snapshot`.
    ///
    /// `last` is the handle from the most recent successful add, if any.
    /// Must succeed when the object was never provisioned.
    fn delete(&self, snapshot: &ProvisionSnapshot, last: Option<&ProvisionHandle>) -> Result<()>;
}

impl<A: ServiceAgent + ?Sized> ServiceAgent for Arc<A> {
    fn add(&self, snapshot: &ProvisionSnapshot) -> Result<ProvisionHandle> {
        (**self).add(snapshot)
    }

    fn delete(&self, snapshot: &ProvisionSnapshot, last: Option<&ProvisionHandle>) -> Result<()> {
        (**self).delete(snapshot, last)
    }
}

/// Agent that provisions nothing.
///
/// Used when the manager only mirrors the graph.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAgent;

impl ServiceAgent for NoopAgent {
    fn add(&self, snapshot: &ProvisionSnapshot) -> Result<ProvisionHandle> {
        Ok(ProvisionHandle::new(format!("noop:{}", snapshot.uuid())))
    }

    fn delete(&self, _snapshot: &ProvisionSnapshot, _last: Option<&ProvisionHandle>) -> Result<()> {
        Ok(())
    }
}

/// An entity kind the service agent realizes.
pub trait Provisionable {
    /// Resolved view handed to the agent.
    fn snapshot(&self) -> ProvisionSnapshot;

    /// Result of the last successful add.
    fn last_provisioned(&self) -> Option<&Provisioned>;

    /// Record the result of an add.
    fn set_last_provisioned(&mut self, provisioned: Provisioned);
}
