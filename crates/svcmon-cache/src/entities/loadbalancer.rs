//! Load balancer kinds: the four kinds the service agent provisions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use svcmon_core::{EntityKind, ObjectId, ObjectRecord, Result};

use crate::agent::{
    HealthMonitorSnapshot, MemberSnapshot, PoolSnapshot, ProvisionSnapshot, Provisionable,
    Provisioned, VirtualIpSnapshot,
};
use crate::entity::{entity_accessors, ConfigEntity, EntityMeta};
use crate::links::LinkTable;
use crate::manager::ConfigManager;

/// Attributes of a load balancer pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolProperties {
    /// Balanced protocol (`HTTP`, `TCP`, ...).
    pub protocol: String,
    /// Balancing algorithm (`ROUND_ROBIN`, ...).
    pub loadbalancer_method: String,
    /// Subnet the members live on.
    pub subnet_id: Option<String>,
    /// Administrative state.
    pub admin_state: bool,
    /// Operational status reported by the driver.
    pub status: Option<String>,
}

/// Attributes of a pool member.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberProperties {
    /// Backend address.
    pub address: String,
    /// Backend port.
    pub protocol_port: u16,
    /// Relative weight.
    pub weight: u32,
    /// Administrative state.
    pub admin_state: bool,
    /// Operational status reported by the driver.
    pub status: Option<String>,
}

/// Attributes of a virtual IP.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualIpProperties {
    /// Frontend address.
    pub address: String,
    /// Frontend protocol.
    pub protocol: String,
    /// Frontend port.
    pub protocol_port: u16,
    /// Maximum concurrent connections; negative means unlimited.
    pub connection_limit: i64,
    /// Subnet the address is allocated from.
    pub subnet_id: Option<String>,
    /// Session persistence type.
    pub persistence_type: Option<String>,
    /// Cookie name for cookie persistence.
    pub persistence_cookie_name: Option<String>,
    /// Administrative state.
    pub admin_state: bool,
    /// Operational status reported by the driver.
    pub status: Option<String>,
}

/// Attributes of a health monitor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthMonitorProperties {
    /// Probe type (`PING`, `TCP`, `HTTP`, `HTTPS`).
    pub monitor_type: String,
    /// Seconds between probes.
    pub delay: u32,
    /// Seconds before a probe times out.
    pub timeout: u32,
    /// Failed probes before a member is marked down.
    pub max_retries: u32,
    /// HTTP method for HTTP probes.
    pub http_method: Option<String>,
    /// Path for HTTP probes.
    pub url_path: Option<String>,
    /// Accepted status codes for HTTP probes.
    pub expected_codes: Option<String>,
    /// Administrative state.
    pub admin_state: bool,
}

/// A load balancer pool.
///
/// Owns its members as a containment set, re-derived from the embedded
/// `loadbalancer_members` list on every refresh and joined by members as
/// they are refreshed.
#[derive(Clone, Debug)]
pub struct LoadBalancerPool {
    meta: EntityMeta,
    links: LinkTable,
    properties: PoolProperties,
    provider: String,
    members: BTreeSet<ObjectId>,
    last_provisioned: Option<Provisioned>,
}

/// State staged from a pool record.
#[derive(Debug)]
pub struct PoolStaged {
    properties: PoolProperties,
    provider: String,
    members: BTreeSet<ObjectId>,
}

impl LoadBalancerPool {
    /// Pool attributes.
    pub fn properties(&self) -> &PoolProperties {
        &self.properties
    }

    /// Driver that realizes the pool.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Owning project.
    pub fn project(&self) -> Option<&ObjectId> {
        self.meta.parent_uuid.as_ref()
    }

    /// Member uuids.
    pub fn members(&self) -> &BTreeSet<ObjectId> {
        &self.members
    }

    /// Fronting virtual IP.
    pub fn virtual_ip(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::VirtualIp)
    }

    /// Every virtual IP linked to the pool, including all that reference it.
    pub fn virtual_ips(&self) -> BTreeSet<ObjectId> {
        self.links.linked(EntityKind::VirtualIp)
    }

    /// Service instance realizing the pool.
    pub fn service_instance(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::ServiceInstance)
    }

    /// Port the pool is attached to.
    pub fn virtual_machine_interface(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::VirtualMachineInterface)
    }

    /// Attached health monitors.
    pub fn health_monitors(&self) -> BTreeSet<ObjectId> {
        self.links.linked(EntityKind::HealthMonitor)
    }
}

impl ConfigEntity for LoadBalancerPool {
    const KIND: EntityKind = EntityKind::LoadBalancerPool;
    type Staged = PoolStaged;

    entity_accessors!(pools);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
            properties: PoolProperties::default(),
            provider: String::new(),
            members: BTreeSet::new(),
            last_provisioned: None,
        }
    }

    fn stage(record: &ObjectRecord<'_>) -> Result<PoolStaged> {
        Ok(PoolStaged {
            properties: record.field("loadbalancer_pool_properties")?,
            provider: record.field("loadbalancer_pool_provider")?,
            members: record.children(EntityKind::LoadBalancerMember),
        })
    }

    fn apply(&mut self, meta: EntityMeta, staged: PoolStaged) {
        self.meta = meta;
        self.properties = staged.properties;
        self.provider = staged.provider;
        self.members = staged.members;
    }

    fn children(&self, child: EntityKind) -> Option<&BTreeSet<ObjectId>> {
        (child == EntityKind::LoadBalancerMember).then_some(&self.members)
    }

    fn children_mut(&mut self, child: EntityKind) -> Option<&mut BTreeSet<ObjectId>> {
        (child == EntityKind::LoadBalancerMember).then_some(&mut self.members)
    }

    fn after_refresh(&self, manager: &ConfigManager) -> Result<()> {
        manager.provision::<Self>(self.uuid())?;
        for member in &self.members {
            manager.provision::<LoadBalancerMember>(member)?;
        }
        if let Some(vip) = self.virtual_ip() {
            manager.provision::<VirtualIp>(vip)?;
        }
        Ok(())
    }

    fn before_tear_down(&self, manager: &ConfigManager) -> Result<()> {
        manager.deprovision(self)
    }
}

impl Provisionable for LoadBalancerPool {
    fn snapshot(&self) -> ProvisionSnapshot {
        ProvisionSnapshot::Pool(PoolSnapshot {
            uuid: self.meta.uuid.clone(),
            name: self.meta.effective_name().to_string(),
            project: self.project().cloned(),
            provider: self.provider.clone(),
            properties: self.properties.clone(),
            members: self.members.clone(),
            virtual_ip: self.virtual_ip().cloned(),
            health_monitors: self.health_monitors(),
            service_instance: self.service_instance().cloned(),
        })
    }

    fn last_provisioned(&self) -> Option<&Provisioned> {
        self.last_provisioned.as_ref()
    }

    fn set_last_provisioned(&mut self, provisioned: Provisioned) {
        self.last_provisioned = Some(provisioned);
    }
}

/// A member of a load balancer pool.
///
/// The owning pool is the member's parent; the member joins the pool's
/// containment set on refresh and leaves it on tear-down.
#[derive(Clone, Debug)]
pub struct LoadBalancerMember {
    meta: EntityMeta,
    links: LinkTable,
    properties: MemberProperties,
    last_provisioned: Option<Provisioned>,
}

impl LoadBalancerMember {
    /// Member attributes.
    pub fn properties(&self) -> &MemberProperties {
        &self.properties
    }

    /// Owning pool.
    pub fn pool(&self) -> Option<&ObjectId> {
        self.meta.parent_uuid.as_ref()
    }
}

impl ConfigEntity for LoadBalancerMember {
    const KIND: EntityKind = EntityKind::LoadBalancerMember;
    type Staged = MemberProperties;

    entity_accessors!(members);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
            properties: MemberProperties::default(),
            last_provisioned: None,
        }
    }

    fn stage(record: &ObjectRecord<'_>) -> Result<MemberProperties> {
        record.require_parent()?;
        record.field("loadbalancer_member_properties")
    }

    fn apply(&mut self, meta: EntityMeta, staged: MemberProperties) {
        self.meta = meta;
        self.properties = staged;
    }

    fn container(&self) -> Option<(EntityKind, ObjectId)> {
        self.pool()
            .map(|pool| (EntityKind::LoadBalancerPool, pool.clone()))
    }

    fn after_refresh(&self, manager: &ConfigManager) -> Result<()> {
        manager.provision::<Self>(self.uuid())
    }

    fn before_tear_down(&self, manager: &ConfigManager) -> Result<()> {
        manager.deprovision(self)
    }
}

impl Provisionable for LoadBalancerMember {
    fn snapshot(&self) -> ProvisionSnapshot {
        ProvisionSnapshot::Member(MemberSnapshot {
            uuid: self.meta.uuid.clone(),
            name: self.meta.effective_name().to_string(),
            pool: self.pool().cloned(),
            properties: self.properties.clone(),
        })
    }

    fn last_provisioned(&self) -> Option<&Provisioned> {
        self.last_provisioned.as_ref()
    }

    fn set_last_provisioned(&mut self, provisioned: Provisioned) {
        self.last_provisioned = Some(provisioned);
    }
}

/// A virtual IP fronting a pool.
#[derive(Clone, Debug)]
pub struct VirtualIp {
    meta: EntityMeta,
    links: LinkTable,
    properties: VirtualIpProperties,
    last_provisioned: Option<Provisioned>,
}

impl VirtualIp {
    /// Virtual IP attributes.
    pub fn properties(&self) -> &VirtualIpProperties {
        &self.properties
    }

    /// Owning project.
    pub fn project(&self) -> Option<&ObjectId> {
        self.meta.parent_uuid.as_ref()
    }

    /// Pool behind the address.
    pub fn pool(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::LoadBalancerPool)
    }

    /// Port carrying the address.
    pub fn virtual_machine_interface(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::VirtualMachineInterface)
    }
}

impl ConfigEntity for VirtualIp {
    const KIND: EntityKind = EntityKind::VirtualIp;
    type Staged = VirtualIpProperties;

    entity_accessors!(virtual_ips);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
            properties: VirtualIpProperties::default(),
            last_provisioned: None,
        }
    }

    fn stage(record: &ObjectRecord<'_>) -> Result<VirtualIpProperties> {
        record.field("virtual_ip_properties")
    }

    fn apply(&mut self, meta: EntityMeta, staged: VirtualIpProperties) {
        self.meta = meta;
        self.properties = staged;
    }

    fn after_refresh(&self, manager: &ConfigManager) -> Result<()> {
        manager.provision::<Self>(self.uuid())
    }

    fn before_tear_down(&self, manager: &ConfigManager) -> Result<()> {
        manager.deprovision(self)
    }
}

impl Provisionable for VirtualIp {
    fn snapshot(&self) -> ProvisionSnapshot {
        ProvisionSnapshot::VirtualIp(VirtualIpSnapshot {
            uuid: self.meta.uuid.clone(),
            name: self.meta.effective_name().to_string(),
            project: self.project().cloned(),
            properties: self.properties.clone(),
            pool: self.pool().cloned(),
            virtual_machine_interface: self.virtual_machine_interface().cloned(),
        })
    }

    fn last_provisioned(&self) -> Option<&Provisioned> {
        self.last_provisioned.as_ref()
    }

    fn set_last_provisioned(&mut self, provisioned: Provisioned) {
        self.last_provisioned = Some(provisioned);
    }
}

/// A health monitor attached to any number of pools.
///
/// Provisioned on every refresh; tear-down only unwinds its pool links.
#[derive(Clone, Debug)]
pub struct HealthMonitor {
    meta: EntityMeta,
    links: LinkTable,
    properties: HealthMonitorProperties,
    last_provisioned: Option<Provisioned>,
}

impl HealthMonitor {
    /// Monitor attributes.
    pub fn properties(&self) -> &HealthMonitorProperties {
        &self.properties
    }

    /// Owning project.
    pub fn project(&self) -> Option<&ObjectId> {
        self.meta.parent_uuid.as_ref()
    }

    /// Pools the monitor is attached to.
    pub fn pools(&self) -> BTreeSet<ObjectId> {
        self.links.linked(EntityKind::LoadBalancerPool)
    }
}

impl ConfigEntity for HealthMonitor {
    const KIND: EntityKind = EntityKind::HealthMonitor;
    type Staged = HealthMonitorProperties;

    entity_accessors!(health_monitors);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
            properties: HealthMonitorProperties::default(),
            last_provisioned: None,
        }
    }

    fn stage(record: &ObjectRecord<'_>) -> Result<HealthMonitorProperties> {
        record.field("loadbalancer_healthmonitor_properties")
    }

    fn apply(&mut self, meta: EntityMeta, staged: HealthMonitorProperties) {
        self.meta = meta;
        self.properties = staged;
    }

    fn after_refresh(&self, manager: &ConfigManager) -> Result<()> {
        manager.provision::<Self>(self.uuid())
    }
}

impl Provisionable for HealthMonitor {
    fn snapshot(&self) -> ProvisionSnapshot {
        ProvisionSnapshot::HealthMonitor(HealthMonitorSnapshot {
            uuid: self.meta.uuid.clone(),
            name: self.meta.effective_name().to_string(),
            project: self.project().cloned(),
            properties: self.properties.clone(),
            pools: self.pools(),
        })
    }

    fn last_provisioned(&self) -> Option<&Provisioned> {
        self.last_provisioned.as_ref()
    }

    fn set_last_provisioned(&mut self, provisioned: Provisioned) {
        self.last_provisioned = Some(provisioned);
    }
}
