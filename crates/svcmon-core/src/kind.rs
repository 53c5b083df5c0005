//! Entity kinds and their declared link schema.
//!
//! Every mirrored object belongs to one [`EntityKind`]. A kind declares which
//! peer kinds it may link to ([`LinkSpec`]) and whether each link holds one
//! target or a set of targets ([`Cardinality`]). Links to kinds outside this
//! schema are never recorded.

use std::fmt;
use std::str::FromStr;

use crate::SvcMonError;

/// Whether a link slot holds at most one target or a set of targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one target uuid.
    Single,
    /// Any number of target uuids.
    Multiple,
}

/// One declared link slot of a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LinkSpec {
    /// Kind of the entities on the other end of the link.
    pub peer: EntityKind,
    /// Shape of the slot.
    pub cardinality: Cardinality,
}

impl LinkSpec {
    const fn single(peer: EntityKind) -> Self {
        Self {
            peer,
            cardinality: Cardinality::Single,
        }
    }

    const fn multiple(peer: EntityKind) -> Self {
        Self {
            peer,
            cardinality: Cardinality::Multiple,
        }
    }
}

/// The kinds of config objects mirrored by the cache.
///
/// The wire name (`loadbalancer_pool`) is what the config server uses in
/// notifications and in `<kind>_refs` field names; the type name
/// (`loadbalancer-pool`) is what appears in `parent_type` tags.
///
/// # Example
///
/// ```rust
/// use svcmon_core::{Cardinality, EntityKind};
///
/// let kind = EntityKind::HealthMonitor;
/// assert_eq!(kind.as_str(), "loadbalancer_healthmonitor");
/// assert_eq!(
///     kind.cardinality_of(EntityKind::LoadBalancerPool),
///     Some(Cardinality::Multiple)
/// );
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// Load balancer pool.
    LoadBalancerPool,
    /// Member of a load balancer pool.
    LoadBalancerMember,
    /// Virtual IP fronting a pool.
    VirtualIp,
    /// Health monitor attached to pools.
    HealthMonitor,
    /// Virtual network.
    VirtualNetwork,
    /// Virtual machine interface (port).
    VirtualMachineInterface,
    /// Service instance.
    ServiceInstance,
    /// Service template.
    ServiceTemplate,
    /// Instance IP address.
    InstanceIp,
    /// Logical interface on a physical router or interface.
    LogicalInterface,
    /// Physical interface on a router.
    PhysicalInterface,
    /// Physical router.
    PhysicalRouter,
    /// Project (tenant).
    Project,
}

impl EntityKind {
    /// Every kind, in dispatch order.
    pub const ALL: [EntityKind; 13] = [
        EntityKind::LoadBalancerPool,
        EntityKind::LoadBalancerMember,
        EntityKind::VirtualIp,
        EntityKind::HealthMonitor,
        EntityKind::VirtualNetwork,
        EntityKind::VirtualMachineInterface,
        EntityKind::ServiceInstance,
        EntityKind::ServiceTemplate,
        EntityKind::InstanceIp,
        EntityKind::LogicalInterface,
        EntityKind::PhysicalInterface,
        EntityKind::PhysicalRouter,
        EntityKind::Project,
    ];

    /// Wire name used in notifications and reference field names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::LoadBalancerPool => "loadbalancer_pool",
            EntityKind::LoadBalancerMember => "loadbalancer_member",
            EntityKind::VirtualIp => "virtual_ip",
            EntityKind::HealthMonitor => "loadbalancer_healthmonitor",
            EntityKind::VirtualNetwork => "virtual_network",
            EntityKind::VirtualMachineInterface => "virtual_machine_interface",
            EntityKind::ServiceInstance => "service_instance",
            EntityKind::ServiceTemplate => "service_template",
            EntityKind::InstanceIp => "instance_ip",
            EntityKind::LogicalInterface => "logical_interface",
            EntityKind::PhysicalInterface => "physical_interface",
            EntityKind::PhysicalRouter => "physical_router",
            EntityKind::Project => "project",
        }
    }

    /// Hyphenated type name, as carried by `parent_type` tags.
    #[must_use]
    pub fn type_name(self) -> String {
        self.as_str().replace('_', "-")
    }

    /// Field holding forward references to `self` in a peer's record.
    #[must_use]
    pub fn refs_field(self) -> String {
        format!("{}_refs", self.as_str())
    }

    /// Field holding back references to `self` in a peer's record.
    #[must_use]
    pub fn back_refs_field(self) -> String {
        format!("{}_back_refs", self.as_str())
    }

    /// Field listing embedded children of kind `self` in a parent's record.
    #[must_use]
    pub fn children_field(self) -> String {
        format!("{}s", self.as_str())
    }

    /// Declared link slots, in the order refresh reconciles them.
    #[must_use]
    pub const fn links(self) -> &'static [LinkSpec] {
        match self {
            EntityKind::LoadBalancerPool => POOL_LINKS,
            EntityKind::VirtualIp => VIRTUAL_IP_LINKS,
            EntityKind::HealthMonitor => HEALTH_MONITOR_LINKS,
            EntityKind::VirtualNetwork => VIRTUAL_NETWORK_LINKS,
            EntityKind::VirtualMachineInterface => VMI_LINKS,
            EntityKind::ServiceInstance => SERVICE_INSTANCE_LINKS,
            EntityKind::ServiceTemplate => SERVICE_TEMPLATE_LINKS,
            EntityKind::InstanceIp => INSTANCE_IP_LINKS,
            EntityKind::LogicalInterface => LOGICAL_INTERFACE_LINKS,
            EntityKind::LoadBalancerMember
            | EntityKind::PhysicalInterface
            | EntityKind::PhysicalRouter
            | EntityKind::Project => &[],
        }
    }

    /// Kinds whose uuids this kind embeds as a containment set.
    #[must_use]
    pub const fn children(self) -> &'static [EntityKind] {
        match self {
            EntityKind::LoadBalancerPool => &[EntityKind::LoadBalancerMember],
            EntityKind::PhysicalInterface => &[EntityKind::LogicalInterface],
            EntityKind::PhysicalRouter => {
                &[EntityKind::PhysicalInterface, EntityKind::LogicalInterface]
            }
            _ => &[],
        }
    }

    /// Cardinality of the slot this kind declares for `peer`, if any.
    #[must_use]
    pub fn cardinality_of(self, peer: EntityKind) -> Option<Cardinality> {
        self.links()
            .iter()
            .find(|spec| spec.peer == peer)
            .map(|spec| spec.cardinality)
    }

    /// Kinds whose schema declares a link to this kind.
    ///
    /// These are the kinds that may appear in this kind's back-reference
    /// sets.
    pub fn referrer_kinds(self) -> impl Iterator<Item = EntityKind> {
        Self::ALL
            .into_iter()
            .filter(move |peer| peer.cardinality_of(self).is_some())
    }

    /// Check whether this kind is realized by the service agent.
    #[must_use]
    pub const fn is_provisioned(self) -> bool {
        matches!(
            self,
            EntityKind::LoadBalancerPool
                | EntityKind::LoadBalancerMember
                | EntityKind::VirtualIp
                | EntityKind::HealthMonitor
        )
    }
}

const POOL_LINKS: &[LinkSpec] = &[
    LinkSpec::single(EntityKind::ServiceInstance),
    LinkSpec::single(EntityKind::VirtualIp),
    LinkSpec::single(EntityKind::VirtualMachineInterface),
    LinkSpec::multiple(EntityKind::HealthMonitor),
];

const VIRTUAL_IP_LINKS: &[LinkSpec] = &[
    LinkSpec::single(EntityKind::VirtualMachineInterface),
    LinkSpec::single(EntityKind::LoadBalancerPool),
];

const HEALTH_MONITOR_LINKS: &[LinkSpec] = &[LinkSpec::multiple(EntityKind::LoadBalancerPool)];

const VIRTUAL_NETWORK_LINKS: &[LinkSpec] =
    &[LinkSpec::multiple(EntityKind::VirtualMachineInterface)];

const VMI_LINKS: &[LinkSpec] = &[
    LinkSpec::single(EntityKind::VirtualIp),
    LinkSpec::single(EntityKind::LoadBalancerPool),
    LinkSpec::single(EntityKind::InstanceIp),
    LinkSpec::single(EntityKind::VirtualNetwork),
    LinkSpec::single(EntityKind::LogicalInterface),
];

const SERVICE_INSTANCE_LINKS: &[LinkSpec] = &[
    LinkSpec::single(EntityKind::ServiceTemplate),
    LinkSpec::single(EntityKind::LoadBalancerPool),
];

const SERVICE_TEMPLATE_LINKS: &[LinkSpec] = &[LinkSpec::multiple(EntityKind::ServiceInstance)];

const INSTANCE_IP_LINKS: &[LinkSpec] = &[LinkSpec::single(EntityKind::VirtualMachineInterface)];

const LOGICAL_INTERFACE_LINKS: &[LinkSpec] =
    &[LinkSpec::single(EntityKind::VirtualMachineInterface)];

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = SvcMonError;

    /// Accepts both the wire name and the hyphenated type name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| SvcMonError::UnknownKind {
                type_name: s.to_string(),
            })
    }
}
