//! Physical network kinds: routers, their interfaces, and logical
//! interfaces carved out of either.

use std::collections::BTreeSet;

use svcmon_core::{EntityKind, ObjectId, ObjectRecord, Result};

use crate::entity::{entity_accessors, ConfigEntity, EntityMeta};
use crate::links::LinkTable;

/// Parent of a logical interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogicalInterfaceParent {
    /// Carved directly out of a physical router.
    Router(ObjectId),
    /// Carved out of a physical interface.
    Interface(ObjectId),
}

impl LogicalInterfaceParent {
    /// Parent-type tag that selects the router branch.
    pub const ROUTER_TAG: &'static str = "physical-router";

    fn from_record(record: &ObjectRecord<'_>) -> Result<Self> {
        let parent = record.require_parent()?;
        Ok(match record.parent_type() {
            Some(Self::ROUTER_TAG) => Self::Router(parent),
            _ => Self::Interface(parent),
        })
    }

    /// Kind of the parent.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Router(_) => EntityKind::PhysicalRouter,
            Self::Interface(_) => EntityKind::PhysicalInterface,
        }
    }

    /// Uuid of the parent.
    pub fn uuid(&self) -> &ObjectId {
        match self {
            Self::Router(id) | Self::Interface(id) => id,
        }
    }
}

/// A logical interface.
#[derive(Clone, Debug)]
pub struct LogicalInterface {
    meta: EntityMeta,
    links: LinkTable,
    parent: Option<LogicalInterfaceParent>,
    vlan_tag: u32,
}

impl LogicalInterface {
    /// Router or interface this logical interface belongs to.
    pub fn parent(&self) -> Option<&LogicalInterfaceParent> {
        self.parent.as_ref()
    }

    /// VLAN tag; 0 when untagged.
    pub fn vlan_tag(&self) -> u32 {
        self.vlan_tag
    }

    /// Port bound to the interface.
    pub fn virtual_machine_interface(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::VirtualMachineInterface)
    }
}

impl ConfigEntity for LogicalInterface {
    const KIND: EntityKind = EntityKind::LogicalInterface;
    type Staged = (LogicalInterfaceParent, u32);

    entity_accessors!(logical_interfaces);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
            parent: None,
            vlan_tag: 0,
        }
    }

    fn stage(record: &ObjectRecord<'_>) -> Result<Self::Staged> {
        let parent = LogicalInterfaceParent::from_record(record)?;
        let vlan_tag = record
            .optional_field("logical_interface_vlan_tag")?
            .unwrap_or(0);
        Ok((parent, vlan_tag))
    }

    fn apply(&mut self, meta: EntityMeta, (parent, vlan_tag): Self::Staged) {
        self.meta = meta;
        self.parent = Some(parent);
        self.vlan_tag = vlan_tag;
    }

    fn container(&self) -> Option<(EntityKind, ObjectId)> {
        self.parent
            .as_ref()
            .map(|parent| (parent.kind(), parent.uuid().clone()))
    }
}

/// A physical interface on a router.
#[derive(Clone, Debug)]
pub struct PhysicalInterface {
    meta: EntityMeta,
    links: LinkTable,
    logical_interfaces: BTreeSet<ObjectId>,
}

impl PhysicalInterface {
    /// Owning router.
    pub fn router(&self) -> Option<&ObjectId> {
        self.meta.parent_uuid.as_ref()
    }

    /// Logical interfaces carved out of this interface.
    pub fn logical_interfaces(&self) -> &BTreeSet<ObjectId> {
        &self.logical_interfaces
    }
}

impl ConfigEntity for PhysicalInterface {
    const KIND: EntityKind = EntityKind::PhysicalInterface;
    type Staged = BTreeSet<ObjectId>;

    entity_accessors!(physical_interfaces);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
            logical_interfaces: BTreeSet::new(),
        }
    }

    fn stage(record: &ObjectRecord<'_>) -> Result<Self::Staged> {
        record.require_parent()?;
        Ok(record.children(EntityKind::LogicalInterface))
    }

    fn apply(&mut self, meta: EntityMeta, logical_interfaces: Self::Staged) {
        self.meta = meta;
        self.logical_interfaces = logical_interfaces;
    }

    fn container(&self) -> Option<(EntityKind, ObjectId)> {
        self.router()
            .map(|router| (EntityKind::PhysicalRouter, router.clone()))
    }

    fn children(&self, child: EntityKind) -> Option<&BTreeSet<ObjectId>> {
        (child == EntityKind::LogicalInterface).then_some(&self.logical_interfaces)
    }

    fn children_mut(&mut self, child: EntityKind) -> Option<&mut BTreeSet<ObjectId>> {
        (child == EntityKind::LogicalInterface).then_some(&mut self.logical_interfaces)
    }
}

/// A physical router.
#[derive(Clone, Debug)]
pub struct PhysicalRouter {
    meta: EntityMeta,
    links: LinkTable,
    management_ip: Option<String>,
    vendor: Option<String>,
    physical_interfaces: BTreeSet<ObjectId>,
    logical_interfaces: BTreeSet<ObjectId>,
}

/// State staged from a router record.
#[derive(Debug)]
pub struct RouterStaged {
    management_ip: Option<String>,
    vendor: Option<String>,
    physical_interfaces: BTreeSet<ObjectId>,
    logical_interfaces: BTreeSet<ObjectId>,
}

impl PhysicalRouter {
    /// Management address.
    pub fn management_ip(&self) -> Option<&str> {
        self.management_ip.as_deref()
    }

    /// Vendor name.
    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    /// Physical interfaces on the router.
    pub fn physical_interfaces(&self) -> &BTreeSet<ObjectId> {
        &self.physical_interfaces
    }

    /// Logical interfaces carved directly out of the router.
    pub fn logical_interfaces(&self) -> &BTreeSet<ObjectId> {
        &self.logical_interfaces
    }
}

impl ConfigEntity for PhysicalRouter {
    const KIND: EntityKind = EntityKind::PhysicalRouter;
    type Staged = RouterStaged;

    entity_accessors!(physical_routers);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
            management_ip: None,
            vendor: None,
            physical_interfaces: BTreeSet::new(),
            logical_interfaces: BTreeSet::new(),
        }
    }

    fn stage(record: &ObjectRecord<'_>) -> Result<RouterStaged> {
        Ok(RouterStaged {
            management_ip: record.optional_field("physical_router_management_ip")?,
            vendor: record.optional_field("physical_router_vendor_name")?,
            physical_interfaces: record.children(EntityKind::PhysicalInterface),
            logical_interfaces: record.children(EntityKind::LogicalInterface),
        })
    }

    fn apply(&mut self, meta: EntityMeta, staged: RouterStaged) {
        self.meta = meta;
        self.management_ip = staged.management_ip;
        self.vendor = staged.vendor;
        self.physical_interfaces = staged.physical_interfaces;
        self.logical_interfaces = staged.logical_interfaces;
    }

    fn children(&self, child: EntityKind) -> Option<&BTreeSet<ObjectId>> {
        match child {
            EntityKind::PhysicalInterface => Some(&self.physical_interfaces),
            EntityKind::LogicalInterface => Some(&self.logical_interfaces),
            _ => None,
        }
    }

    fn children_mut(&mut self, child: EntityKind) -> Option<&mut BTreeSet<ObjectId>> {
        match child {
            EntityKind::PhysicalInterface => Some(&mut self.physical_interfaces),
            EntityKind::LogicalInterface => Some(&mut self.logical_interfaces),
            _ => None,
        }
    }
}
