//! Network kinds.

use std::collections::BTreeSet;

use svcmon_core::{EntityKind, ObjectId, ObjectRecord, Result};

use crate::entity::{entity_accessors, ConfigEntity, EntityMeta};
use crate::links::LinkTable;

/// A virtual network.
#[derive(Clone, Debug)]
pub struct VirtualNetwork {
    meta: EntityMeta,
    links: LinkTable,
}

impl VirtualNetwork {
    /// Ports attached to the network.
    pub fn virtual_machine_interfaces(&self) -> BTreeSet<ObjectId> {
        self.links.linked(EntityKind::VirtualMachineInterface)
    }
}

impl ConfigEntity for VirtualNetwork {
    const KIND: EntityKind = EntityKind::VirtualNetwork;
    type Staged = ();

    entity_accessors!(virtual_networks);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
        }
    }

    fn stage(_record: &ObjectRecord<'_>) -> Result<()> {
        Ok(())
    }

    fn apply(&mut self, meta: EntityMeta, _staged: ()) {
        self.meta = meta;
    }
}

/// A virtual machine interface (port).
///
/// Links to at most one of each: virtual IP, pool, instance IP, virtual
/// network, and logical interface.
#[derive(Clone, Debug)]
pub struct VirtualMachineInterface {
    meta: EntityMeta,
    links: LinkTable,
}

impl VirtualMachineInterface {
    /// Virtual IP carried by the port.
    pub fn virtual_ip(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::VirtualIp)
    }

    /// Pool attached to the port.
    pub fn pool(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::LoadBalancerPool)
    }

    /// Instance IP assigned to the port.
    pub fn instance_ip(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::InstanceIp)
    }

    /// Every instance IP linked to the port.
    pub fn instance_ips(&self) -> BTreeSet<ObjectId> {
        self.links.linked(EntityKind::InstanceIp)
    }

    /// Network the port is attached to.
    pub fn virtual_network(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::VirtualNetwork)
    }

    /// Logical interface the port is bound to.
    pub fn logical_interface(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::LogicalInterface)
    }
}

impl ConfigEntity for VirtualMachineInterface {
    const KIND: EntityKind = EntityKind::VirtualMachineInterface;
    type Staged = ();

    entity_accessors!(virtual_machine_interfaces);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
        }
    }

    fn stage(_record: &ObjectRecord<'_>) -> Result<()> {
        Ok(())
    }

    fn apply(&mut self, meta: EntityMeta, _staged: ()) {
        self.meta = meta;
    }
}

/// An instance IP address.
#[derive(Clone, Debug)]
pub struct InstanceIp {
    meta: EntityMeta,
    links: LinkTable,
    address: String,
}

impl InstanceIp {
    /// Assigned address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Port the address is assigned to.
    pub fn virtual_machine_interface(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::VirtualMachineInterface)
    }
}

impl ConfigEntity for InstanceIp {
    const KIND: EntityKind = EntityKind::InstanceIp;
    type Staged = String;

    entity_accessors!(instance_ips);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
            address: String::new(),
        }
    }

    fn stage(record: &ObjectRecord<'_>) -> Result<String> {
        record.field("instance_ip_address")
    }

    fn apply(&mut self, meta: EntityMeta, address: String) {
        self.meta = meta;
        self.address = address;
    }
}
