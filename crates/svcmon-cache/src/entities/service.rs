//! Service instance and template kinds.

use std::collections::BTreeSet;

use serde_json::Value;
use svcmon_core::{EntityKind, ObjectId, ObjectRecord, Result};

use crate::entity::{entity_accessors, ConfigEntity, EntityMeta};
use crate::links::LinkTable;

/// A service instance.
#[derive(Clone, Debug)]
pub struct ServiceInstance {
    meta: EntityMeta,
    links: LinkTable,
    properties: Value,
}

impl ServiceInstance {
    /// Instance properties, as sent by the server.
    pub fn properties(&self) -> &Value {
        &self.properties
    }

    /// Template the instance was created from.
    pub fn service_template(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::ServiceTemplate)
    }

    /// Pool the instance realizes.
    pub fn pool(&self) -> Option<&ObjectId> {
        self.links.single(EntityKind::LoadBalancerPool)
    }
}

impl ConfigEntity for ServiceInstance {
    const KIND: EntityKind = EntityKind::ServiceInstance;
    type Staged = Value;

    entity_accessors!(service_instances);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
            properties: Value::Null,
        }
    }

    fn stage(record: &ObjectRecord<'_>) -> Result<Value> {
        record.field("service_instance_properties")
    }

    fn apply(&mut self, meta: EntityMeta, properties: Value) {
        self.meta = meta;
        self.properties = properties;
    }
}

/// A service template.
#[derive(Clone, Debug)]
pub struct ServiceTemplate {
    meta: EntityMeta,
    links: LinkTable,
    properties: Value,
}

impl ServiceTemplate {
    /// Template properties, as sent by the server.
    pub fn properties(&self) -> &Value {
        &self.properties
    }

    /// Instances created from the template.
    pub fn service_instances(&self) -> BTreeSet<ObjectId> {
        self.links.linked(EntityKind::ServiceInstance)
    }
}

impl ConfigEntity for ServiceTemplate {
    const KIND: EntityKind = EntityKind::ServiceTemplate;
    type Staged = Value;

    entity_accessors!(service_templates);

    fn new(uuid: ObjectId) -> Self {
        Self {
            meta: EntityMeta::unread(uuid),
            links: LinkTable::for_kind(Self::KIND),
            properties: Value::Null,
        }
    }

    fn stage(record: &ObjectRecord<'_>) -> Result<Value> {
        record.field("service_template_properties")
    }

    fn apply(&mut self, meta: EntityMeta, properties: Value) {
        self.meta = meta;
        self.properties = properties;
    }
}
