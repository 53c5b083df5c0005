//! In-memory collaborators for tests and benchmarks.
//!
//! Enabled with the `testing` feature.
//!
//! - [`InMemoryConfigServer`] - a [`ConfigReader`] backed by a map, with
//!   transient failure injection
//! - [`RecordingAgent`] - a [`ServiceAgent`] that records every call, with
//!   per-uuid failure injection
//! - [`RecordBuilder`] - builds valid records for any kind

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;
use serde_json::{json, Value};
use svcmon_core::{
    AttributeMap, ConfigReader, EntityKind, ObjectId, ReadOutcome, Result, SvcMonError,
};

use crate::agent::{ProvisionHandle, ProvisionSnapshot, ServiceAgent};

/// A config server holding records in memory.
#[derive(Debug, Default)]
pub struct InMemoryConfigServer {
    objects: DashMap<(EntityKind, ObjectId), AttributeMap>,
    failures: Mutex<VecDeque<String>>,
    reads: AtomicU64,
}

impl InMemoryConfigServer {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or replace a record.
    pub fn put(
        &self,
        kind: EntityKind,
        uuid: impl Into<ObjectId>,
        record: impl Into<AttributeMap>,
    ) {
        self.objects.insert((kind, uuid.into()), record.into());
    }

    /// Delete a record; later reads report it gone.
    pub fn remove(&self, kind: EntityKind, uuid: impl Into<ObjectId>) {
        self.objects.remove(&(kind, uuid.into()));
    }

    /// Fail the next read with a transient error.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(message.into());
    }

    /// Total reads served, including failed ones.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl ConfigReader for InMemoryConfigServer {
    fn read(&self, kind: EntityKind, uuid: &ObjectId) -> Result<ReadOutcome> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        if let Some(message) = failure {
            return Err(SvcMonError::transient(
                kind,
                uuid,
                std::io::Error::other(message),
            ));
        }

        Ok(self
            .objects
            .get(&(kind, uuid.clone()))
            .map(|record| ReadOutcome::Found(record.value().clone()))
            .unwrap_or(ReadOutcome::Gone))
    }
}

/// One call received by a [`RecordingAgent`].
#[derive(Clone, Debug, PartialEq)]
pub enum AgentCall {
    /// An add.
    Add(ProvisionSnapshot),
    /// A delete, with the handle it was given.
    Delete(ProvisionSnapshot, Option<ProvisionHandle>),
}

impl AgentCall {
    /// The snapshot the call carried.
    pub fn snapshot(&self) -> &ProvisionSnapshot {
        match self {
            Self::Add(snapshot) | Self::Delete(snapshot, _) => snapshot,
        }
    }
}

/// A service agent that records every call.
#[derive(Debug, Default)]
pub struct RecordingAgent {
    calls: Mutex<Vec<AgentCall>>,
    failing_adds: Mutex<HashSet<ObjectId>>,
    failing_deletes: Mutex<HashSet<ObjectId>>,
    issued: AtomicU64,
}

impl RecordingAgent {
    /// Create an agent that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<AgentCall> {
        lock(&self.calls).clone()
    }

    /// Number of adds attempted for `uuid`.
    pub fn adds_for(&self, uuid: &ObjectId) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, AgentCall::Add(s) if s.uuid() == uuid))
            .count()
    }

    /// Number of deletes attempted for `uuid`.
    pub fn deletes_for(&self, uuid: &ObjectId) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, AgentCall::Delete(s, _) if s.uuid() == uuid))
            .count()
    }

    /// Snapshot of the most recent add for `uuid`.
    pub fn last_add_for(&self, uuid: &ObjectId) -> Option<ProvisionSnapshot> {
        lock(&self.calls).iter().rev().find_map(|call| match call {
            AgentCall::Add(snapshot) if snapshot.uuid() == uuid => Some(snapshot.clone()),
            _ => None,
        })
    }

    /// Handle passed to the most recent delete for `uuid`.
    pub fn last_delete_handle_for(&self, uuid: &ObjectId) -> Option<ProvisionHandle> {
        lock(&self.calls).iter().rev().find_map(|call| match call {
            AgentCall::Delete(snapshot, handle) if snapshot.uuid() == uuid => handle.clone(),
            _ => None,
        })
    }

    /// Make adds for `uuid` fail until [`reset_failures`](Self::reset_failures).
    pub fn fail_add_for(&self, uuid: impl Into<ObjectId>) {
        lock(&self.failing_adds).insert(uuid.into());
    }

    /// Make deletes for `uuid` fail until [`reset_failures`](Self::reset_failures).
    pub fn fail_delete_for(&self, uuid: impl Into<ObjectId>) {
        lock(&self.failing_deletes).insert(uuid.into());
    }

    /// Stop injecting failures.
    pub fn reset_failures(&self) {
        lock(&self.failing_adds).clear();
        lock(&self.failing_deletes).clear();
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        lock(&self.calls).clear();
    }
}

impl ServiceAgent for RecordingAgent {
    fn add(&self, snapshot: &ProvisionSnapshot) -> Result<ProvisionHandle> {
        lock(&self.calls).push(AgentCall::Add(snapshot.clone()));

        if lock(&self.failing_adds).contains(snapshot.uuid()) {
            return Err(SvcMonError::agent(
                "add",
                snapshot.kind(),
                snapshot.uuid(),
                "injected failure",
            ));
        }

        let serial = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(ProvisionHandle::new(format!(
            "{}/{}#{serial}",
            snapshot.kind(),
            snapshot.uuid()
        )))
    }

    fn delete(&self, snapshot: &ProvisionSnapshot, last: Option<&ProvisionHandle>) -> Result<()> {
        lock(&self.calls).push(AgentCall::Delete(snapshot.clone(), last.cloned()));

        if lock(&self.failing_deletes).contains(snapshot.uuid()) {
            return Err(SvcMonError::agent(
                "delete",
                snapshot.kind(),
                snapshot.uuid(),
                "injected failure",
            ));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Builds a valid record for any kind.
///
/// Required kind-specific fields are filled with plausible defaults; links,
/// parents, and children are added explicitly.
///
/// # Example
///
/// ```rust,ignore
/// use svcmon_cache::testing::RecordBuilder;
/// use svcmon_core::EntityKind;
///
/// let member = RecordBuilder::for_kind(EntityKind::LoadBalancerMember, "m1")
///     .parent(EntityKind::LoadBalancerPool, "pool-1")
///     .build();
/// assert!(member.contains("loadbalancer_member_properties"));
/// ```
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    attrs: AttributeMap,
}

impl RecordBuilder {
    /// Start a record named `name`.
    pub fn for_kind(kind: EntityKind, name: &str) -> Self {
        let mut attrs = AttributeMap::new().with("fq_name", json!(["default-domain", "admin", name]));
        for (field, value) in required_fields(kind) {
            attrs.insert(field, value);
        }
        Self { attrs }
    }

    /// Set the display name.
    pub fn display_name(self, name: &str) -> Self {
        self.field("display_name", json!(name))
    }

    /// Set the parent uuid and its type tag.
    pub fn parent(self, kind: EntityKind, uuid: &str) -> Self {
        self.field("parent_uuid", json!(uuid))
            .field("parent_type", json!(kind.type_name()))
    }

    /// Set the parent uuid with an explicit type tag.
    pub fn parent_tagged(self, parent_type: &str, uuid: &str) -> Self {
        self.field("parent_uuid", json!(uuid))
            .field("parent_type", json!(parent_type))
    }

    /// Add a forward reference (`<peer>_refs`).
    pub fn reference(self, peer: EntityKind, uuid: &str) -> Self {
        self.append(peer.refs_field(), uuid)
    }

    /// Add a back reference (`<peer>_back_refs`).
    pub fn back_reference(self, peer: EntityKind, uuid: &str) -> Self {
        self.append(peer.back_refs_field(), uuid)
    }

    /// Add an embedded child (`<child>s`).
    pub fn child(self, child: EntityKind, uuid: &str) -> Self {
        self.append(child.children_field(), uuid)
    }

    /// Set any field.
    pub fn field(mut self, name: &str, value: Value) -> Self {
        self.attrs.insert(name, value);
        self
    }

    /// Finish the record.
    pub fn build(self) -> AttributeMap {
        self.attrs
    }

    fn append(mut self, field: String, uuid: &str) -> Self {
        let mut entries = match self.attrs.get(&field) {
            Some(Value::Array(entries)) => entries.clone(),
            _ => Vec::new(),
        };
        entries.push(json!({ "uuid": uuid }));
        self.attrs.insert(field, Value::Array(entries));
        self
    }
}

impl From<RecordBuilder> for AttributeMap {
    fn from(builder: RecordBuilder) -> Self {
        builder.build()
    }
}

fn required_fields(kind: EntityKind) -> Vec<(&'static str, Value)> {
    match kind {
        EntityKind::LoadBalancerPool => vec![
            (
                "loadbalancer_pool_properties",
                json!({"protocol": "HTTP", "loadbalancer_method": "ROUND_ROBIN", "admin_state": true}),
            ),
            ("loadbalancer_pool_provider", json!("opencontrail")),
        ],
        EntityKind::LoadBalancerMember => vec![(
            "loadbalancer_member_properties",
            json!({"address": "10.0.0.10", "protocol_port": 80, "weight": 1, "admin_state": true}),
        )],
        EntityKind::VirtualIp => vec![(
            "virtual_ip_properties",
            json!({"address": "192.0.2.10", "protocol": "HTTP", "protocol_port": 80, "connection_limit": -1, "admin_state": true}),
        )],
        EntityKind::HealthMonitor => vec![(
            "loadbalancer_healthmonitor_properties",
            json!({"monitor_type": "PING", "delay": 5, "timeout": 5, "max_retries": 3, "admin_state": true}),
        )],
        EntityKind::ServiceInstance => vec![("service_instance_properties", json!({}))],
        EntityKind::ServiceTemplate => vec![("service_template_properties", json!({}))],
        EntityKind::InstanceIp => vec![("instance_ip_address", json!("10.0.0.2"))],
        EntityKind::VirtualNetwork
        | EntityKind::VirtualMachineInterface
        | EntityKind::LogicalInterface
        | EntityKind::PhysicalInterface
        | EntityKind::PhysicalRouter
        | EntityKind::Project => Vec::new(),
    }
}
