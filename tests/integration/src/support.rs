//! Shared fixtures.

use std::sync::Arc;

use svc_monitor::cache::testing::{InMemoryConfigServer, RecordBuilder, RecordingAgent};
use svc_monitor::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn id(uuid: &str) -> ObjectId {
    ObjectId::new(uuid)
}

/// A manager wired to an in-memory server and a recording agent.
pub struct Harness {
    pub server: Arc<InMemoryConfigServer>,
    pub agent: Arc<RecordingAgent>,
    pub manager: ConfigManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(|builder| builder)
    }

    pub fn with(configure: impl FnOnce(ConfigManagerBuilder) -> ConfigManagerBuilder) -> Self {
        init_tracing();
        let server = Arc::new(InMemoryConfigServer::new());
        let agent = Arc::new(RecordingAgent::new());
        let builder = ConfigManager::builder()
            .reader(Arc::clone(&server))
            .agent(Arc::clone(&agent));
        let manager = configure(builder).build().expect("manager should build");

        Self {
            server,
            agent,
            manager,
        }
    }

    /// Store a record on the server without notifying.
    pub fn put(&self, kind: EntityKind, uuid: &str, record: RecordBuilder) {
        self.server.put(kind, uuid, record);
    }

    /// Store a record and deliver a create notification for it.
    pub fn create(&self, kind: EntityKind, uuid: &str, record: RecordBuilder) -> NotificationOutcome {
        self.put(kind, uuid, record);
        self.manager
            .on_create(kind, &id(uuid))
            .expect("create should succeed")
    }

    /// Replace a record and deliver an update notification for it.
    pub fn update(&self, kind: EntityKind, uuid: &str, record: RecordBuilder) -> NotificationOutcome {
        self.put(kind, uuid, record);
        self.manager
            .on_update(kind, &id(uuid))
            .expect("update should succeed")
    }

    /// Drop a record from the server and deliver a delete notification.
    pub fn delete(&self, kind: EntityKind, uuid: &str) -> NotificationOutcome {
        self.server.remove(kind, uuid);
        self.manager
            .on_delete(kind, &id(uuid))
            .expect("delete should succeed")
    }
}

pub fn pool(name: &str) -> RecordBuilder {
    RecordBuilder::for_kind(EntityKind::LoadBalancerPool, name)
}

pub fn member(name: &str, pool: &str) -> RecordBuilder {
    RecordBuilder::for_kind(EntityKind::LoadBalancerMember, name)
        .parent(EntityKind::LoadBalancerPool, pool)
}

pub fn vip(name: &str, pool: &str) -> RecordBuilder {
    RecordBuilder::for_kind(EntityKind::VirtualIp, name).reference(EntityKind::LoadBalancerPool, pool)
}

pub fn health_monitor(name: &str, pools: &[&str]) -> RecordBuilder {
    pools.iter().fold(
        RecordBuilder::for_kind(EntityKind::HealthMonitor, name),
        |record, pool| record.reference(EntityKind::LoadBalancerPool, pool),
    )
}
