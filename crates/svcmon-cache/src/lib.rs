//! # svcmon-cache
//!
//! In-memory mirror of the config server's object graph for svc-monitor.
//!
//! This crate keeps one typed registry per mirrored kind and keeps the links
//! between entities consistent as change notifications arrive in any order:
//!
//! - [`ConfigManager`] - Dispatches create/update/delete notifications
//! - [`EntityRegistry`] - DashMap-backed registry holding one entity per uuid
//! - [`LinkTable`] - Per-entity reference slots, back-reference sets and the set-reconciliation diff
//! - [`ServiceAgent`] - Collaborator that provisions load balancer entities
//!
//! ## Key Design Decisions
//!
//! - Every link is stored symmetrically: an entity's slot for a peer kind is
//!   both its forward reference and the peer's back-reference index
//! - Refresh validates the whole record before touching any registry
//! - Peer updates are expressed as [`LinkDelta`]s and applied one registry
//!   entry at a time; no two `DashMap` entries are ever held together
//! - Notifications are serialized by a single dispatch lock; lookups are not
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use svcmon_cache::ConfigManager;
//! use svcmon_core::{EntityKind, ObjectId};
//!
//! let manager = ConfigManager::builder()
//!     .reader(Arc::new(api_client))
//!     .agent(Arc::new(haproxy_agent))
//!     .build()?;
//!
//! manager.handle_raw("CREATE", "loadbalancer_pool", "5b1f0a2e")?;
//! let pool = manager.pools().get(&ObjectId::new("5b1f0a2e"));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod agent;
mod builder;
mod config;
pub mod entities;
mod entity;
mod links;
mod manager;
mod metrics;
mod registry;
mod stats;

#[cfg(any(test, feature = "testing"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;

pub use agent::{
    HealthMonitorSnapshot, MemberSnapshot, NoopAgent, PoolSnapshot, ProvisionHandle,
    ProvisionPolicy, ProvisionSnapshot, Provisionable, Provisioned, ServiceAgent,
    VirtualIpSnapshot,
};
pub use builder::ConfigManagerBuilder;
pub use config::ManagerConfig;
pub use entity::{ConfigEntity, EntityMeta};
pub use links::{LinkDelta, LinkSlot, LinkTable};
pub use manager::{ConfigManager, Notification, NotificationOutcome, Operation};
pub use metrics::ManagerMetrics;
pub use registry::{EntityRegistry, LinkViolation, Relation, RepairReport};
pub use stats::RegistryStats;
