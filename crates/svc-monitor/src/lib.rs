//! # svc-monitor
//!
//! In-memory mirror of a configuration server's object graph, driving a
//! downstream service agent.
//!
//! The cache keeps one registry per object kind, maintains symmetric links
//! between entities as notifications arrive, and hands load-balancer
//! snapshots to a [`ServiceAgent`](svcmon_cache::ServiceAgent) whenever they
//! change.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use svc_monitor::prelude::*;
//!
//! let manager = ConfigManager::builder()
//!     .reader(my_reader)
//!     .agent(my_agent)
//!     .build()?;
//!
//! // Feed notifications from the config server
//! manager.handle_raw("CREATE", "loadbalancer-pool", "pool-1")?;
//!
//! let pool = manager.pools().get(&ObjectId::new("pool-1"));
//! ```
//!
//! ## Architecture
//!
//! This library is organized into two crates:
//!
//! - `svcmon-core` - Identifiers, kinds, raw records, the reader contract,
//!   and error handling
//! - `svcmon-cache` - Entity registries, link bookkeeping, and the manager
//!
//! This crate (`svc-monitor`) re-exports all public APIs for convenience.
//!
//! ## Design Principles
//!
//! 1. **No panics in library code** - All errors are returned as `Result`
//! 2. **Server is the source of truth** - Every notification re-reads the
//!    full record
//! 3. **Staged refresh** - Records are validated before any registry write
//! 4. **Observable** - Built-in metrics and tracing support
//!
//! ## Features
//!
//! - `testing` - In-memory reader and agent doubles

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Re-export all sub-crates
pub use svcmon_cache as cache;
pub use svcmon_core as core;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use svc_monitor::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use svcmon_core::{
        AttributeMap, ConfigReader, EntityKind, ObjectId, ReadOutcome, Result, SvcMonError,
    };

    // Cache types
    pub use svcmon_cache::entities::{
        HealthMonitor, InstanceIp, LoadBalancerMember, LoadBalancerPool, LogicalInterface,
        LogicalInterfaceParent, PhysicalInterface, PhysicalRouter, Project, ServiceInstance,
        ServiceTemplate, VirtualIp, VirtualMachineInterface, VirtualNetwork,
    };
    pub use svcmon_cache::{
        ConfigEntity, ConfigManager, ConfigManagerBuilder, ManagerConfig, ManagerMetrics,
        NoopAgent, Notification, NotificationOutcome, Operation, ProvisionHandle,
        ProvisionPolicy, ProvisionSnapshot, Provisionable, ServiceAgent,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("svc-monitor {} (MSRV {})", VERSION, MSRV)
    }
}
