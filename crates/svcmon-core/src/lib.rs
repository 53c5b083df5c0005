//! # svcmon-core
//!
//! Core types, traits, and error handling for the svc-monitor config cache.
//!
//! This crate provides the foundational types shared by the cache layer:
//!
//! - [`SvcMonError`] - Error type covering read, parse, and provisioning failures
//! - [`ObjectId`] - Identity of a config object as assigned by the config server
//! - [`EntityKind`] - The thirteen mirrored object kinds and their link schema
//! - [`AttributeMap`] / [`ObjectRecord`] - Raw and validated views of a read object
//! - [`ConfigReader`] - Collaborator trait for fetching objects from the config server
//!
//! ## Example
//!
//! ```rust
//! use svcmon_core::{EntityKind, ObjectId};
//!
//! let kind: EntityKind = "loadbalancer_pool".parse().unwrap();
//! assert_eq!(kind, EntityKind::LoadBalancerPool);
//!
//! let id = ObjectId::new("5b1f0a2e-pool");
//! assert_eq!(id.as_str(), "5b1f0a2e-pool");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attributes;
mod error;
mod kind;
mod object_id;
mod reader;

pub use attributes::{AttributeMap, ObjectRecord};
pub use error::SvcMonError;
pub use kind::{Cardinality, EntityKind, LinkSpec};
pub use object_id::ObjectId;
pub use reader::{ConfigReader, ReadOutcome};

/// Result type alias using [`SvcMonError`].
pub type Result<T> = std::result::Result<T, SvcMonError>;
