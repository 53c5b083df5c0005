//! Collaborator trait for reading objects from the config server.

use std::sync::Arc;

use crate::{AttributeMap, EntityKind, ObjectId, Result};

/// Result of reading one object.
///
/// A missing object is a normal outcome, not an error: the cache treats it
/// as an implicit delete.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The object exists; its full current state.
    Found(AttributeMap),
    /// The object no longer exists on the server.
    Gone,
}

impl ReadOutcome {
    /// Check if the object was found.
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Reads the full current state of a config object.
///
/// Implementations own transport, retries, and timeouts. Connectivity
/// failures are reported as [`SvcMonError::Transient`](crate::SvcMonError::Transient).
pub trait ConfigReader: Send + Sync {
    /// Read the object `uuid` of the given kind.
    fn read(&self, kind: EntityKind, uuid: &ObjectId) -> Result<ReadOutcome>;
}

impl<R: ConfigReader + ?Sized> ConfigReader for Arc<R> {
    fn read(&self, kind: EntityKind, uuid: &ObjectId) -> Result<ReadOutcome> {
        (**self).read(kind, uuid)
    }
}
