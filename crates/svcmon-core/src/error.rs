//! Error types for config cache operations.
//!
//! This module provides [`SvcMonError`], the error type shared by the reader
//! collaborator, the record parser, and the service agent integration.

use crate::{EntityKind, ObjectId};

/// Error type for config cache operations.
///
/// A uuid that is simply absent from a registry is never an error; lookups
/// return `None` instead. Errors are reserved for failures that abort the
/// current notification.
///
/// # Example
///
/// ```rust
/// use svcmon_core::{EntityKind, ObjectId, SvcMonError};
///
/// fn require_name(fq_name: &[String]) -> Result<(), SvcMonError> {
///     if fq_name.is_empty() {
///         return Err(SvcMonError::malformed(
///             EntityKind::Project,
///             &ObjectId::new("p1"),
///             "fq_name is empty",
///         ));
///     }
///     Ok(())
/// }
///
/// assert!(require_name(&[]).is_err());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SvcMonError {
    /// Notification or parent tag named a kind the cache does not mirror.
    #[error("unknown object type: {type_name}")]
    UnknownKind {
        /// The unrecognized type name.
        type_name: String,
    },

    /// Notification carried an operation other than create, update, or delete.
    #[error("unknown notification operation: {operation}")]
    UnknownOperation {
        /// The unrecognized operation.
        operation: String,
    },

    /// A freshly read object is missing a required field or has one of the
    /// wrong shape.
    #[error("malformed {kind} {uuid}: {reason}")]
    MalformedObject {
        /// Kind of the object being refreshed.
        kind: EntityKind,
        /// Uuid of the object being refreshed.
        uuid: ObjectId,
        /// What was wrong with the record.
        reason: String,
    },

    /// The config server could not be reached.
    #[error("transient read failure for {kind} {uuid}: {message}")]
    Transient {
        /// Kind being read.
        kind: EntityKind,
        /// Uuid being read.
        uuid: ObjectId,
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The service agent rejected an add or delete.
    #[error("service agent {operation} failed for {kind} {uuid}: {message}")]
    Agent {
        /// `add` or `delete`.
        operation: &'static str,
        /// Kind being provisioned.
        kind: EntityKind,
        /// Uuid being provisioned.
        uuid: ObjectId,
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SvcMonError {
    /// Create a malformed-object error.
    pub fn malformed(kind: EntityKind, uuid: &ObjectId, reason: impl Into<String>) -> Self {
        Self::MalformedObject {
            kind,
            uuid: uuid.clone(),
            reason: reason.into(),
        }
    }

    /// Create a transient read error from any error type.
    pub fn transient<E>(kind: EntityKind, uuid: &ObjectId, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transient {
            kind,
            uuid: uuid.clone(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a service agent error with a plain message.
    pub fn agent(
        operation: &'static str,
        kind: EntityKind,
        uuid: &ObjectId,
        message: impl Into<String>,
    ) -> Self {
        Self::Agent {
            operation,
            kind,
            uuid: uuid.clone(),
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error from any error type.
    pub fn internal<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check whether retrying the same notification later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Agent { .. })
    }
}
