//! The capability set shared by every cached entity kind.

use std::collections::BTreeSet;
use std::fmt;

use svcmon_core::{EntityKind, ObjectId, ObjectRecord, Result};

use crate::links::LinkTable;
use crate::manager::ConfigManager;
use crate::registry::EntityRegistry;

/// Identity and naming shared by every entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityMeta {
    /// Server-assigned uuid.
    pub uuid: ObjectId,
    /// Fully qualified name path.
    pub fq_name: Vec<String>,
    /// Display name as sent by the server; may be empty.
    pub display_name: String,
    /// Uuid of the owning parent, if any.
    pub parent_uuid: Option<ObjectId>,
}

impl EntityMeta {
    /// Metadata for an entity that has not been read yet.
    #[must_use]
    pub fn unread(uuid: ObjectId) -> Self {
        Self {
            uuid,
            ..Self::default()
        }
    }

    /// Build metadata from a validated record.
    #[must_use]
    pub fn from_record(record: &ObjectRecord<'_>) -> Self {
        Self {
            uuid: record.uuid().clone(),
            fq_name: record.fq_name().to_vec(),
            display_name: record.display_name().to_string(),
            parent_uuid: record.parent_uuid().cloned(),
        }
    }

    /// Last segment of the qualified name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.fq_name.last().map(String::as_str).unwrap_or_default()
    }

    /// Display name, falling back to [`name`](Self::name) when empty.
    #[must_use]
    pub fn effective_name(&self) -> &str {
        if self.display_name.is_empty() {
            self.name()
        } else {
            &self.display_name
        }
    }
}

/// A cached, typed representation of one config object kind.
///
/// Implementations describe *what* a kind holds; the registry drives
/// refresh and tear-down generically:
///
/// 1. [`stage`](Self::stage) validates kind-specific fields from the record
///    without touching any registry.
/// 2. [`apply`](Self::apply) assigns scalars and containment sets.
/// 3. The registry reconciles [`links_mut`](Self::links_mut) against the
///    record and applies the resulting deltas to peers.
/// 4. [`after_refresh`](Self::after_refresh) runs kind-specific follow-up
///    such as provisioning.
pub trait ConfigEntity: Clone + fmt::Debug + Send + Sync + Sized + 'static {
    /// Kind of this entity.
    const KIND: EntityKind;

    /// Kind-specific state staged from a record before it is applied.
    type Staged;

    /// Construct an unread entity.
    fn new(uuid: ObjectId) -> Self;

    /// Identity and naming.
    fn meta(&self) -> &EntityMeta;

    /// Link slots and back-reference sets.
    fn links(&self) -> &LinkTable;

    /// Link slots and back-reference sets, mutably.
    fn links_mut(&mut self) -> &mut LinkTable;

    /// Validate and extract kind-specific state from a record.
    fn stage(record: &ObjectRecord<'_>) -> Result<Self::Staged>;

    /// Assign metadata and staged state.
    fn apply(&mut self, meta: EntityMeta, staged: Self::Staged);

    /// The manager's registry for this kind.
    fn registry(manager: &ConfigManager) -> &EntityRegistry<Self>;

    /// Uuid of this entity.
    fn uuid(&self) -> &ObjectId {
        &self.meta().uuid
    }

    /// Parent whose containment set lists this entity, if any.
    fn container(&self) -> Option<(EntityKind, ObjectId)> {
        None
    }

    /// Containment set for children of the given kind.
    fn children(&self, _child: EntityKind) -> Option<&BTreeSet<ObjectId>> {
        None
    }

    /// Containment set for children of the given kind, mutably.
    fn children_mut(&mut self, _child: EntityKind) -> Option<&mut BTreeSet<ObjectId>> {
        None
    }

    /// Runs after the refreshed entity and its links are committed.
    fn after_refresh(&self, _manager: &ConfigManager) -> Result<()> {
        Ok(())
    }

    /// Runs before links are unwound during tear-down.
    fn before_tear_down(&self, _manager: &ConfigManager) -> Result<()> {
        Ok(())
    }
}

/// Implements the accessor methods of [`ConfigEntity`] for a struct with
/// `meta` and `links` fields.
macro_rules! entity_accessors {
    ($registry:ident) => {
        fn meta(&self) -> &$crate::entity::EntityMeta {
            &self.meta
        }

        fn links(&self) -> &$crate::links::LinkTable {
            &self.links
        }

        fn links_mut(&mut self) -> &mut $crate::links::LinkTable {
            &mut self.links
        }

        fn registry(
            manager: &$crate::manager::ConfigManager,
        ) -> &$crate::registry::EntityRegistry<Self> {
            manager.$registry()
        }
    };
}

pub(crate) use entity_accessors;
