use svcmon_core::{EntityKind, ObjectId, ObjectRecord, Result};

use crate::entity::{entity_accessors, ConfigEntity, EntityMeta};
use crate::links::LinkTable;

/// A project (tenant). Carries only identity and naming.
#[derive(Clone, Debug)]
pub struct Project {
    meta: EntityMeta,
    links: LinkTable,
}

impl ConfigEntity for Project {
    const KIND: EntityKind = EntityKind::Project;
    type Staged = ();

    entity_accessors!(projects);

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
