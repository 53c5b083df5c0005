//! Per-kind entity registries.
//!
//! Each [`EntityRegistry`] stores at most one live entity per uuid in a
//! `DashMap`. Lookups clone the entity out and drop the shard lock before
//! returning, so no caller ever holds two registry entries at once.
//!
//! The registry also drives the generic refresh and tear-down algorithm for
//! its kind; peer bookkeeping is delegated back to the [`ConfigManager`].
//! Peers only ever write an entity's back-reference sets; its forward slots
//! change on its own refresh, or when a target it names is torn down.

use dashmap::DashMap;
use svcmon_core::{EntityKind, ObjectId, ObjectRecord, ReadOutcome, Result};
use tracing::{debug, trace, warn};

use crate::entity::{ConfigEntity, EntityMeta};
use crate::links::LinkDelta;
use crate::manager::{ConfigManager, NotificationOutcome};
use crate::stats::RegistryStats;

/// Outcome of writing into a peer's back-reference or containment set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BackLink {
    /// The peer was found and updated.
    Linked,
    /// The peer uuid is not registered; the write was skipped.
    Unresolved,
    /// The peer kind keeps no set for the writer's kind.
    Undeclared,
}

/// Repairs made while re-deriving links from forward declarations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Missing back-links that were written.
    pub back_links_added: usize,
    /// Missing containment memberships that were written.
    pub containment_added: usize,
}

impl RepairReport {
    /// Total repairs.
    #[must_use]
    pub fn total(&self) -> usize {
        self.back_links_added + self.containment_added
    }

    /// Check if nothing needed repair.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub(crate) fn merge(&mut self, other: RepairReport) {
        self.back_links_added += other.back_links_added;
        self.containment_added += other.containment_added;
    }
}

/// Registry of live entities of one kind, keyed by uuid.
///
/// ## Thread Safety
///
/// Reads are lock-free at the caller's level: [`get`](Self::get) clones the
/// entity and releases the shard lock immediately. Mutations happen only
/// under the manager's dispatch lock.
#[derive(Debug)]
pub struct EntityRegistry<E: ConfigEntity> {
    /// Live entities keyed by uuid.
    entries: DashMap<ObjectId, E>,
    /// Statistics.
    stats: RegistryStats,
}

impl<E: ConfigEntity> Default for EntityRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ConfigEntity> EntityRegistry<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create an empty registry with a specific initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            stats: RegistryStats::new(),
        }
    }

    /// Kind stored in this registry.
    #[inline]
    pub fn kind(&self) -> EntityKind {
        E::KIND
    }

    /// Get registry statistics.
    #[inline]
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    /// Look up an entity by uuid.
    ///
    /// An absent uuid is not an error; it returns `None` and counts as a miss.
    pub fn get(&self, uuid: &ObjectId) -> Option<E> {
        let result = self.entries.get(uuid).map(|entry| entry.value().clone());

        if result.is_some() {
            self.stats.record_hit();
            trace!(kind = %E::KIND, uuid = %uuid, "registry hit");
        } else {
            self.stats.record_miss();
            trace!(kind = %E::KIND, uuid = %uuid, "registry miss");
        }

        result
    }

    /// Check if a uuid is registered.
    pub fn contains(&self, uuid: &ObjectId) -> bool {
        self.entries.contains_key(uuid)
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered uuids, sorted.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.entries.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Clones of all registered entities, sorted by uuid.
    ///
    /// Note: This acquires read locks on all shards.
    pub fn entities(&self) -> Vec<E> {
        let mut entities: Vec<_> = self.entries.iter().map(|r| r.value().clone()).collect();
        entities.sort_by(|a, b| a.uuid().cmp(b.uuid()));
        entities
    }

    /// Run `f` against the stored entity without touching statistics.
    pub(crate) fn with<R>(&self, uuid: &ObjectId, f: impl FnOnce(&E) -> R) -> Option<R> {
        self.entries.get(uuid).map(|entry| f(entry.value()))
    }

    /// Mutate the stored entity in place.
    pub(crate) fn update<R>(&self, uuid: &ObjectId, f: impl FnOnce(&mut E) -> R) -> Option<R> {
        self.entries.get_mut(uuid).map(|mut entry| f(entry.value_mut()))
    }

    /// Insert an entity directly, bypassing the reader.
    #[cfg(any(test, feature = "testing"))]
    pub fn insert(&self, entity: E) {
        self.entries.insert(entity.uuid().clone(), entity);
    }

    /// Read `uuid` from the config server and construct or refresh it.
    ///
    /// Everything that can fail on the record itself is validated before the
    /// registry is touched, so a malformed record leaves the previous state
    /// intact.
    pub(crate) fn upsert(
        &self,
        manager: &ConfigManager,
        uuid: &ObjectId,
    ) -> Result<NotificationOutcome> {
        let attrs = match manager.reader().read(E::KIND, uuid)? {
            ReadOutcome::Found(attrs) => attrs,
            ReadOutcome::Gone => {
                debug!(kind = %E::KIND, uuid = %uuid, "object gone from config server");
                return self.remove(manager, uuid);
            }
        };

        let record = ObjectRecord::parse(E::KIND, uuid, &attrs)?;
        let staged = E::stage(&record)?;
        let meta = EntityMeta::from_record(&record);

        let previous = self.entries.get(uuid).map(|entry| entry.value().clone());
        let created = previous.is_none();
        let old_container = previous.as_ref().and_then(E::container);

        let mut entity = previous.unwrap_or_else(|| E::new(uuid.clone()));
        entity.apply(meta, staged);
        let deltas = entity.links_mut().reconcile(&record);
        let new_container = entity.container();

        self.entries.insert(uuid.clone(), entity);
        if created {
            self.stats.record_created();
        } else {
            self.stats.record_refreshed();
        }

        debug!(
            kind = %E::KIND,
            uuid = %uuid,
            created,
            link_changes = deltas.len(),
            "refreshed entity"
        );

        manager.apply_link_deltas(E::KIND, uuid, &deltas);
        self.mirror_new_targets(manager, uuid, &deltas);

        if old_container != new_container {
            if let Some((parent_kind, parent)) = &old_container {
                manager.leave_container(*parent_kind, parent, E::KIND, uuid);
            }
        }
        if let Some((parent_kind, parent)) = &new_container {
            manager.join_container(*parent_kind, parent, E::KIND, uuid);
        }

        if created && manager.config().reconcile_on_create {
            let report = self.adopt(manager, uuid);
            if !report.is_empty() {
                debug!(
                    kind = %E::KIND,
                    uuid = %uuid,
                    repairs = report.total(),
                    "adopted links declared by peers"
                );
            }
        }

        if let Some(committed) = self.with(uuid, E::clone) {
            committed.after_refresh(manager)?;
        }

        Ok(if created {
            NotificationOutcome::Created
        } else {
            NotificationOutcome::Refreshed
        })
    }

    /// Tear down and erase `uuid`; a no-op when it is not registered.
    ///
    /// A failing pre-tear-down hook does not stop the tear-down; its error is
    /// returned after the entity is erased.
    pub(crate) fn remove(
        &self,
        manager: &ConfigManager,
        uuid: &ObjectId,
    ) -> Result<NotificationOutcome> {
        let Some(mut entity) = self.entries.get(uuid).map(|entry| entry.value().clone()) else {
            trace!(kind = %E::KIND, uuid = %uuid, "remove of unknown uuid ignored");
            return Ok(NotificationOutcome::Ignored);
        };

        let hook = entity.before_tear_down(manager);
        if let Err(error) = &hook {
            warn!(kind = %E::KIND, uuid = %uuid, %error, "tear-down hook failed");
        }

        let linked = entity.links_mut().detach();
        manager.detach_links(E::KIND, uuid, &linked);

        if let Some((parent_kind, parent)) = entity.container() {
            manager.leave_container(parent_kind, &parent, E::KIND, uuid);
        }

        self.entries.remove(uuid);
        self.stats.record_removed();
        debug!(kind = %E::KIND, uuid = %uuid, "removed entity");

        hook.map(|()| NotificationOutcome::Removed)
    }

    /// Record as referrers the newly named targets whose own forward slot
    /// already names `uuid`.
    ///
    /// Covers a target refreshed before `uuid` was registered, whose
    /// back-link to `uuid` was deferred at the time.
    fn mirror_new_targets(&self, manager: &ConfigManager, uuid: &ObjectId, deltas: &[LinkDelta]) {
        for delta in deltas {
            let peers = manager.registry_for(delta.peer);
            for target in &delta.added {
                if !peers.references(target, E::KIND, uuid) {
                    continue;
                }
                let added = self
                    .update(uuid, |entity| entity.links_mut().repair_ref(delta.peer, target))
                    .unwrap_or(false);
                if added {
                    self.stats.record_back_link_added();
                    trace!(kind = %E::KIND, uuid = %uuid, referrer = %target, "mirrored back-link");
                }
            }
        }
    }

    /// Write back-links and containment memberships that peers declare for
    /// `uuid` but that are missing from its own sets.
    pub(crate) fn adopt(&self, manager: &ConfigManager, uuid: &ObjectId) -> RepairReport {
        let mut report = RepairReport::default();

        for peer in E::KIND.referrer_kinds() {
            let referrers = manager.registry_for(peer).referrers(E::KIND, uuid);
            for referrer in referrers {
                let repaired = self
                    .update(uuid, |entity| entity.links_mut().repair_ref(peer, &referrer))
                    .unwrap_or(false);
                if repaired {
                    self.stats.record_back_link_added();
                    report.back_links_added += 1;
                    trace!(
                        kind = %E::KIND,
                        uuid = %uuid,
                        peer = %peer,
                        referrer = %referrer,
                        "repaired back-link"
                    );
                }
            }
        }

        for child in E::KIND.children() {
            let children = manager
                .registry_for(*child)
                .contained_in(E::KIND, uuid);
            for id in children {
                let joined = self
                    .update(uuid, |entity| {
                        entity
                            .children_mut(*child)
                            .is_some_and(|set| set.insert(id.clone()))
                    })
                    .unwrap_or(false);
                if joined {
                    report.containment_added += 1;
                    trace!(kind = %E::KIND, uuid = %uuid, child = %id, "repaired containment");
                }
            }
        }

        report
    }
}

/// A missing back-link or containment membership found by a consistency
/// check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkViolation {
    /// Kind of the entity declaring the link.
    pub owner_kind: EntityKind,
    /// Entity declaring the link.
    pub owner: ObjectId,
    /// Kind of the entity that should reflect it.
    pub peer_kind: EntityKind,
    /// Entity that should reflect it.
    pub peer: ObjectId,
    /// Whether the link is a reference or a containment membership.
    pub relation: Relation,
}

/// The relation a [`LinkViolation`] concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// A forward reference missing from the peer's back-reference set.
    Reference,
    /// A child whose parent's containment set does not list it.
    Containment,
}

/// Kind-erased view of a registry, used by the manager to reach peers whose
/// kind is only known at runtime.
pub(crate) trait KindRegistry: Send + Sync {
    fn kind(&self) -> EntityKind;
    fn len(&self) -> usize;
    fn stats(&self) -> &RegistryStats;
    fn ids(&self) -> Vec<ObjectId>;

    fn upsert(&self, manager: &ConfigManager, uuid: &ObjectId) -> Result<NotificationOutcome>;
    fn remove(&self, manager: &ConfigManager, uuid: &ObjectId) -> Result<NotificationOutcome>;
    fn adopt(&self, manager: &ConfigManager, uuid: &ObjectId) -> RepairReport;

    /// Record in `target`'s back-reference set for `peer` that `id` links to it.
    fn add_back_ref(&self, target: &ObjectId, peer: EntityKind, id: &ObjectId) -> BackLink;
    /// Drop `id` from `target`'s back-reference set for `peer`.
    fn remove_back_ref(&self, target: &ObjectId, peer: EntityKind, id: &ObjectId) -> BackLink;
    /// Drop the torn-down `id` from `target` in both directions.
    fn forget(&self, target: &ObjectId, peer: EntityKind, id: &ObjectId) -> BackLink;
    /// Insert `id` into `parent`'s containment set for `child`.
    fn add_child(&self, parent: &ObjectId, child: EntityKind, id: &ObjectId) -> BackLink;
    /// Remove `id` from `parent`'s containment set for `child`.
    fn remove_child(&self, parent: &ObjectId, child: EntityKind, id: &ObjectId) -> BackLink;

    /// Entities whose forward slot for `peer` names `target`.
    fn referrers(&self, peer: EntityKind, target: &ObjectId) -> Vec<ObjectId>;
    /// Whether `owner`'s forward slot for `peer` names `target`.
    fn references(&self, owner: &ObjectId, peer: EntityKind, target: &ObjectId) -> bool;
    /// Entities whose container is `(parent_kind, parent)`.
    fn contained_in(&self, parent_kind: EntityKind, parent: &ObjectId) -> Vec<ObjectId>;
    /// Every `(owner, peer kind, target)` held in any forward slot.
    fn forward_links(&self) -> Vec<(ObjectId, EntityKind, ObjectId)>;
    /// Every `(child, parent kind, parent)` containment declaration.
    fn containers(&self) -> Vec<(ObjectId, EntityKind, ObjectId)>;
    /// Whether `target`'s back-reference set for `peer` lists `id`; `None`
    /// when the target is unregistered or keeps no such set.
    fn has_link(&self, target: &ObjectId, peer: EntityKind, id: &ObjectId) -> Option<bool>;
    /// Whether `parent`'s containment set for `child` lists `id`; `None` when
    /// the parent is unregistered.
    fn has_child(&self, parent: &ObjectId, child: EntityKind, id: &ObjectId) -> Option<bool>;
}

impl<E: ConfigEntity> KindRegistry for EntityRegistry<E> {
    fn kind(&self) -> EntityKind {
        E::KIND
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    fn ids(&self) -> Vec<ObjectId> {
        EntityRegistry::ids(self)
    }

    fn upsert(&self, manager: &ConfigManager, uuid: &ObjectId) -> Result<NotificationOutcome> {
        EntityRegistry::upsert(self, manager, uuid)
    }

    fn remove(&self, manager: &ConfigManager, uuid: &ObjectId) -> Result<NotificationOutcome> {
        EntityRegistry::remove(self, manager, uuid)
    }

    fn adopt(&self, manager: &ConfigManager, uuid: &ObjectId) -> RepairReport {
        EntityRegistry::adopt(self, manager, uuid)
    }

    fn add_back_ref(&self, target: &ObjectId, peer: EntityKind, id: &ObjectId) -> BackLink {
        match self.update(target, |entity| entity.links_mut().add_ref(peer, id)) {
            Some(true) => {
                self.stats.record_back_link_added();
                BackLink::Linked
            }
            Some(false) => BackLink::Undeclared,
            None => {
                self.stats.record_back_link_deferred();
                BackLink::Unresolved
            }
        }
    }

    fn remove_back_ref(&self, target: &ObjectId, peer: EntityKind, id: &ObjectId) -> BackLink {
        match self.update(target, |entity| entity.links_mut().delete_ref(peer, id)) {
            Some(true) => {
                self.stats.record_back_link_removed();
                BackLink::Linked
            }
            Some(false) => BackLink::Undeclared,
            None => BackLink::Unresolved,
        }
    }

    fn forget(&self, target: &ObjectId, peer: EntityKind, id: &ObjectId) -> BackLink {
        match self.update(target, |entity| entity.links_mut().forget(peer, id)) {
            Some(true) => {
                self.stats.record_back_link_removed();
                BackLink::Linked
            }
            Some(false) => BackLink::Undeclared,
            None => BackLink::Unresolved,
        }
    }

    fn add_child(&self, parent: &ObjectId, child: EntityKind, id: &ObjectId) -> BackLink {
        let written = self.update(parent, |entity| {
            entity.children_mut(child).map(|set| {
                set.insert(id.clone());
            })
        });
        match written {
            Some(Some(())) => BackLink::Linked,
            Some(None) => BackLink::Undeclared,
            None => BackLink::Unresolved,
        }
    }

    fn remove_child(&self, parent: &ObjectId, child: EntityKind, id: &ObjectId) -> BackLink {
        let written = self.update(parent, |entity| {
            entity.children_mut(child).map(|set| {
                set.remove(id);
            })
        });
        match written {
            Some(Some(())) => BackLink::Linked,
            Some(None) => BackLink::Undeclared,
            None => BackLink::Unresolved,
        }
    }

    fn referrers(&self, peer: EntityKind, target: &ObjectId) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self
            .entries
            .iter()
            .filter(|r| {
                r.value()
                    .links()
                    .slot(peer)
                    .is_some_and(|slot| slot.contains(target))
            })
            .map(|r| r.key().clone())
            .collect();
        ids.sort();
        ids
    }

    fn references(&self, owner: &ObjectId, peer: EntityKind, target: &ObjectId) -> bool {
        self.with(owner, |entity| {
            entity
                .links()
                .slot(peer)
                .is_some_and(|slot| slot.contains(target))
        })
        .unwrap_or(false)
    }

    fn contained_in(&self, parent_kind: EntityKind, parent: &ObjectId) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self
            .entries
            .iter()
            .filter(|r| {
                r.value()
                    .container()
                    .is_some_and(|(kind, id)| kind == parent_kind && &id == parent)
            })
            .map(|r| r.key().clone())
            .collect();
        ids.sort();
        ids
    }

    fn forward_links(&self) -> Vec<(ObjectId, EntityKind, ObjectId)> {
        let mut links = Vec::new();
        for entry in self.entries.iter() {
            for (peer, slot) in entry.value().links().iter() {
                for target in slot.targets() {
                    links.push((entry.key().clone(), peer, target.clone()));
                }
            }
        }
        links.sort();
        links
    }

    fn containers(&self) -> Vec<(ObjectId, EntityKind, ObjectId)> {
        let mut containers: Vec<_> = self
            .entries
            .iter()
            .filter_map(|r| {
                r.value()
                    .container()
                    .map(|(kind, parent)| (r.key().clone(), kind, parent))
            })
            .collect();
        containers.sort();
        containers
    }

    fn has_link(&self, target: &ObjectId, peer: EntityKind, id: &ObjectId) -> Option<bool> {
        self.with(target, |entity| {
            entity.links().back_refs(peer).map(|referrers| referrers.contains(id))
        })
        .flatten()
    }

    fn has_child(&self, parent: &ObjectId, child: EntityKind, id: &ObjectId) -> Option<bool> {
        self.with(parent, |entity| entity.children(child).map(|set| set.contains(id)))
            .flatten()
    }
}
