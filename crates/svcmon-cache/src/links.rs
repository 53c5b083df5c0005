//! Reference slots, back-reference sets and the set-reconciliation diff.
//!
//! A [`LinkTable`] holds two things for its owner:
//!
//! - one forward [`LinkSlot`] per peer kind declared in the owner's schema,
//!   written only by the owner's own refresh from its freshly read record;
//! - one back-reference set per kind that declares a link to the owner,
//!   written only by those peers as their own references change.
//!
//! Reconciliation never touches other entities directly. It returns a
//! [`LinkDelta`] listing which peers gained and lost this entity, and the
//! manager applies that delta to the peers' back-reference sets.

use std::collections::{BTreeMap, BTreeSet};

use svcmon_core::{Cardinality, EntityKind, ObjectId, ObjectRecord};

/// Contents of one declared link slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LinkSlot {
    /// Optional single target.
    Single(Option<ObjectId>),
    /// Target set.
    Multiple(BTreeSet<ObjectId>),
}

impl LinkSlot {
    fn empty(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::Single => Self::Single(None),
            Cardinality::Multiple => Self::Multiple(BTreeSet::new()),
        }
    }

    /// Iterate over every target in the slot.
    pub fn targets(&self) -> impl Iterator<Item = &ObjectId> {
        let (single, multiple) = match self {
            Self::Single(target) => (target.as_ref(), None),
            Self::Multiple(targets) => (None, Some(targets.iter())),
        };
        single.into_iter().chain(multiple.into_iter().flatten())
    }

    /// Check whether the slot names `id`.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        match self {
            Self::Single(target) => target.as_ref() == Some(id),
            Self::Multiple(targets) => targets.contains(id),
        }
    }

    /// Check if the slot holds no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(target) => target.is_none(),
            Self::Multiple(targets) => targets.is_empty(),
        }
    }
}

/// Change to one slot, expressed as peers to link and unlink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkDelta {
    /// Peer kind of the slot.
    pub peer: EntityKind,
    /// Targets newly referenced.
    pub added: Vec<ObjectId>,
    /// Targets no longer referenced.
    pub removed: Vec<ObjectId>,
}

impl LinkDelta {
    fn new(peer: EntityKind) -> Self {
        Self {
            peer,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Check if the delta changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Link slots and back-reference sets of one entity.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeSet;
/// use svcmon_cache::LinkTable;
/// use svcmon_core::{EntityKind, ObjectId};
///
/// let mut links = LinkTable::for_kind(EntityKind::HealthMonitor);
/// let pools: BTreeSet<_> = ["p1", "p2"].into_iter().map(ObjectId::from).collect();
///
/// let delta = links.update_multiple(EntityKind::LoadBalancerPool, pools);
/// assert_eq!(delta.added.len(), 2);
/// assert!(delta.removed.is_empty());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkTable {
    owner: EntityKind,
    /// Forward references read from the owner's record.
    slots: BTreeMap<EntityKind, LinkSlot>,
    /// Referrers per kind, maintained by peers.
    back_refs: BTreeMap<EntityKind, BTreeSet<ObjectId>>,
}

impl LinkTable {
    /// Create the empty slots and back-reference sets declared for `kind`.
    #[must_use]
    pub fn for_kind(kind: EntityKind) -> Self {
        let slots = kind
            .links()
            .iter()
            .map(|spec| (spec.peer, LinkSlot::empty(spec.cardinality)))
            .collect();
        let back_refs = kind
            .referrer_kinds()
            .map(|peer| (peer, BTreeSet::new()))
            .collect();
        Self {
            owner: kind,
            slots,
            back_refs,
        }
    }

    /// Kind owning the table.
    #[inline]
    #[must_use]
    pub fn owner(&self) -> EntityKind {
        self.owner
    }

    /// Get the forward slot for a peer kind, if declared.
    #[must_use]
    pub fn slot(&self, peer: EntityKind) -> Option<&LinkSlot> {
        self.slots.get(&peer)
    }

    /// Target of a single-valued forward slot.
    #[must_use]
    pub fn reference(&self, peer: EntityKind) -> Option<&ObjectId> {
        match self.slots.get(&peer) {
            Some(LinkSlot::Single(target)) => target.as_ref(),
            _ => None,
        }
    }

    /// Entities of kind `peer` known to reference the owner.
    #[must_use]
    pub fn back_refs(&self, peer: EntityKind) -> Option<&BTreeSet<ObjectId>> {
        self.back_refs.get(&peer)
    }

    /// The one entity of kind `peer` linked to the owner.
    ///
    /// The owner's own reference wins; otherwise the lowest referrer uuid.
    #[must_use]
    pub fn single(&self, peer: EntityKind) -> Option<&ObjectId> {
        self.reference(peer)
            .or_else(|| self.back_refs.get(&peer).and_then(BTreeSet::first))
    }

    /// Every entity of kind `peer` linked to the owner in either direction.
    #[must_use]
    pub fn linked(&self, peer: EntityKind) -> BTreeSet<ObjectId> {
        let mut linked: BTreeSet<ObjectId> = self
            .slots
            .get(&peer)
            .map(|slot| slot.targets().cloned().collect())
            .unwrap_or_default();
        if let Some(referrers) = self.back_refs.get(&peer) {
            linked.extend(referrers.iter().cloned());
        }
        linked
    }

    /// Iterate over forward `(peer kind, slot)` pairs in declared-kind order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &LinkSlot)> {
        self.slots.iter().map(|(kind, slot)| (*kind, slot))
    }

    /// Total number of forward targets and referrers.
    #[must_use]
    pub fn len(&self) -> usize {
        let forward: usize = self.slots.values().map(|slot| slot.targets().count()).sum();
        let back: usize = self.back_refs.values().map(BTreeSet::len).sum();
        forward + back
    }

    /// Check if every slot and back-reference set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.values().all(LinkSlot::is_empty)
            && self.back_refs.values().all(BTreeSet::is_empty)
    }

    /// Replace a single-valued slot.
    ///
    /// An unchanged target yields an empty delta. Passing `None` clears the
    /// slot.
    pub fn update_single(&mut self, peer: EntityKind, new: Option<ObjectId>) -> LinkDelta {
        let mut delta = LinkDelta::new(peer);
        let Some(LinkSlot::Single(current)) = self.slots.get_mut(&peer) else {
            return delta;
        };
        if *current == new {
            return delta;
        }
        if let Some(old) = current.take() {
            delta.removed.push(old);
        }
        if let Some(target) = new {
            delta.added.push(target.clone());
            *current = Some(target);
        }
        delta
    }

    /// Replace a multi-valued slot with `new`, returning the set difference.
    ///
    /// Targets present before and after are left alone.
    pub fn update_multiple(&mut self, peer: EntityKind, new: BTreeSet<ObjectId>) -> LinkDelta {
        let mut delta = LinkDelta::new(peer);
        let Some(LinkSlot::Multiple(current)) = self.slots.get_mut(&peer) else {
            return delta;
        };
        delta.removed = current.difference(&new).cloned().collect();
        delta.added = new.difference(current).cloned().collect();
        *current = new;
        delta
    }

    /// Reconcile every forward slot against a freshly read record.
    ///
    /// Slots are visited in declared order; only non-empty deltas are
    /// returned. Back-reference sets are left alone.
    pub fn reconcile(&mut self, record: &ObjectRecord<'_>) -> Vec<LinkDelta> {
        self.owner
            .links()
            .iter()
            .map(|spec| match spec.cardinality {
                Cardinality::Single => self.update_single(spec.peer, record.single_ref(spec.peer)),
                Cardinality::Multiple => {
                    self.update_multiple(spec.peer, record.multiple_refs(spec.peer))
                }
            })
            .filter(|delta| !delta.is_empty())
            .collect()
    }

    /// Empty every slot and back-reference set.
    ///
    /// Returns each `(peer kind, uuid)` the owner was linked to in either
    /// direction, once, so tear-down can unlink it from every peer.
    pub fn detach(&mut self) -> Vec<(EntityKind, ObjectId)> {
        let mut linked = BTreeSet::new();
        for (peer, slot) in &mut self.slots {
            linked.extend(slot.targets().map(|target| (*peer, target.clone())));
            match slot {
                LinkSlot::Single(target) => *target = None,
                LinkSlot::Multiple(targets) => targets.clear(),
            }
        }
        for (peer, referrers) in &mut self.back_refs {
            linked.extend(referrers.iter().map(|id| (*peer, id.clone())));
            referrers.clear();
        }
        linked.into_iter().collect()
    }

    /// Record that `id` of kind `peer` now references the owner.
    ///
    /// Returns `false` when `peer` declares no link to the owner's kind.
    pub fn add_ref(&mut self, peer: EntityKind, id: &ObjectId) -> bool {
        match self.back_refs.get_mut(&peer) {
            Some(referrers) => {
                referrers.insert(id.clone());
                true
            }
            None => false,
        }
    }

    /// Add a missing back-reference, returning `true` when it was absent.
    pub fn repair_ref(&mut self, peer: EntityKind, id: &ObjectId) -> bool {
        self.back_refs
            .get_mut(&peer)
            .is_some_and(|referrers| referrers.insert(id.clone()))
    }

    /// Record that `id` of kind `peer` no longer references the owner.
    ///
    /// Returns `false` when `peer` declares no link to the owner's kind.
    pub fn delete_ref(&mut self, peer: EntityKind, id: &ObjectId) -> bool {
        match self.back_refs.get_mut(&peer) {
            Some(referrers) => {
                referrers.remove(id);
                true
            }
            None => false,
        }
    }

    /// Forget `id` of kind `peer` entirely, after it was torn down.
    ///
    /// Drops it from the back-reference set and from the forward slot, so
    /// the owner is left without a dangling reference. Returns `false` when
    /// the owner has neither a slot nor a back-reference set for `peer`.
    pub fn forget(&mut self, peer: EntityKind, id: &ObjectId) -> bool {
        let back = self.delete_ref(peer, id);
        let forward = match self.slots.get_mut(&peer) {
            Some(LinkSlot::Single(target)) => {
                if target.as_ref() == Some(id) {
                    *target = None;
                }
                true
            }
            Some(LinkSlot::Multiple(targets)) => {
                targets.remove(id);
                true
            }
            None => false,
        };
        back || forward
    }
}
