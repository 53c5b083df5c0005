//! Raw and validated views of a config object.
//!
//! The config server hands back an [`AttributeMap`]: a loosely typed JSON
//! object. [`ObjectRecord::parse`] validates the fields every kind shares and
//! extracts reference and containment lists for the kind's declared schema,
//! so nothing downstream touches the untyped map except through typed
//! accessors.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::trace;

use crate::{EntityKind, ObjectId, Result, SvcMonError};

/// A config object as read from the config server.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use svcmon_core::AttributeMap;
///
/// let attrs = AttributeMap::new()
///     .with("fq_name", json!(["default-domain", "admin", "web"]))
///     .with("display_name", json!("web"));
///
/// assert!(attrs.contains("fq_name"));
/// assert_eq!(attrs.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeMap(Map<String, Value>);

impl AttributeMap {
    /// Create an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning the map for chaining.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    /// Set a field in place.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Get a raw field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Check if a field is present.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the map has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for AttributeMap {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for AttributeMap {
    type Error = Value;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// Schema-validated view of an [`AttributeMap`] for one kind.
///
/// Parsing fails with [`SvcMonError::MalformedObject`] before any registry
/// is touched, so a bad record never leaves an entity half-updated.
#[derive(Debug, Clone)]
pub struct ObjectRecord<'a> {
    kind: EntityKind,
    uuid: ObjectId,
    fq_name: Vec<String>,
    display_name: String,
    parent_uuid: Option<ObjectId>,
    parent_type: Option<String>,
    refs: BTreeMap<EntityKind, Vec<ObjectId>>,
    children: BTreeMap<EntityKind, BTreeSet<ObjectId>>,
    attrs: &'a AttributeMap,
}

impl<'a> ObjectRecord<'a> {
    /// Validate the shared fields of `attrs` and extract its links.
    pub fn parse(kind: EntityKind, uuid: &ObjectId, attrs: &'a AttributeMap) -> Result<Self> {
        let fq_name: Vec<String> = required(kind, uuid, attrs, "fq_name")?;
        if fq_name.is_empty() {
            return Err(SvcMonError::malformed(kind, uuid, "fq_name is empty"));
        }

        let display_name: Option<String> = optional(kind, uuid, attrs, "display_name")?;
        let parent_uuid: Option<ObjectId> = optional(kind, uuid, attrs, "parent_uuid")?;
        let parent_type: Option<String> = optional(kind, uuid, attrs, "parent_type")?;

        let mut refs = BTreeMap::new();
        for spec in kind.links() {
            let targets = ref_list(kind, uuid, attrs, &spec.peer.refs_field())?
                .or(ref_list(kind, uuid, attrs, &spec.peer.back_refs_field())?)
                .unwrap_or_default();
            refs.insert(spec.peer, targets);
        }

        let mut children = BTreeMap::new();
        for child in kind.children() {
            let ids = ref_list(kind, uuid, attrs, &child.children_field())?.unwrap_or_default();
            children.insert(*child, ids.into_iter().collect());
        }

        trace!(kind = %kind, uuid = %uuid, fields = attrs.len(), "parsed object record");

        Ok(Self {
            kind,
            uuid: uuid.clone(),
            fq_name,
            display_name: display_name.unwrap_or_default(),
            parent_uuid,
            parent_type,
            refs,
            children,
            attrs,
        })
    }

    /// Kind the record was parsed for.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Uuid the record was read for.
    #[must_use]
    pub fn uuid(&self) -> &ObjectId {
        &self.uuid
    }

    /// Fully qualified name path.
    #[must_use]
    pub fn fq_name(&self) -> &[String] {
        &self.fq_name
    }

    /// Display name; empty when the server sent none.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Uuid of the owning parent, if any.
    #[must_use]
    pub fn parent_uuid(&self) -> Option<&ObjectId> {
        self.parent_uuid.as_ref()
    }

    /// Parent type tag (`physical-router`, `project`, ...), if any.
    #[must_use]
    pub fn parent_type(&self) -> Option<&str> {
        self.parent_type.as_deref()
    }

    /// Parent uuid, failing when the kind requires one and it is absent.
    pub fn require_parent(&self) -> Result<ObjectId> {
        self.parent_uuid
            .clone()
            .ok_or_else(|| SvcMonError::malformed(self.kind, &self.uuid, "missing parent_uuid"))
    }

    /// Targets listed for a declared peer kind, in server order.
    #[must_use]
    pub fn refs(&self, peer: EntityKind) -> &[ObjectId] {
        self.refs.get(&peer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First target listed for a declared peer kind.
    #[must_use]
    pub fn single_ref(&self, peer: EntityKind) -> Option<ObjectId> {
        self.refs(peer).first().cloned()
    }

    /// Full target set listed for a declared peer kind.
    #[must_use]
    pub fn multiple_refs(&self, peer: EntityKind) -> BTreeSet<ObjectId> {
        self.refs(peer).iter().cloned().collect()
    }

    /// Embedded child uuids of the given kind.
    #[must_use]
    pub fn children(&self, child: EntityKind) -> BTreeSet<ObjectId> {
        self.children.get(&child).cloned().unwrap_or_default()
    }

    /// Deserialize a required kind-specific field.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        required(self.kind, &self.uuid, self.attrs, name)
    }

    /// Deserialize an optional kind-specific field; `null` counts as absent.
    pub fn optional_field<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        optional(self.kind, &self.uuid, self.attrs, name)
    }
}

fn required<T: DeserializeOwned>(
    kind: EntityKind,
    uuid: &ObjectId,
    attrs: &AttributeMap,
    name: &str,
) -> Result<T> {
    optional(kind, uuid, attrs, name)?
        .ok_or_else(|| SvcMonError::malformed(kind, uuid, format!("missing {name}")))
}

fn optional<T: DeserializeOwned>(
    kind: EntityKind,
    uuid: &ObjectId,
    attrs: &AttributeMap,
    name: &str,
) -> Result<Option<T>> {
    match attrs.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| SvcMonError::malformed(kind, uuid, format!("invalid {name}: {e}"))),
    }
}

/// Reads a list of `{"uuid": ...}` entries.
fn ref_list(
    kind: EntityKind,
    uuid: &ObjectId,
    attrs: &AttributeMap,
    name: &str,
) -> Result<Option<Vec<ObjectId>>> {
    #[derive(serde::Deserialize)]
    struct RefEntry {
        uuid: ObjectId,
    }

    let entries: Option<Vec<RefEntry>> = optional(kind, uuid, attrs, name)?;
    Ok(entries
        .filter(|entries| !entries.is_empty())
        .map(|entries| entries.into_iter().map(|e| e.uuid).collect()))
}
