//! Self-validating configuration fields.
//!
//! A [`Field`] holds one opaque JSON value and only ever holds a value its
//! own [`FieldKind`] accepted. Fields are grouped into [`FieldSet`]s: one
//! top-level set shared across filters (the bounding box of the current
//! viewport, typically) and one private set per filter.

mod place_types;

pub use place_types::{is_place_type, PLACE_TYPES};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// The rectangular query area shared by filters fetching for a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top_left_lat: f64,
    pub top_left_lng: f64,
    pub bottom_right_lat: f64,
    pub bottom_right_lng: f64,
}

const BOUNDING_BOX_KEYS: [&str; 4] = [
    "top_left_lat",
    "top_left_lng",
    "bottom_right_lat",
    "bottom_right_lng",
];

/// Validation behaviour of a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Accepts any value. Sentinel default: `null`.
    Any,
    /// A rectangle descriptor with four numeric corners.
    /// Sentinel default: the all-zero box.
    BoundingBox,
    /// An array of strings drawn from [`PLACE_TYPES`].
    /// Sentinel default: the empty array.
    PlaceTypes,
}

impl FieldKind {
    /// The kind's sentinel default, always valid for the kind itself.
    pub fn default_value(&self) -> Value {
        match self {
            FieldKind::Any => Value::Null,
            FieldKind::BoundingBox => json!({
                "top_left_lat": 0.0,
                "top_left_lng": 0.0,
                "bottom_right_lat": 0.0,
                "bottom_right_lng": 0.0,
            }),
            FieldKind::PlaceTypes => json!([]),
        }
    }

    /// Pure validation predicate.
    pub fn validate(&self, candidate: &Value) -> bool {
        match self {
            FieldKind::Any => true,
            FieldKind::BoundingBox => candidate.as_object().is_some_and(|obj| {
                BOUNDING_BOX_KEYS
                    .iter()
                    .all(|key| obj.get(*key).is_some_and(Value::is_number))
            }),
            FieldKind::PlaceTypes => candidate.as_array().is_some_and(|items| {
                items
                    .iter()
                    .all(|item| item.as_str().is_some_and(is_place_type))
            }),
        }
    }
}

/// A named, self-validating value holder.
///
/// Invariant: `value` only ever holds a value for which the kind's
/// `validate` returned true at the time of assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    kind: FieldKind,
    value: Value,
}

impl Field {
    /// A field holding its kind's sentinel default.
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            value: kind.default_value(),
        }
    }

    /// A field initialized with `initial`, falling back to the sentinel
    /// default when `initial` does not validate.
    pub fn with_value(kind: FieldKind, initial: Value) -> Self {
        let mut field = Self::new(kind);
        if !field.set(initial) {
            debug!(?kind, "initial field value rejected, keeping default");
        }
        field
    }

    /// The field's validation behaviour.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The current value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Pure validation predicate for this field.
    pub fn validate(&self, candidate: &Value) -> bool {
        self.kind.validate(candidate)
    }

    /// Validate-then-assign. Returns false and leaves the value unchanged
    /// when `candidate` does not validate; invalid input is never an error.
    pub fn set(&mut self, candidate: Value) -> bool {
        if self.validate(&candidate) {
            self.value = candidate;
            true
        } else {
            false
        }
    }
}

/// Outcome of [`FieldSet::apply`], used for deserialization tallying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The field exists and accepted the value.
    Updated,
    /// No field with that name.
    Unknown,
    /// The field exists but rejected the value.
    Rejected,
}

/// A named collection of fields, shareable between the engine and the
/// fetch contexts handed to filters.
#[derive(Debug, Default)]
pub struct FieldSet {
    fields: RwLock<HashMap<String, Field>>,
}

impl FieldSet {
    /// A set over the given fields. The set of names is fixed afterwards;
    /// only values change.
    pub fn new(fields: HashMap<String, Field>) -> Self {
        Self {
            fields: RwLock::new(fields),
        }
    }

    /// Whether a field with this name exists.
    pub async fn contains(&self, name: &str) -> bool {
        self.fields.read().await.contains_key(name)
    }

    /// Clone of the named field's current value.
    pub async fn value(&self, name: &str) -> Option<Value> {
        self.fields.read().await.get(name).map(|f| f.value().clone())
    }

    /// Validate-then-assign on the named field. Returns false for an
    /// unknown name or a rejected value.
    pub async fn set(&self, name: &str, candidate: Value) -> bool {
        self.apply(name, candidate).await == SetOutcome::Updated
    }

    /// Like [`FieldSet::set`] but distinguishing unknown names from
    /// rejected values, so deserialization can tally each separately.
    pub async fn apply(&self, name: &str, candidate: Value) -> SetOutcome {
        let mut guard = self.fields.write().await;
        match guard.get_mut(name) {
            None => SetOutcome::Unknown,
            Some(field) => {
                if field.set(candidate) {
                    SetOutcome::Updated
                } else {
                    SetOutcome::Rejected
                }
            }
        }
    }

    /// The named field decoded as a [`BoundingBox`], when it holds one.
    pub async fn bounding_box(&self, name: &str) -> Option<BoundingBox> {
        let value = self.value(name).await?;
        serde_json::from_value(value).ok()
    }

    /// The named field decoded as a list of strings, when it holds one.
    pub async fn string_list(&self, name: &str) -> Option<Vec<String>> {
        let value = self.value(name).await?;
        serde_json::from_value(value).ok()
    }

    /// All current values as a JSON object keyed by field name.
    pub async fn to_value(&self) -> Value {
        let guard = self.fields.read().await;
        let mut map = Map::new();
        for (name, field) in guard.iter() {
            map.insert(name.clone(), field.value().clone());
        }
        Value::Object(map)
    }
}
