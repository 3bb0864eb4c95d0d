//! Document addressing and field-level write semantics
//!
//! Documents are JSON objects addressed by `collection/id`. Writes are
//! expressed as lists of `(field path, value)` pairs so that partial updates
//! never clobber fields they do not name:
//!
//! - `set` without merge replaces the whole document.
//! - `set` with merge deep-merges object values and assigns everything else.
//! - `update` assigns each path and requires the document to exist.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::StoreError;

/// Address of a single document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocRef {
    pub collection: String,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Path to a (possibly nested) field inside a document.
///
/// Built from segments so that keys containing dots (challenge ids, for
/// example) can be addressed without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.segments.is_empty() || self.segments.iter().any(|s| s.is_empty()) {
            return Err(StoreError::InvalidFieldPath(self.to_string()));
        }
        Ok(())
    }
}

/// Dotted notation, e.g. `"stats.xp"`
impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::from_segments(path.split('.'))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Value written to a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Literal JSON value
    Value(Value),
    /// Atomic numeric delta applied to the value present at commit time.
    /// Missing or non-numeric fields count as zero.
    Increment(i64),
    /// Resolved to the commit timestamp
    ServerTimestamp,
}

macro_rules! literal_field_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

literal_field_value!(Value, bool, i32, i64, u32, u64, String, &str);

/// Ordered list of field writes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(FieldPath, FieldValue)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<FieldPath>, value: impl Into<FieldValue>) -> Self {
        self.0.push((path.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(FieldPath, FieldValue)> {
        self.0.iter()
    }
}

/// A buffered write inside a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        doc: DocRef,
        fields: Fields,
        merge: bool,
    },
    Update {
        doc: DocRef,
        fields: Fields,
    },
}

impl WriteOp {
    pub fn doc(&self) -> &DocRef {
        match self {
            Self::Set { doc, .. } | Self::Update { doc, .. } => doc,
        }
    }
}

/// Format used for resolved server timestamps
pub fn timestamp_value(now: DateTime<Utc>) -> Value {
    Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Apply one write to the current state of its document.
pub fn apply_write(
    current: Option<Value>,
    op: &WriteOp,
    now: DateTime<Utc>,
) -> Result<Value, StoreError> {
    match op {
        WriteOp::Set {
            fields,
            merge: false,
            ..
        } => {
            let mut doc = Value::Object(Map::new());
            apply_fields(&mut doc, fields, now, false)?;
            Ok(doc)
        }
        WriteOp::Set {
            fields,
            merge: true,
            ..
        } => {
            let mut doc = match current {
                Some(value @ Value::Object(_)) => value,
                _ => Value::Object(Map::new()),
            };
            apply_fields(&mut doc, fields, now, true)?;
            Ok(doc)
        }
        WriteOp::Update { doc: doc_ref, fields } => {
            let mut doc = current.ok_or_else(|| StoreError::NotFound(doc_ref.to_string()))?;
            apply_fields(&mut doc, fields, now, false)?;
            Ok(doc)
        }
    }
}

fn apply_fields(
    doc: &mut Value,
    fields: &Fields,
    now: DateTime<Utc>,
    merge: bool,
) -> Result<(), StoreError> {
    for (path, value) in fields.iter() {
        path.validate()?;
        let slot = slot_mut(doc, path);
        match value {
            FieldValue::Value(v) if merge => deep_merge(slot, v.clone()),
            FieldValue::Value(v) => *slot = v.clone(),
            FieldValue::Increment(delta) => *slot = increment(slot, *delta),
            FieldValue::ServerTimestamp => *slot = timestamp_value(now),
        }
    }
    Ok(())
}

/// Walk to the field at `path`, creating intermediate objects (and replacing
/// non-object intermediates) along the way. Missing leaves become `null`.
fn slot_mut<'a>(root: &'a mut Value, path: &FieldPath) -> &'a mut Value {
    let mut node = root;
    for segment in path.segments() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            unreachable!("node was just made an object");
        };
        node = map.entry(segment.clone()).or_insert(Value::Null);
    }
    node
}

fn increment(existing: &Value, delta: i64) -> Value {
    match existing {
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            let base = n.as_i64().unwrap_or(i64::MAX);
            Value::from(base.saturating_add(delta))
        }
        Value::Number(n) => {
            let base = n.as_f64().unwrap_or_default();
            serde_json::Number::from_f64(base + delta as f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::from(delta))
        }
        _ => Value::from(delta),
    }
}

/// Recursively merge `patch` into `target`. Objects merge key by key, any
/// other value replaces what was there.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match target_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Read the field at `path`, if present.
pub fn get_at_path<'a>(doc: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(doc, |node, segment| node.as_object()?.get(segment))
}
