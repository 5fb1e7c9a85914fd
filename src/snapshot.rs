//! Read-only views over a resource's configuration during an update.
//!
//! [`ConfigSnapshot`] is the accessor the patch reconciler consults: per
//! dotted path, has the value changed since the last apply, and does it hold
//! anything now. [`ResourceDiff`] implements it over a prior and a planned
//! state document.
//!
//! Paths use `.` between segments. Single nested blocks are JSON objects and
//! are addressed by name; list blocks and list attributes are addressed by a
//! numeric index, e.g. `support.escalation_contacts.0.email`.

use serde_json::{Map, Value};

use crate::schema::Schema;

/// Per-path change and presence flags for one invocation.
pub trait ConfigSnapshot {
    /// True if the value at `path` differs from the last-applied state.
    fn has_change(&self, path: &str) -> bool;

    /// True if the value at `path` currently holds a non-empty value.
    fn is_present(&self, path: &str) -> bool;
}

/// The prior and planned state of one resource.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDiff<'a> {
    schema: &'a Schema,
    prior: &'a Value,
    planned: &'a Value,
}

impl<'a> ResourceDiff<'a> {
    /// Create a snapshot over `prior` (last-applied) and `planned` (desired) state.
    pub fn new(schema: &'a Schema, prior: &'a Value, planned: &'a Value) -> Self {
        Self {
            schema,
            prior,
            planned,
        }
    }

    /// The last-applied state.
    pub fn prior(&self) -> &'a Value {
        self.prior
    }

    /// The desired state.
    pub fn planned(&self) -> &'a Value {
        self.planned
    }

    /// The planned value at `path`, if it is present.
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        self.check_path(path);
        lookup(self.planned, path).filter(|v| !is_empty(v))
    }

    /// The planned string at `path`, if present.
    pub fn get_str(&self, path: &str) -> Option<&'a str> {
        self.get(path).and_then(Value::as_str)
    }

    fn check_path(&self, path: &str) {
        debug_assert!(
            self.schema.block.resolves(path),
            "path '{}' is not declared in the resource schema",
            path
        );
    }
}

impl ConfigSnapshot for ResourceDiff<'_> {
    fn has_change(&self, path: &str) -> bool {
        self.check_path(path);
        let before = lookup(self.prior, path).and_then(normalize);
        let after = lookup(self.planned, path).and_then(normalize);
        before != after
    }

    fn is_present(&self, path: &str) -> bool {
        self.get(path).is_some()
    }
}

/// Resolve a dotted path inside a JSON document.
pub fn lookup<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Whether a value counts as unset.
///
/// Null, empty strings, empty lists and objects whose members are all empty
/// are unset. Booleans and numbers are always set, so `false` and `0` are
/// real values rather than "cleared".
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_empty),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Strip empty members recursively; `None` if nothing remains.
pub fn normalize(value: &Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k.clone(), v)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        Value::Array(items) => {
            // Element positions are significant, so empty elements stay as null.
            let kept: Vec<Value> = items
                .iter()
                .map(|v| normalize(v).unwrap_or(Value::Null))
                .collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        other if is_empty(other) => None,
        other => Some(other.clone()),
    }
}
