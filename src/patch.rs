//! Merge-patch reconciliation.
//!
//! Update payloads are built in two steps. First the changed fields are copied
//! into a patch-values struct whose optional members are skipped when `None`,
//! and [`as_patch`] serializes it into a sparse map. That map cannot express
//! "this field was removed": an attribute deleted from configuration and an
//! attribute that was never touched both come out absent.
//!
//! [`reconcile`] fixes this by walking a static [`FieldSpec`] table against a
//! [`ConfigSnapshot`]. Every field ends up in exactly one [`FieldOutcome`]:
//!
//! | present | changed | outcome                     | in the payload        |
//! |---------|---------|-----------------------------|-----------------------|
//! | no      | yes     | [`FieldOutcome::Cleared`]   | `null`                |
//! | no      | no      | [`FieldOutcome::Untouched`] | key removed           |
//! | yes     | -       | [`FieldOutcome::Assigned`]  | sparse value, recursed into for composites |
//!
//! # Example
//!
//! ```
//! use partner_center_sell_provider::patch::{reconcile, FieldSpec};
//! use partner_center_sell_provider::snapshot::ConfigSnapshot;
//! use serde_json::{json, Map};
//!
//! struct Cleared;
//!
//! impl ConfigSnapshot for Cleared {
//!     fn has_change(&self, path: &str) -> bool {
//!         path == "tax_assessment"
//!     }
//!     fn is_present(&self, _path: &str) -> bool {
//!         false
//!     }
//! }
//!
//! static FIELDS: &[FieldSpec] = &[FieldSpec::scalar("tax_assessment"), FieldSpec::scalar("ero_class")];
//!
//! let patch = reconcile(Map::new(), &Cleared, FIELDS);
//! assert_eq!(serde_json::Value::Object(patch), json!({"tax_assessment": null}));
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::ProviderError;
use crate::snapshot::ConfigSnapshot;

/// A partial-update document: absent keys are left alone, `null` clears.
pub type MergePatch = Map<String, Value>;

/// Structural kind of a patchable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A leaf value. Lists of primitives are leaves too: they are replaced wholesale.
    Scalar,
    /// A single nested object with its own patchable fields.
    Object(&'static [FieldSpec]),
    /// A list of nested objects; every element is reconciled against these fields.
    List(&'static [FieldSpec]),
}

/// Declarative descriptor of one patchable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key in the payload and path segment in the snapshot.
    pub name: &'static str,
    /// Structural kind.
    pub kind: FieldKind,
}

impl FieldSpec {
    /// A leaf field.
    pub const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Scalar,
        }
    }

    /// A nested object field.
    pub const fn object(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self {
            name,
            kind: FieldKind::Object(fields),
        }
    }

    /// A list-of-objects field.
    pub const fn list(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self {
            name,
            kind: FieldKind::List(fields),
        }
    }
}

/// What a merge-patch must say about one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    /// Not declared as changed and empty: leave the server value alone.
    Untouched,
    /// Changed and now empty: the server must clear it.
    Cleared,
    /// Holds a value: send what the sparse differ produced.
    Assigned,
}

impl FieldOutcome {
    /// Classify the field at `path`.
    pub fn classify<S: ConfigSnapshot + ?Sized>(snapshot: &S, path: &str) -> Self {
        if snapshot.is_present(path) {
            Self::Assigned
        } else if snapshot.has_change(path) {
            Self::Cleared
        } else {
            Self::Untouched
        }
    }
}

/// Whether any top-level field in `fields` changed.
pub fn any_changed<S: ConfigSnapshot + ?Sized>(snapshot: &S, fields: &[FieldSpec]) -> bool {
    fields.iter().any(|field| snapshot.has_change(field.name))
}

/// Serialize a patch-values struct into a sparse merge-patch.
///
/// Fields skipped by serde (typically `None` with `skip_serializing_if`) do not
/// appear. Fails if `values` does not serialize to a JSON object.
pub fn as_patch<T: Serialize>(values: &T) -> Result<MergePatch, ProviderError> {
    match serde_json::to_value(values)? {
        Value::Object(map) => Ok(map),
        other => Err(ProviderError::InvalidRequest(format!(
            "patch values must serialize to an object, got {}",
            other
        ))),
    }
}

/// Correct a sparse patch so that removed fields are sent as explicit `null`.
///
/// `fields` is walked in declared order. Composite fields are only descended
/// into when the field is present and the sparse patch holds an object (or a
/// list of objects) under its key. Applying this twice with the same snapshot
/// yields the same document.
pub fn reconcile<S: ConfigSnapshot + ?Sized>(
    mut patch: MergePatch,
    snapshot: &S,
    fields: &[FieldSpec],
) -> MergePatch {
    reconcile_in(&mut patch, snapshot, fields, "");
    patch
}

fn reconcile_in<S: ConfigSnapshot + ?Sized>(
    patch: &mut MergePatch,
    snapshot: &S,
    fields: &[FieldSpec],
    prefix: &str,
) {
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.to_string()
        } else {
            format!("{}.{}", prefix, field.name)
        };

        match FieldOutcome::classify(snapshot, &path) {
            FieldOutcome::Cleared => {
                trace!(path = %path, "clearing field");
                patch.insert(field.name.to_string(), Value::Null);
            }
            FieldOutcome::Untouched => {
                patch.remove(field.name);
            }
            FieldOutcome::Assigned => match (field.kind, patch.get_mut(field.name)) {
                (FieldKind::Object(nested), Some(Value::Object(sub))) => {
                    reconcile_in(sub, snapshot, nested, &path);
                }
                (FieldKind::List(nested), Some(Value::Array(items))) => {
                    for (i, item) in items.iter_mut().enumerate() {
                        if let Value::Object(sub) = item {
                            reconcile_in(sub, snapshot, nested, &format!("{}.{}", path, i));
                        }
                    }
                }
                _ => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    /// Snapshot driven by explicit path sets.
    #[derive(Default)]
    struct FakeSnapshot {
        changed: HashSet<&'static str>,
        present: HashSet<&'static str>,
    }

    impl FakeSnapshot {
        fn changed(mut self, paths: &[&'static str]) -> Self {
            self.changed.extend(paths);
            self
        }

        fn present(mut self, paths: &[&'static str]) -> Self {
            self.present.extend(paths);
            self
        }
    }

    impl ConfigSnapshot for FakeSnapshot {
        fn has_change(&self, path: &str) -> bool {
            self.changed.contains(path)
        }

        fn is_present(&self, path: &str) -> bool {
            self.present.contains(path)
        }
    }

    static CONTACT: &[FieldSpec] = &[FieldSpec::scalar("name"), FieldSpec::scalar("email")];
    static ESCALATION: &[FieldSpec] = &[
        FieldSpec::scalar("name"),
        FieldSpec::scalar("email"),
        FieldSpec::scalar("role"),
    ];
    static SUPPORT: &[FieldSpec] = &[FieldSpec::list("escalation_contacts", ESCALATION)];
    static PRODUCT: &[FieldSpec] = &[
        FieldSpec::object("primary_contact", CONTACT),
        FieldSpec::scalar("eccn_number"),
        FieldSpec::scalar("ero_class"),
        FieldSpec::scalar("tax_assessment"),
        FieldSpec::object("support", SUPPORT),
    ];

    fn map(value: Value) -> MergePatch {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_cleared_scalar_becomes_null() {
        let snapshot = FakeSnapshot::default().changed(&["tax_assessment"]);
        let patch = reconcile(MergePatch::new(), &snapshot, PRODUCT);
        assert_eq!(patch.get("tax_assessment"), Some(&Value::Null));
    }

    #[test]
    fn test_cleared_overrides_sparse_value() {
        let snapshot = FakeSnapshot::default().changed(&["ero_class"]);
        let patch = reconcile(map(json!({"ero_class": ""})), &snapshot, PRODUCT);
        assert_eq!(patch.get("ero_class"), Some(&Value::Null));
    }

    #[test]
    fn test_unchanged_absent_is_removed() {
        let snapshot = FakeSnapshot::default();
        let patch = reconcile(map(json!({"ero_class": ""})), &snapshot, PRODUCT);
        assert!(!patch.contains_key("ero_class"));
        assert!(patch.is_empty());
    }

    #[test]
    fn test_present_scalar_passes_through() {
        let snapshot = FakeSnapshot::default()
            .changed(&["eccn_number"])
            .present(&["eccn_number"]);
        let patch = reconcile(map(json!({"eccn_number": "5D002"})), &snapshot, PRODUCT);
        assert_eq!(patch.get("eccn_number"), Some(&json!("5D002")));
    }

    #[test]
    fn test_nested_field_changed() {
        let snapshot = FakeSnapshot::default()
            .changed(&["primary_contact", "primary_contact.email"])
            .present(&["primary_contact", "primary_contact.name", "primary_contact.email"]);
        let sparse = map(json!({"primary_contact": {"name": "Pat", "email": "new@example.com"}}));

        let patch = reconcile(sparse, &snapshot, PRODUCT);
        assert_eq!(
            Value::Object(patch),
            json!({"primary_contact": {"name": "Pat", "email": "new@example.com"}})
        );
    }

    #[test]
    fn test_list_cleared_inside_present_object() {
        let snapshot = FakeSnapshot::default()
            .changed(&["support", "support.escalation_contacts"])
            .present(&["support", "support.other"]);
        let sparse = map(json!({"support": {"other": "kept"}}));

        let patch = reconcile(sparse, &snapshot, PRODUCT);
        assert_eq!(
            Value::Object(patch),
            json!({"support": {"escalation_contacts": null, "other": "kept"}})
        );
    }

    #[test]
    fn test_list_elements_reconciled_individually() {
        let snapshot = FakeSnapshot::default()
            .changed(&[
                "support",
                "support.escalation_contacts",
                "support.escalation_contacts.1.role",
            ])
            .present(&[
                "support",
                "support.escalation_contacts",
                "support.escalation_contacts.0.name",
                "support.escalation_contacts.0.role",
                "support.escalation_contacts.1.name",
            ]);
        let sparse = map(json!({"support": {"escalation_contacts": [
            {"name": "A", "role": "lead"},
            {"name": "B", "email": ""}
        ]}}));

        let patch = reconcile(sparse, &snapshot, PRODUCT);
        assert_eq!(
            Value::Object(patch),
            json!({"support": {"escalation_contacts": [
                {"name": "A", "role": "lead"},
                {"name": "B", "role": null}
            ]}})
        );
    }

    #[test]
    fn test_composite_not_descended_when_cleared() {
        let snapshot = FakeSnapshot::default().changed(&["primary_contact", "primary_contact.email"]);
        let sparse = map(json!({"primary_contact": {"email": ""}}));

        let patch = reconcile(sparse, &snapshot, PRODUCT);
        assert_eq!(patch.get("primary_contact"), Some(&Value::Null));
    }

    #[test]
    fn test_present_composite_missing_from_patch_is_left_alone() {
        let snapshot = FakeSnapshot::default().present(&["primary_contact"]);
        let patch = reconcile(MergePatch::new(), &snapshot, PRODUCT);
        assert!(patch.is_empty());
    }

    #[test]
    fn test_fields_outside_table_are_untouched() {
        let snapshot = FakeSnapshot::default();
        let patch = reconcile(map(json!({"unmanaged": 1})), &snapshot, PRODUCT);
        assert_eq!(patch.get("unmanaged"), Some(&json!(1)));
    }

    #[test]
    fn test_idempotent() {
        let snapshot = FakeSnapshot::default()
            .changed(&[
                "tax_assessment",
                "support",
                "support.escalation_contacts",
                "primary_contact",
                "primary_contact.email",
            ])
            .present(&[
                "support",
                "primary_contact",
                "primary_contact.name",
                "primary_contact.email",
            ]);
        let sparse = map(json!({
            "ero_class": "",
            "primary_contact": {"name": "Pat", "email": "p@x"},
            "support": {}
        }));

        let once = reconcile(sparse, &snapshot, PRODUCT);
        let twice = reconcile(once.clone(), &snapshot, PRODUCT);
        assert_eq!(once, twice);
        assert_eq!(once.get("tax_assessment"), Some(&Value::Null));
        assert!(!once.contains_key("ero_class"));
    }

    #[test]
    fn test_classify() {
        let snapshot = FakeSnapshot::default()
            .changed(&["a", "b"])
            .present(&["b", "c"]);
        assert_eq!(FieldOutcome::classify(&snapshot, "a"), FieldOutcome::Cleared);
        assert_eq!(FieldOutcome::classify(&snapshot, "b"), FieldOutcome::Assigned);
        assert_eq!(FieldOutcome::classify(&snapshot, "c"), FieldOutcome::Assigned);
        assert_eq!(FieldOutcome::classify(&snapshot, "d"), FieldOutcome::Untouched);
    }

    #[derive(Serialize, Default)]
    struct PatchValues {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        active: Option<bool>,
    }

    #[test]
    fn test_as_patch_skips_unset_fields() {
        let values = PatchValues {
            active: Some(false),
            ..Default::default()
        };
        let patch = as_patch(&values).unwrap();
        assert_eq!(Value::Object(patch), json!({"active": false}));
    }

    #[test]
    fn test_as_patch_rejects_non_object() {
        let err = as_patch(&vec![1, 2]).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}
