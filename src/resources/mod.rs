//! Partner Center Sell resources.
//!
//! Each resource owns its schema, the [`FieldSpec`] table its updates are
//! reconciled against, typed request/response models, and CRUD glue written
//! against the injected [`PartnerCenterSellApi`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::PartnerCenterSellApi;
use crate::error::ProviderError;
use crate::patch::FieldSpec;
use crate::schema::Schema;
#[cfg(test)]
use crate::schema::Block;
use crate::snapshot::{is_empty, ConfigSnapshot, ResourceDiff};

pub mod catalog_deployment;
pub mod catalog_plan;
pub mod catalog_product;
pub mod global_catalog;
pub mod iam_registration;
mod nested;
pub mod product;
pub mod registration;

pub use catalog_deployment::CatalogDeploymentResource;
pub use catalog_plan::CatalogPlanResource;
pub use catalog_product::CatalogProductResource;
pub use iam_registration::IamRegistrationResource;
pub use product::ProductResource;
pub use registration::RegistrationResource;

/// CRUD glue for one resource type.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Resource type name, e.g. `onboarding_product`.
    fn type_name(&self) -> &'static str;

    /// The resource schema, built once per handler.
    fn schema(&self) -> &Schema;

    /// Fields that merge-patch updates are reconciled against.
    fn patch_fields(&self) -> &'static [FieldSpec];

    /// Create the remote object and return the resulting state.
    async fn create(
        &self,
        api: &dyn PartnerCenterSellApi,
        planned: &Value,
    ) -> Result<Value, ProviderError>;

    /// Refresh state. `Ok(None)` means the object no longer exists.
    async fn read(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Send a merge-patch for what changed between the prior and planned state.
    async fn update(
        &self,
        api: &dyn PartnerCenterSellApi,
        diff: &ResourceDiff<'_>,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object. Already-deleted objects are not an error.
    async fn delete(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<(), ProviderError>;

    /// Minimal state addressing the object named by an import ID.
    fn import_state(&self, id: &str) -> Result<Value, ProviderError>;
}

/// Drop empty members so `Option` fields deserialize as `None`.
///
/// List elements are kept in place (as `{}` when all their members are empty)
/// so indexes line up with the configuration.
pub(crate) fn strip_empty(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), strip_empty(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_empty).collect()),
        other => other.clone(),
    }
}

/// Deserialize a model from configuration or API JSON.
pub(crate) fn model_from<T: DeserializeOwned>(value: &Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(strip_empty(value))?)
}

/// Serialize a model into a JSON object.
pub(crate) fn object_of<T: Serialize>(model: &T) -> Result<Map<String, Value>, ProviderError> {
    match serde_json::to_value(model)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// The planned value at `path` if it changed, parsed as `T`.
///
/// Changed-but-empty fields come back as `None`; the reconciler turns those
/// into explicit nulls.
pub(crate) fn changed<T: DeserializeOwned>(
    diff: &ResourceDiff<'_>,
    path: &str,
) -> Result<Option<T>, ProviderError> {
    if !diff.has_change(path) {
        return Ok(None);
    }
    diff.get(path).map(model_from).transpose()
}

/// The `env` recorded in a state document.
pub(crate) fn env_of(state: &Value) -> Option<&str> {
    state.get("env").and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// A required string attribute of a state document.
pub(crate) fn required_str<'v>(state: &'v Value, name: &str) -> Result<&'v str, ProviderError> {
    state
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::InvalidRequest(format!("state is missing \"{}\"", name)))
}

/// Reject updates to attributes that can only be set at creation.
pub(crate) fn ensure_no_force_new_change(
    resource_type: &str,
    diff: &ResourceDiff<'_>,
    schema: &Schema,
) -> Result<(), ProviderError> {
    match schema.force_new_attributes().find(|name| diff.has_change(name)) {
        Some(name) => {
            debug!(resource_type, attribute = name, "update touches force-new attribute");
            Err(ProviderError::FailedPrecondition(format!(
                "Cannot update resource property \"{}\" with the ForceNew annotation. \
                 The resource must be re-created to update this property.",
                name
            )))
        }
        None => Ok(()),
    }
}

/// `GET` an object, mapping 404 to `None`.
pub(crate) async fn fetch(
    api: &dyn PartnerCenterSellApi,
    operation: &'static str,
    path: &str,
    env: Option<&str>,
) -> Result<Option<Value>, ProviderError> {
    match api.get(path, env).await {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => {
            warn!(path, "object not found, treating as deleted");
            Ok(None)
        }
        Err(e) => Err(ProviderError::api(operation, e)),
    }
}

/// `DELETE` an object, treating 404 as success.
pub(crate) async fn remove(
    api: &dyn PartnerCenterSellApi,
    operation: &'static str,
    path: &str,
    env: Option<&str>,
) -> Result<(), ProviderError> {
    match api.delete(path, env).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!(path, "object already deleted");
            Ok(())
        }
        Err(e) => Err(ProviderError::api(operation, e)),
    }
}

/// Turn a post-write read into state; the object must still exist.
pub(crate) fn read_back(state: Option<Value>, resource_type: &str, id: &str) -> Result<Value, ProviderError> {
    state.ok_or_else(|| {
        ProviderError::NotFound(format!("{} {} disappeared after write", resource_type, id))
    })
}

/// Build state from an API response: its fields, then `extra` on top.
pub(crate) fn state_from<T: Serialize>(
    model: &T,
    extra: impl IntoIterator<Item = (&'static str, Option<String>)>,
) -> Result<Value, ProviderError> {
    let mut state = object_of(model)?;
    for (key, value) in extra {
        if let Some(value) = value {
            state.insert(key.to_string(), Value::String(value));
        }
    }
    Ok(Value::Object(state))
}

/// Panic unless every path of a field table resolves in `block`.
#[cfg(test)]
pub(crate) fn assert_fields_resolve(block: &Block, fields: &[FieldSpec], prefix: &str) {
    use crate::patch::FieldKind;

    for field in fields {
        let path = if prefix.is_empty() {
            field.name.to_string()
        } else {
            format!("{}.{}", prefix, field.name)
        };
        assert!(block.resolves(&path), "{} does not resolve", path);
        match field.kind {
            FieldKind::Object(nested) => assert_fields_resolve(block, nested, &path),
            FieldKind::List(nested) => assert_fields_resolve(block, nested, &format!("{}.0", path)),
            FieldKind::Scalar => {}
        }
    }
}
