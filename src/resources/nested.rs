//! Objects that live below a product.
//!
//! Catalog products, plans, deployments and IAM registrations are all created
//! in a collection under their parent and addressed by a `/`-separated ID
//! listing every ancestor key followed by their own. [`NestedLocation`]
//! describes one such resource and carries the CRUD glue they share.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{
    ensure_no_force_new_change, env_of, fetch, model_from, read_back, remove, required_str,
    state_from,
};
use crate::client::PartnerCenterSellApi;
use crate::error::ProviderError;
use crate::patch::{any_changed, as_patch, reconcile, FieldSpec};
use crate::schema::Schema;
use crate::snapshot::ResourceDiff;
use crate::types::CompositeId;

/// API operation names reported in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Operations {
    pub create: &'static str,
    pub get: &'static str,
    pub update: &'static str,
    pub delete: &'static str,
}

/// Where a nested object lives and how its ID is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NestedLocation {
    pub type_name: &'static str,
    /// `(state attribute, collection)` of every ancestor, outermost first.
    pub ancestors: &'static [(&'static str, &'static str)],
    pub collection: &'static str,
    /// Response field the API keys the object by.
    pub key_field: &'static str,
    /// State attribute mirroring the object's own key.
    pub key_attribute: &'static str,
    pub operations: Operations,
}

impl NestedLocation {
    fn collection_path(&self, ancestors: &[String]) -> String {
        let mut path: String = self
            .ancestors
            .iter()
            .zip(ancestors)
            .map(|((_, collection), id)| format!("/{}/{}", collection, id))
            .collect();
        path.push('/');
        path.push_str(self.collection);
        path
    }

    /// API path of the object named by `id`.
    pub fn object_path(&self, id: &CompositeId) -> String {
        format!("{}/{}", self.collection_path(id.ancestors()), id.leaf())
    }

    /// Parse an ID with one part per ancestor plus the object's own key.
    pub fn parse_id(&self, id: &str) -> Result<CompositeId, ProviderError> {
        CompositeId::parse(id, self.ancestors.len() + 1)
    }

    fn state_id(&self, state: &Value) -> Result<CompositeId, ProviderError> {
        self.parse_id(required_str(state, "id")?)
    }

    /// Create the object from `body` under the ancestors named in `planned`,
    /// then read it back.
    pub async fn create<B, M>(
        &self,
        api: &dyn PartnerCenterSellApi,
        planned: &Value,
        body: &B,
    ) -> Result<Value, ProviderError>
    where
        B: Serialize,
        M: DeserializeOwned + Serialize,
    {
        let ancestors = self
            .ancestors
            .iter()
            .map(|(attribute, _)| required_str(planned, attribute).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        let env = env_of(planned);

        let created = api
            .create(&self.collection_path(&ancestors), env, serde_json::to_value(body)?)
            .await
            .map_err(|e| ProviderError::api(self.operations.create, e))?;
        let key = created
            .get(self.key_field)
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidRequest(format!(
                    "{} returned no {}",
                    self.operations.create, self.key_field
                ))
            })?;

        let id = CompositeId::new(ancestors.into_iter().chain([key.to_string()]));
        info!(resource_type = self.type_name, id = %id, "created object");
        self.refresh::<M>(api, &id, env).await
    }

    /// Refresh state from the API. `Ok(None)` means the object is gone.
    ///
    /// The ancestor attributes and the key attribute are rebuilt from the ID,
    /// so an imported state holding only `id` comes back complete.
    pub async fn read<M>(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<Option<Value>, ProviderError>
    where
        M: DeserializeOwned + Serialize,
    {
        let id = self.state_id(state)?;
        let env = env_of(state);
        let Some(object) = fetch(api, self.operations.get, &self.object_path(&id), env).await? else {
            return Ok(None);
        };
        let model: M = model_from(&object)?;

        let mut extra = vec![("id", Some(id.to_string())), ("env", env.map(str::to_string))];
        extra.extend(
            self.ancestors
                .iter()
                .zip(id.ancestors())
                .map(|((attribute, _), value)| (*attribute, Some(value.clone()))),
        );
        extra.push((self.key_attribute, Some(id.leaf().to_string())));
        state_from(&model, extra).map(Some)
    }

    async fn refresh<M>(
        &self,
        api: &dyn PartnerCenterSellApi,
        id: &CompositeId,
        env: Option<&str>,
    ) -> Result<Value, ProviderError>
    where
        M: DeserializeOwned + Serialize,
    {
        let state = self
            .read::<M>(api, &json!({"id": id.to_string(), "env": env}))
            .await?;
        read_back(state, self.type_name, &id.to_string())
    }

    /// Send the reconciled merge-patch for `fields`, then read the object back.
    ///
    /// Force-new attributes are checked first. When no patchable field
    /// changed, nothing is sent.
    pub async fn update<M, P, F>(
        &self,
        api: &dyn PartnerCenterSellApi,
        diff: &ResourceDiff<'_>,
        schema: &Schema,
        fields: &'static [FieldSpec],
        patch_values: F,
    ) -> Result<Value, ProviderError>
    where
        M: DeserializeOwned + Serialize,
        P: Serialize,
        F: FnOnce(&ResourceDiff<'_>) -> Result<P, ProviderError>,
    {
        let id = self.state_id(diff.prior())?;
        let env = env_of(diff.planned()).or_else(|| env_of(diff.prior()));
        ensure_no_force_new_change(self.type_name, diff, schema)?;

        if any_changed(diff, fields) {
            let patch = reconcile(as_patch(&patch_values(diff)?)?, diff, fields);
            debug!(resource_type = self.type_name, id = %id, fields = patch.len(), "sending merge-patch");
            api.update(&self.object_path(&id), env, patch)
                .await
                .map_err(|e| ProviderError::api(self.operations.update, e))?;
        }

        self.refresh::<M>(api, &id, env).await
    }

    /// Delete the object; a missing object is not an error.
    pub async fn delete(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<(), ProviderError> {
        let id = self.state_id(state)?;
        remove(api, self.operations.delete, &self.object_path(&id), env_of(state)).await?;
        info!(resource_type = self.type_name, id = %id, "deleted object");
        Ok(())
    }

    /// Minimal state for an import ID; [`NestedLocation::read`] fills in the rest.
    pub fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        let id = self.parse_id(id)?;
        Ok(json!({ "id": id.to_string() }))
    }
}
