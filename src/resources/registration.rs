//! `onboarding_registration`: the partner account's seller registration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::product::{contact_block, PrimaryContact, CONTACT_FIELDS};
use super::{
    changed, ensure_no_force_new_change, env_of, fetch, model_from, read_back, remove,
    required_str, state_from, ResourceHandler,
};
use crate::client::PartnerCenterSellApi;
use crate::config::env_attribute;
use crate::error::ProviderError;
use crate::patch::{any_changed, as_patch, reconcile, FieldSpec};
use crate::schema::{Attribute, NestedBlock, Schema, StringValidator};
use crate::snapshot::ResourceDiff;

const COLLECTION: &str = "/registrations";

/// Pattern of an account ID.
pub const ACCOUNT_ID_PATTERN: &str = "^[a-zA-Z0-9]+$";

/// Fields an `UpdateRegistration` merge-patch may carry.
pub static REGISTRATION_PATCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("company_name"),
    FieldSpec::object("primary_contact", CONTACT_FIELDS),
    FieldSpec::scalar("default_private_catalog_id"),
    FieldSpec::scalar("provider_access_group"),
];

/// Body of `CreateRegistration`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPrototype {
    pub account_id: String,
    pub company_name: String,
    pub primary_contact: PrimaryContact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_private_catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_access_group: Option<String>,
}

/// Body of `UpdateRegistration` before reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_contact: Option<PrimaryContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_private_catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_access_group: Option<String>,
}

/// A registration as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_contact: Option<PrimaryContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_private_catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_access_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Handler for `onboarding_registration`.
#[derive(Debug, Clone)]
pub struct RegistrationResource {
    schema: Schema,
}

impl RegistrationResource {
    /// Resource type name.
    pub const TYPE_NAME: &'static str = "onboarding_registration";

    pub fn new() -> Self {
        Self {
            schema: registration_schema(),
        }
    }

    fn path(id: &str) -> String {
        format!("{}/{}", COLLECTION, id)
    }
}

impl Default for RegistrationResource {
    fn default() -> Self {
        Self::new()
    }
}

fn registration_schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("env", env_attribute())
        .with_attribute(
            "account_id",
            Attribute::required_string()
                .with_description("The ID of the IBM Cloud account that owns the registration.")
                .with_force_new()
                .with_validator(StringValidator::regexp(ACCOUNT_ID_PATTERN))
                .with_validator(StringValidator::length(32, 32)),
        )
        .with_attribute(
            "company_name",
            Attribute::required_string().with_description("The name of the company."),
        )
        .with_block(
            "primary_contact",
            NestedBlock::single(contact_block())
                .with_min_items(1)
                .with_max_items(1),
        )
        .with_attribute(
            "default_private_catalog_id",
            Attribute::optional_string().with_description("The default private catalog for new products."),
        )
        .with_attribute(
            "provider_access_group",
            Attribute::optional_string()
                .with_description("The access group holding the provider's identities."),
        )
        .with_attribute("created_at", Attribute::computed_string())
        .with_attribute("updated_at", Attribute::computed_string())
}

#[async_trait]
impl ResourceHandler for RegistrationResource {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn patch_fields(&self) -> &'static [FieldSpec] {
        REGISTRATION_PATCH_FIELDS
    }

    async fn create(
        &self,
        api: &dyn PartnerCenterSellApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let env = env_of(planned);
        let body: RegistrationPrototype = model_from(planned)?;
        let created = api
            .create(COLLECTION, env, serde_json::to_value(&body)?)
            .await
            .map_err(|e| ProviderError::api("CreateRegistration", e))?;

        let id = created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::InvalidRequest("CreateRegistration returned no id".to_string())
            })?;
        info!(resource_type = Self::TYPE_NAME, id = %id, "created registration");

        let state = self.read(api, &json!({"id": &id, "env": env})).await?;
        read_back(state, Self::TYPE_NAME, &id)
    }

    async fn read(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        let id = required_str(state, "id")?;
        let env = env_of(state);
        let Some(object) = fetch(api, "GetRegistration", &Self::path(id), env).await? else {
            return Ok(None);
        };
        let registration: Registration = model_from(&object)?;
        state_from(&registration, [("env", env.map(str::to_string))]).map(Some)
    }

    async fn update(
        &self,
        api: &dyn PartnerCenterSellApi,
        diff: &ResourceDiff<'_>,
    ) -> Result<Value, ProviderError> {
        ensure_no_force_new_change(Self::TYPE_NAME, diff, &self.schema)?;
        let id = required_str(diff.prior(), "id")?;
        let env = env_of(diff.planned()).or_else(|| env_of(diff.prior()));

        if any_changed(diff, REGISTRATION_PATCH_FIELDS) {
            let values = RegistrationPatch {
                company_name: changed(diff, "company_name")?,
                primary_contact: changed(diff, "primary_contact")?,
                default_private_catalog_id: changed(diff, "default_private_catalog_id")?,
                provider_access_group: changed(diff, "provider_access_group")?,
            };
            let patch = reconcile(as_patch(&values)?, diff, REGISTRATION_PATCH_FIELDS);
            debug!(resource_type = Self::TYPE_NAME, id, fields = patch.len(), "sending merge-patch");
            api.update(&Self::path(id), env, patch)
                .await
                .map_err(|e| ProviderError::api("UpdateRegistration", e))?;
        }

        let state = self.read(api, &json!({"id": id, "env": env})).await?;
        read_back(state, Self::TYPE_NAME, id)
    }

    async fn delete(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<(), ProviderError> {
        let id = required_str(state, "id")?;
        remove(api, "DeleteRegistration", &Self::path(id), env_of(state)).await?;
        info!(resource_type = Self::TYPE_NAME, id, "deleted registration");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        if id.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "registration id must not be empty".to_string(),
            ));
        }
        Ok(json!({ "id": id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryPartnerCenter;
    use crate::validation;

    const ACCOUNT: &str = "4a5c3c51b97a446fbb1d0e1ef089823b";

    fn planned() -> Value {
        json!({
            "account_id": ACCOUNT,
            "company_name": "Acme",
            "primary_contact": {"name": "Pat", "email": "pat@example.com"},
            "provider_access_group": "AccessGroupId-1"
        })
    }

    #[test]
    fn test_account_id_rules() {
        let resource = RegistrationResource::new();
        assert!(validation::is_valid(resource.schema(), &planned()));

        let mut short = planned();
        short["account_id"] = json!("abc");
        assert!(!validation::is_valid(resource.schema(), &short));

        let mut symbols = planned();
        symbols["account_id"] = json!("4a5c3c51-97a446fbb1d0e1ef089823b");
        assert!(!validation::is_valid(resource.schema(), &symbols));
    }

    #[test]
    fn test_missing_primary_contact_is_invalid() {
        let resource = RegistrationResource::new();
        let mut config = planned();
        config.as_object_mut().unwrap().remove("primary_contact");
        assert!(!validation::is_valid(resource.schema(), &config));
    }

    #[tokio::test]
    async fn test_update_patches_nested_contact() {
        let api = InMemoryPartnerCenter::new();
        let resource = RegistrationResource::new();
        let prior = resource.create(&api, &planned()).await.unwrap();

        let mut next = prior.clone();
        next["primary_contact"]["email"] = json!("pat@acme.example");
        next["provider_access_group"] = json!(null);
        let diff = ResourceDiff::new(resource.schema(), &prior, &next);
        let state = resource.update(&api, &diff).await.unwrap();

        assert_eq!(
            api.last_patch().await,
            Some(json!({
                "primary_contact": {"name": "Pat", "email": "pat@acme.example"},
                "provider_access_group": null
            }))
        );
        assert_eq!(state["primary_contact"]["email"], "pat@acme.example");
        assert!(state.get("provider_access_group").is_none());
    }

    #[tokio::test]
    async fn test_update_rejects_account_change() {
        let api = InMemoryPartnerCenter::new();
        let resource = RegistrationResource::new();
        let prior = resource.create(&api, &planned()).await.unwrap();

        let mut next = prior.clone();
        next["account_id"] = json!("0000000000000000000000000000000a");
        let diff = ResourceDiff::new(resource.schema(), &prior, &next);
        let err = resource.update(&api, &diff).await.unwrap_err();
        assert!(err.message().contains("account_id"));
    }

    #[tokio::test]
    async fn test_update_of_deleted_registration_is_not_found() {
        let api = InMemoryPartnerCenter::new();
        let resource = RegistrationResource::new();
        let prior = resource.create(&api, &planned()).await.unwrap();
        resource.delete(&api, &prior).await.unwrap();

        let diff = ResourceDiff::new(resource.schema(), &prior, &prior);
        let err = resource.update(&api, &diff).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
