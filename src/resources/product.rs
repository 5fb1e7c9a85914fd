//! `onboarding_product`: a product being onboarded to the marketplace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{
    changed, ensure_no_force_new_change, env_of, fetch, model_from, read_back, remove,
    required_str, state_from, ResourceHandler,
};
use crate::client::PartnerCenterSellApi;
use crate::config::env_attribute;
use crate::error::ProviderError;
use crate::patch::{any_changed, as_patch, reconcile, FieldSpec};
use crate::schema::{Attribute, Block, NestedBlock, Schema, StringValidator};
use crate::snapshot::ResourceDiff;

const COLLECTION: &str = "/products";

/// Allowed values of the product `type`.
pub const PRODUCT_TYPES: &[&str] = &["professional_service", "service", "software", "software_saas"];

pub(crate) static CONTACT_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("name"), FieldSpec::scalar("email")];

static ESCALATION_CONTACT_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("name"),
    FieldSpec::scalar("email"),
    FieldSpec::scalar("role"),
];

static SUPPORT_FIELDS: &[FieldSpec] =
    &[FieldSpec::list("escalation_contacts", ESCALATION_CONTACT_FIELDS)];

/// Fields an `UpdateProduct` merge-patch may carry.
pub static PRODUCT_PATCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::object("primary_contact", CONTACT_FIELDS),
    FieldSpec::scalar("eccn_number"),
    FieldSpec::scalar("ero_class"),
    FieldSpec::scalar("unspsc"),
    FieldSpec::scalar("tax_assessment"),
    FieldSpec::object("support", SUPPORT_FIELDS),
];

/// The person responsible for the product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Someone to escalate support cases to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSupport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_contacts: Option<Vec<EscalationContact>>,
}

/// Body of `CreateProduct`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPrototype {
    #[serde(rename = "type")]
    pub product_type: String,
    pub primary_contact: PrimaryContact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eccn_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ero_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unspsc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_assessment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support: Option<ProductSupport>,
}

/// Body of `UpdateProduct` before reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_contact: Option<PrimaryContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eccn_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ero_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unspsc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_assessment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support: Option<ProductSupport>,
}

/// A product as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnboardingProduct {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_contact: Option<PrimaryContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eccn_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ero_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unspsc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_assessment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support: Option<ProductSupport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_catalog_offering_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_catalog_offering_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_global_catalog_offering_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iam_registration_id: Option<String>,
}

/// Handler for `onboarding_product`.
#[derive(Debug, Clone)]
pub struct ProductResource {
    schema: Schema,
}

impl ProductResource {
    /// Resource type name.
    pub const TYPE_NAME: &'static str = "onboarding_product";

    pub fn new() -> Self {
        Self {
            schema: product_schema(),
        }
    }

    fn path(id: &str) -> String {
        format!("{}/{}", COLLECTION, id)
    }

    fn patch_values(diff: &ResourceDiff<'_>) -> Result<ProductPatch, ProviderError> {
        Ok(ProductPatch {
            primary_contact: changed(diff, "primary_contact")?,
            eccn_number: changed(diff, "eccn_number")?,
            ero_class: changed(diff, "ero_class")?,
            unspsc: changed(diff, "unspsc")?,
            tax_assessment: changed(diff, "tax_assessment")?,
            support: changed(diff, "support")?,
        })
    }
}

impl Default for ProductResource {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn contact_block() -> Block {
    Block::new()
        .with_attribute(
            "name",
            Attribute::required_string().with_description("The name of the primary contact."),
        )
        .with_attribute(
            "email",
            Attribute::required_string().with_description("The email address of the primary contact."),
        )
}

fn product_schema() -> Schema {
    let escalation_contact = Block::new()
        .with_attribute("name", Attribute::optional_string())
        .with_attribute("email", Attribute::optional_string())
        .with_attribute("role", Attribute::optional_string());

    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("env", env_attribute())
        .with_attribute(
            "type",
            Attribute::required_string()
                .with_description("The type of the product.")
                .with_force_new()
                .with_validator(StringValidator::allowed_values(PRODUCT_TYPES)),
        )
        .with_block(
            "primary_contact",
            NestedBlock::single(contact_block())
                .with_min_items(1)
                .with_max_items(1),
        )
        .with_attribute(
            "eccn_number",
            Attribute::optional_string().with_description("The Export Control Classification Number."),
        )
        .with_attribute(
            "ero_class",
            Attribute::optional_string().with_description("The export restriction classification."),
        )
        .with_attribute(
            "unspsc",
            Attribute::optional_float64().with_description("The UN Standard Products and Services Code."),
        )
        .with_attribute("tax_assessment", Attribute::optional_string())
        .with_block(
            "support",
            NestedBlock::single(Block::new().with_block(
                "escalation_contacts",
                NestedBlock::list(escalation_contact),
            ))
            .with_max_items(1),
        )
        .with_attribute("account_id", Attribute::computed_string())
        .with_attribute("private_catalog_id", Attribute::computed_string())
        .with_attribute("private_catalog_offering_id", Attribute::computed_string())
        .with_attribute("global_catalog_offering_id", Attribute::computed_string())
        .with_attribute("staging_global_catalog_offering_id", Attribute::computed_string())
        .with_attribute("approver_resource_id", Attribute::computed_string())
        .with_attribute("iam_registration_id", Attribute::computed_string())
}

#[async_trait]
impl ResourceHandler for ProductResource {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn patch_fields(&self) -> &'static [FieldSpec] {
        PRODUCT_PATCH_FIELDS
    }

    async fn create(
        &self,
        api: &dyn PartnerCenterSellApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let env = env_of(planned);
        let body: ProductPrototype = model_from(planned)?;
        let created = api
            .create(COLLECTION, env, serde_json::to_value(&body)?)
            .await
            .map_err(|e| ProviderError::api("CreateProduct", e))?;

        let product: OnboardingProduct = model_from(&created)?;
        let id = product.id.ok_or_else(|| {
            ProviderError::InvalidRequest("CreateProduct returned no id".to_string())
        })?;
        info!(resource_type = Self::TYPE_NAME, id = %id, "created product");

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
        let Some(object) = fetch(api, "GetProduct", &Self::path(id), env).await? else {
            return Ok(None);
        };
        let product: OnboardingProduct = model_from(&object)?;
        state_from(&product, [("env", env.map(str::to_string))]).map(Some)
    }

    async fn update(
        &self,
        api: &dyn PartnerCenterSellApi,
        diff: &ResourceDiff<'_>,
    ) -> Result<Value, ProviderError> {
        ensure_no_force_new_change(Self::TYPE_NAME, diff, &self.schema)?;
        let id = required_str(diff.prior(), "id")?;
        let env = env_of(diff.planned()).or_else(|| env_of(diff.prior()));

        if any_changed(diff, PRODUCT_PATCH_FIELDS) {
            let patch = reconcile(as_patch(&Self::patch_values(diff)?)?, diff, PRODUCT_PATCH_FIELDS);
            debug!(resource_type = Self::TYPE_NAME, id, fields = patch.len(), "sending merge-patch");
            api.update(&Self::path(id), env, patch)
                .await
                .map_err(|e| ProviderError::api("UpdateProduct", e))?;
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
        remove(api, "DeleteProduct", &Self::path(id), env_of(state)).await?;
        info!(resource_type = Self::TYPE_NAME, id, "deleted product");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        if id.is_empty() {
            return Err(ProviderError::InvalidRequest("product id must not be empty".to_string()));
        }
        Ok(json!({ "id": id }))
    }
}
