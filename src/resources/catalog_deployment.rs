//! `onboarding_catalog_deployment`: a regional deployment of a catalog plan.
//!
//! The ID is `<product_id>/<catalog_product_id>/<catalog_plan_id>/<catalog_deployment_id>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::global_catalog::{
    catalog_object_id_attribute, object_id_attribute, object_provider_block, overview_ui_block,
    product_id_attribute, service_block, ui_block, CatalogObjectProvider, MetadataService,
    MetadataUi, OverviewUi, UiFlavor, CATALOG_NAME_PATTERN, OVERVIEW_UI_FIELDS, PROVIDER_FIELDS,
    SERVICE_FIELDS,
};
use super::nested::{NestedLocation, Operations};
use super::{changed, model_from, ResourceHandler};
use crate::client::PartnerCenterSellApi;
use crate::config::env_attribute;
use crate::error::ProviderError;
use crate::patch::FieldSpec;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, StringValidator};
use crate::snapshot::ResourceDiff;

const LOCATION: NestedLocation = NestedLocation {
    type_name: CatalogDeploymentResource::TYPE_NAME,
    ancestors: &[
        ("product_id", "products"),
        ("catalog_product_id", "catalog_products"),
        ("catalog_plan_id", "plans"),
    ],
    collection: "deployments",
    key_field: "id",
    key_attribute: "catalog_deployment_id",
    operations: Operations {
        create: "CreateCatalogDeployment",
        get: "GetCatalogDeployment",
        update: "UpdateCatalogDeployment",
        delete: "DeleteCatalogDeployment",
    },
};

static BROKER_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("name"), FieldSpec::scalar("guid")];

static DEPLOYMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::object("broker", BROKER_FIELDS),
    FieldSpec::scalar("location"),
    FieldSpec::scalar("location_url"),
    FieldSpec::scalar("target_crn"),
];

static METADATA_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("rc_compatible"),
    FieldSpec::object("ui", UiFlavor::Dashboard.fields()),
    FieldSpec::object("service", SERVICE_FIELDS),
    FieldSpec::object("deployment", DEPLOYMENT_FIELDS),
];

/// Fields an `UpdateCatalogDeployment` merge-patch may carry.
pub static CATALOG_DEPLOYMENT_PATCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("active"),
    FieldSpec::scalar("disabled"),
    FieldSpec::object("overview_ui", OVERVIEW_UI_FIELDS),
    FieldSpec::scalar("tags"),
    FieldSpec::object("object_provider", PROVIDER_FIELDS),
    FieldSpec::object("metadata", METADATA_FIELDS),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentBroker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<DeploymentBroker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_crn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDeploymentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc_compatible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<MetadataUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<MetadataService>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentDetails>,
}

/// Body of `CreateCatalogDeployment`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDeploymentPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub name: String,
    pub active: bool,
    pub disabled: bool,
    pub kind: String,
    pub tags: Vec<String>,
    pub object_provider: CatalogObjectProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_ui: Option<OverviewUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogDeploymentMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogDeploymentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_ui: Option<OverviewUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_provider: Option<CatalogObjectProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogDeploymentMetadata>,
}

/// A catalog deployment as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalCatalogDeployment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_provider: Option<CatalogObjectProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_ui: Option<OverviewUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogDeploymentMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Handler for `onboarding_catalog_deployment`.
#[derive(Debug, Clone)]
pub struct CatalogDeploymentResource {
    schema: Schema,
}

impl CatalogDeploymentResource {
    /// Resource type name.
    pub const TYPE_NAME: &'static str = "onboarding_catalog_deployment";

    pub fn new() -> Self {
        Self {
            schema: catalog_deployment_schema(),
        }
    }

    fn patch_values(diff: &ResourceDiff<'_>) -> Result<CatalogDeploymentPatch, ProviderError> {
        Ok(CatalogDeploymentPatch {
            active: changed(diff, "active")?,
            disabled: changed(diff, "disabled")?,
            overview_ui: changed(diff, "overview_ui")?,
            tags: changed(diff, "tags")?,
            object_provider: changed(diff, "object_provider")?,
            metadata: changed(diff, "metadata")?,
        })
    }
}

impl Default for CatalogDeploymentResource {
    fn default() -> Self {
        Self::new()
    }
}

fn metadata_block() -> Block {
    let broker = Block::new()
        .with_attribute("name", Attribute::optional_string())
        .with_attribute("guid", Attribute::optional_string());
    let deployment = Block::new()
        .with_block("broker", NestedBlock::single(broker).with_max_items(1))
        .with_attribute("location", Attribute::optional_string())
        .with_attribute("location_url", Attribute::optional_string())
        .with_attribute("target_crn", Attribute::optional_string());

    Block::new()
        .with_description("The global catalog metadata of the deployment.")
        .with_attribute("rc_compatible", Attribute::optional_bool())
        .with_block("ui", ui_block(UiFlavor::Dashboard))
        .with_block("service", service_block())
        .with_block("deployment", NestedBlock::single(deployment).with_max_items(1))
}

fn catalog_deployment_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description(
                "The `<product_id>/<catalog_product_id>/<catalog_plan_id>/<catalog_deployment_id>` path.",
            ),
        )
        .with_attribute("product_id", product_id_attribute())
        .with_attribute(
            "catalog_product_id",
            catalog_object_id_attribute("The unique ID of this global catalog product."),
        )
        .with_attribute(
            "catalog_plan_id",
            catalog_object_id_attribute("The unique ID of this global catalog plan."),
        )
        .with_attribute("env", env_attribute())
        .with_attribute("object_id", object_id_attribute())
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_description("The programmatic name of this deployment.")
                .with_force_new()
                .with_validator(StringValidator::regexp(CATALOG_NAME_PATTERN)),
        )
        .with_attribute("active", Attribute::required_bool())
        .with_attribute("disabled", Attribute::required_bool())
        .with_attribute(
            "kind",
            Attribute::required_string()
                .with_force_new()
                .with_validator(StringValidator::allowed_values(&["deployment"])),
        )
        .with_attribute(
            "tags",
            Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::required()),
        )
        .with_block("object_provider", object_provider_block())
        .with_block("overview_ui", overview_ui_block())
        .with_block("metadata", NestedBlock::single(metadata_block()).with_max_items(1))
        .with_attribute("url", Attribute::computed_string())
        .with_attribute("catalog_deployment_id", Attribute::computed_string())
}

#[async_trait]
impl ResourceHandler for CatalogDeploymentResource {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn patch_fields(&self) -> &'static [FieldSpec] {
        CATALOG_DEPLOYMENT_PATCH_FIELDS
    }

    async fn create(
        &self,
        api: &dyn PartnerCenterSellApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let body: CatalogDeploymentPrototype = model_from(planned)?;
        LOCATION
            .create::<_, GlobalCatalogDeployment>(api, planned, &body)
            .await
    }

    async fn read(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        LOCATION.read::<GlobalCatalogDeployment>(api, state).await
    }

    async fn update(
        &self,
        api: &dyn PartnerCenterSellApi,
        diff: &ResourceDiff<'_>,
    ) -> Result<Value, ProviderError> {
        LOCATION
            .update::<GlobalCatalogDeployment, _, _>(
                api,
                diff,
                &self.schema,
                CATALOG_DEPLOYMENT_PATCH_FIELDS,
                Self::patch_values,
            )
            .await
    }

    async fn delete(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<(), ProviderError> {
        LOCATION.delete(api, state).await
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        LOCATION.import_state(id)
    }
}
