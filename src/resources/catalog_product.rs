//! `onboarding_catalog_product`: a product's global-catalog listing.
//!
//! Catalog products live under their product, so the resource ID is the
//! composite `<product_id>/<catalog_product_id>`. The catalog metadata is the
//! deepest document the provider patches; its field table below is several
//! levels of objects with lists of objects (`composite.children`, the UI
//! bullets and media).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::global_catalog::{
    object_id_attribute, object_provider_block, overview_ui_block, product_id_attribute,
    service_block, ui_block, CatalogObjectProvider, MetadataService, MetadataUi, OverviewUi,
    UiFlavor, CATALOG_NAME_PATTERN, OVERVIEW_UI_FIELDS, PROVIDER_FIELDS, SERVICE_FIELDS,
};
use super::nested::{NestedLocation, Operations};
use super::{changed, model_from, ResourceHandler};
use crate::client::PartnerCenterSellApi;
use crate::config::env_attribute;
use crate::error::ProviderError;
use crate::patch::FieldSpec;
use crate::schema::{Attribute, Block, NestedBlock, Schema, StringValidator};
use crate::snapshot::ResourceDiff;

/// Allowed catalog product kinds.
pub const CATALOG_KINDS: &[&str] = &["composite", "platform_service", "service"];

const LOCATION: NestedLocation = NestedLocation {
    type_name: CatalogProductResource::TYPE_NAME,
    ancestors: &[("product_id", "products")],
    collection: "catalog_products",
    key_field: "id",
    key_attribute: "catalog_product_id",
    operations: Operations {
        create: "CreateCatalogProduct",
        get: "GetCatalogProduct",
        update: "UpdateCatalogProduct",
        delete: "DeleteCatalogProduct",
    },
};

static IMAGES_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("image")];

static TIME_INTERVAL_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("value"), FieldSpec::scalar("type")];

static SUPPORT_ESCALATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("contact"),
    FieldSpec::object("escalation_wait_time", TIME_INTERVAL_FIELDS),
    FieldSpec::object("response_wait_time", TIME_INTERVAL_FIELDS),
];

static SUPPORT_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("url"),
    FieldSpec::scalar("status_url"),
    FieldSpec::scalar("locations"),
    FieldSpec::scalar("languages"),
    FieldSpec::scalar("process"),
    FieldSpec::scalar("support_type"),
    FieldSpec::object("support_escalation", SUPPORT_ESCALATION_FIELDS),
];

static PC_FIELDS: &[FieldSpec] = &[FieldSpec::object("support", SUPPORT_FIELDS)];

static COMPOSITE_CHILD_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("kind"), FieldSpec::scalar("name")];

static COMPOSITE_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("composite_kind"),
    FieldSpec::scalar("composite_tag"),
    FieldSpec::list("children", COMPOSITE_CHILD_FIELDS),
];

static OTHER_FIELDS: &[FieldSpec] = &[
    FieldSpec::object("pc", PC_FIELDS),
    FieldSpec::object("composite", COMPOSITE_FIELDS),
];

static METADATA_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("rc_compatible"),
    FieldSpec::object("ui", UiFlavor::Dashboard.fields()),
    FieldSpec::object("service", SERVICE_FIELDS),
    FieldSpec::object("other", OTHER_FIELDS),
];

/// Fields an `UpdateCatalogProduct` merge-patch may carry.
pub static CATALOG_PRODUCT_PATCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("active"),
    FieldSpec::scalar("disabled"),
    FieldSpec::object("overview_ui", OVERVIEW_UI_FIELDS),
    FieldSpec::scalar("tags"),
    FieldSpec::object("images", IMAGES_FIELDS),
    FieldSpec::object("object_provider", PROVIDER_FIELDS),
    FieldSpec::object("metadata", METADATA_FIELDS),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A duration such as "2 hours".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportEscalation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_wait_time: Option<TimeInterval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_wait_time: Option<TimeInterval>,
}

/// How customers get support for the product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_escalation: Option<SupportEscalation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerCenterMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support: Option<SupportInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeChild {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Bundling of several catalog products into one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<CompositeChild>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pc: Option<PartnerCenterMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<CompositeMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogProductMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc_compatible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<MetadataUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<MetadataService>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<OtherMetadata>,
}

/// Body of `CreateCatalogProduct`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogProductPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub name: String,
    pub active: bool,
    pub disabled: bool,
    pub kind: String,
    pub object_provider: CatalogObjectProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_ui: Option<OverviewUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ProductImages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogProductMetadata>,
}

/// Body of `UpdateCatalogProduct` before reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_ui: Option<OverviewUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ProductImages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_provider: Option<CatalogObjectProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogProductMetadata>,
}

/// A catalog product as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalCatalogProduct {
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
    pub images: Option<ProductImages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogProductMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Handler for `onboarding_catalog_product`.
#[derive(Debug, Clone)]
pub struct CatalogProductResource {
    schema: Schema,
}

impl CatalogProductResource {
    /// Resource type name.
    pub const TYPE_NAME: &'static str = "onboarding_catalog_product";

    pub fn new() -> Self {
        Self {
            schema: catalog_product_schema(),
        }
    }

    fn patch_values(diff: &ResourceDiff<'_>) -> Result<CatalogProductPatch, ProviderError> {
        Ok(CatalogProductPatch {
            active: changed(diff, "active")?,
            disabled: changed(diff, "disabled")?,
            overview_ui: changed(diff, "overview_ui")?,
            tags: changed(diff, "tags")?,
            images: changed(diff, "images")?,
            object_provider: changed(diff, "object_provider")?,
            metadata: changed(diff, "metadata")?,
        })
    }
}

impl Default for CatalogProductResource {
    fn default() -> Self {
        Self::new()
    }
}

fn time_interval_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("value", Attribute::optional_int64())
            .with_attribute("type", Attribute::optional_string()),
    )
    .with_max_items(1)
}

fn metadata_block() -> Block {
    let support_escalation = Block::new()
        .with_attribute("contact", Attribute::optional_string())
        .with_block("escalation_wait_time", time_interval_block())
        .with_block("response_wait_time", time_interval_block());

    let support = Block::new()
        .with_attribute("url", Attribute::optional_string())
        .with_attribute("status_url", Attribute::optional_string())
        .with_attribute("locations", Attribute::optional_string_list())
        .with_attribute("languages", Attribute::optional_string_list())
        .with_attribute("process", Attribute::optional_string())
        .with_attribute("support_type", Attribute::optional_string())
        .with_block(
            "support_escalation",
            NestedBlock::single(support_escalation).with_max_items(1),
        );

    let composite = Block::new()
        .with_attribute("composite_kind", Attribute::optional_string())
        .with_attribute("composite_tag", Attribute::optional_string())
        .with_block(
            "children",
            NestedBlock::list(
                Block::new()
                    .with_attribute(
                        "kind",
                        Attribute::optional_string()
                            .with_validator(StringValidator::allowed_values(CATALOG_KINDS)),
                    )
                    .with_attribute("name", Attribute::optional_string()),
            ),
        );

    let other = Block::new()
        .with_block(
            "pc",
            NestedBlock::single(
                Block::new().with_block("support", NestedBlock::single(support).with_max_items(1)),
            )
            .with_max_items(1),
        )
        .with_block("composite", NestedBlock::single(composite).with_max_items(1));

    Block::new()
        .with_description("The global catalog metadata of the product.")
        .with_attribute("rc_compatible", Attribute::optional_bool())
        .with_block("ui", ui_block(UiFlavor::Dashboard))
        .with_block("service", service_block())
        .with_block("other", NestedBlock::single(other).with_max_items(1))
}

fn catalog_product_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("The `<product_id>/<catalog_product_id>` pair."),
        )
        .with_attribute("product_id", product_id_attribute())
        .with_attribute("env", env_attribute())
        .with_attribute("object_id", object_id_attribute())
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_description("The programmatic name of this product.")
                .with_force_new()
                .with_validator(StringValidator::regexp(CATALOG_NAME_PATTERN)),
        )
        .with_attribute(
            "active",
            Attribute::required_bool().with_description("Whether the service is active."),
        )
        .with_attribute(
            "disabled",
            Attribute::required_bool()
                .with_description("Whether the service is disabled until approved by the admin."),
        )
        .with_attribute(
            "kind",
            Attribute::required_string()
                .with_description("The kind of the global catalog object.")
                .with_force_new()
                .with_validator(StringValidator::allowed_values(CATALOG_KINDS)),
        )
        .with_attribute("tags", Attribute::optional_string_list())
        .with_block("object_provider", object_provider_block())
        .with_block("overview_ui", overview_ui_block())
        .with_block(
            "images",
            NestedBlock::single(Block::new().with_attribute("image", Attribute::optional_string()))
                .with_max_items(1),
        )
        .with_block(
            "metadata",
            NestedBlock::single(metadata_block()).with_max_items(1),
        )
        .with_attribute("catalog_product_id", Attribute::computed_string())
        .with_attribute("url", Attribute::computed_string())
}

#[async_trait]
impl ResourceHandler for CatalogProductResource {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn patch_fields(&self) -> &'static [FieldSpec] {
        CATALOG_PRODUCT_PATCH_FIELDS
    }

    async fn create(
        &self,
        api: &dyn PartnerCenterSellApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let body: CatalogProductPrototype = model_from(planned)?;
        LOCATION
            .create::<_, GlobalCatalogProduct>(api, planned, &body)
            .await
    }

    async fn read(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        LOCATION.read::<GlobalCatalogProduct>(api, state).await
    }

    async fn update(
        &self,
        api: &dyn PartnerCenterSellApi,
        diff: &ResourceDiff<'_>,
    ) -> Result<Value, ProviderError> {
        LOCATION
            .update::<GlobalCatalogProduct, _, _>(
                api,
                diff,
                &self.schema,
                CATALOG_PRODUCT_PATCH_FIELDS,
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
