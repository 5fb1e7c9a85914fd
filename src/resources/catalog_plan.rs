//! `onboarding_catalog_plan`: a pricing plan of a catalog product.
//!
//! Plans live under a catalog product. Their ID is
//! `<product_id>/<catalog_product_id>/<catalog_plan_id>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::global_catalog::{
    catalog_object_id_attribute, object_id_attribute, object_provider_block, overview_ui_block,
    product_id_attribute, service_block, ui_block, CatalogObjectProvider, MetadataService,
    MetadataUi, OverviewUi, UiFlavor, OVERVIEW_UI_FIELDS, PROVIDER_FIELDS, SERVICE_FIELDS,
};
use super::nested::{NestedLocation, Operations};
use super::{changed, model_from, ResourceHandler};
use crate::client::PartnerCenterSellApi;
use crate::config::env_attribute;
use crate::error::ProviderError;
use crate::patch::FieldSpec;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, StringValidator};
use crate::snapshot::ResourceDiff;

/// Pattern of a plan name. Unlike products, plans allow upper case.
pub const PLAN_NAME_PATTERN: &str = r"^[a-zA-Z0-9\-.]+$";

const LOCATION: NestedLocation = NestedLocation {
    type_name: CatalogPlanResource::TYPE_NAME,
    ancestors: &[("product_id", "products"), ("catalog_product_id", "catalog_products")],
    collection: "plans",
    key_field: "id",
    key_attribute: "catalog_plan_id",
    operations: Operations {
        create: "CreateCatalogPlan",
        get: "GetCatalogPlan",
        update: "UpdateCatalogPlan",
        delete: "DeleteCatalogPlan",
    },
};

static PRICING_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("type"),
    FieldSpec::scalar("origin"),
    FieldSpec::scalar("sales_avenue"),
];

static PLAN_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("allow_internal_users"),
    FieldSpec::scalar("provision_type"),
    FieldSpec::scalar("reservable"),
];

static RESOURCE_CONTROLLER_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("subscription_provider_id")];

static OTHER_FIELDS: &[FieldSpec] = &[FieldSpec::object("resource_controller", RESOURCE_CONTROLLER_FIELDS)];

static METADATA_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("rc_compatible"),
    FieldSpec::object("ui", UiFlavor::Navigation.fields()),
    FieldSpec::object("service", SERVICE_FIELDS),
    FieldSpec::object("pricing", PRICING_FIELDS),
    FieldSpec::object("plan", PLAN_FIELDS),
    FieldSpec::object("other", OTHER_FIELDS),
];

/// Fields an `UpdateCatalogPlan` merge-patch may carry.
pub static CATALOG_PLAN_PATCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("active"),
    FieldSpec::scalar("disabled"),
    FieldSpec::object("overview_ui", OVERVIEW_UI_FIELDS),
    FieldSpec::scalar("tags"),
    FieldSpec::scalar("pricing_tags"),
    FieldSpec::object("object_provider", PROVIDER_FIELDS),
    FieldSpec::object("metadata", METADATA_FIELDS),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPricing {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub pricing_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_avenue: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_internal_users: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provision_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservable: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceController {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_provider_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOtherMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_controller: Option<ResourceController>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogPlanMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc_compatible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<MetadataUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<MetadataService>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PlanPricing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<PlanOtherMetadata>,
}

/// Body of `CreateCatalogPlan`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogPlanPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub name: String,
    pub active: bool,
    pub disabled: bool,
    pub kind: String,
    pub tags: Vec<String>,
    pub object_provider: CatalogObjectProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_ui: Option<OverviewUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogPlanMetadata>,
}

/// Body of `UpdateCatalogPlan` before reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogPlanPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_ui: Option<OverviewUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_provider: Option<CatalogObjectProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogPlanMetadata>,
}

/// A catalog plan as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalCatalogPlan {
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
    pub pricing_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_provider: Option<CatalogObjectProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_ui: Option<OverviewUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CatalogPlanMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Handler for `onboarding_catalog_plan`.
#[derive(Debug, Clone)]
pub struct CatalogPlanResource {
    schema: Schema,
}

impl CatalogPlanResource {
    /// Resource type name.
    pub const TYPE_NAME: &'static str = "onboarding_catalog_plan";

    pub fn new() -> Self {
        Self {
            schema: catalog_plan_schema(),
        }
    }

    fn patch_values(diff: &ResourceDiff<'_>) -> Result<CatalogPlanPatch, ProviderError> {
        Ok(CatalogPlanPatch {
            active: changed(diff, "active")?,
            disabled: changed(diff, "disabled")?,
            overview_ui: changed(diff, "overview_ui")?,
            tags: changed(diff, "tags")?,
            pricing_tags: changed(diff, "pricing_tags")?,
            object_provider: changed(diff, "object_provider")?,
            metadata: changed(diff, "metadata")?,
        })
    }
}

impl Default for CatalogPlanResource {
    fn default() -> Self {
        Self::new()
    }
}

fn metadata_block() -> Block {
    let pricing = Block::new()
        .with_attribute("type", Attribute::optional_string())
        .with_attribute("origin", Attribute::optional_string())
        .with_attribute("sales_avenue", Attribute::optional_string_list());

    let plan = Block::new()
        .with_attribute("allow_internal_users", Attribute::optional_bool())
        .with_attribute("provision_type", Attribute::optional_string())
        .with_attribute("reservable", Attribute::optional_bool());

    let resource_controller =
        Block::new().with_attribute("subscription_provider_id", Attribute::optional_string());

    Block::new()
        .with_description("The global catalog metadata of the plan.")
        .with_attribute("rc_compatible", Attribute::optional_bool())
        .with_block("ui", ui_block(UiFlavor::Navigation))
        .with_block("service", service_block())
        .with_block("pricing", NestedBlock::single(pricing).with_max_items(1))
        .with_block("plan", NestedBlock::single(plan).with_max_items(1))
        .with_block(
            "other",
            NestedBlock::single(Block::new().with_block(
                "resource_controller",
                NestedBlock::single(resource_controller).with_max_items(1),
            ))
            .with_max_items(1),
        )
}

fn catalog_plan_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string()
                .with_description("The `<product_id>/<catalog_product_id>/<catalog_plan_id>` triple."),
        )
        .with_attribute("product_id", product_id_attribute())
        .with_attribute(
            "catalog_product_id",
            catalog_object_id_attribute("The unique ID of this global catalog product."),
        )
        .with_attribute("env", env_attribute())
        .with_attribute("object_id", object_id_attribute())
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_description("The programmatic name of this plan.")
                .with_force_new()
                .with_validator(StringValidator::regexp(PLAN_NAME_PATTERN)),
        )
        .with_attribute("active", Attribute::required_bool())
        .with_attribute("disabled", Attribute::required_bool())
        .with_attribute(
            "kind",
            Attribute::required_string()
                .with_description("The kind of the global catalog object.")
                .with_force_new()
                .with_validator(StringValidator::allowed_values(&["plan"])),
        )
        .with_attribute(
            "tags",
            Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::required()),
        )
        .with_attribute("pricing_tags", Attribute::optional_string_list())
        .with_block("object_provider", object_provider_block())
        .with_block("overview_ui", overview_ui_block())
        .with_block("metadata", NestedBlock::single(metadata_block()).with_max_items(1))
        .with_attribute(
            "geo_tags",
            Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::computed()),
        )
        .with_attribute("url", Attribute::computed_string())
        .with_attribute("catalog_plan_id", Attribute::computed_string())
}

#[async_trait]
impl ResourceHandler for CatalogPlanResource {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn patch_fields(&self) -> &'static [FieldSpec] {
        CATALOG_PLAN_PATCH_FIELDS
    }

    async fn create(
        &self,
        api: &dyn PartnerCenterSellApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let body: CatalogPlanPrototype = model_from(planned)?;
        LOCATION.create::<_, GlobalCatalogPlan>(api, planned, &body).await
    }

    async fn read(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        LOCATION.read::<GlobalCatalogPlan>(api, state).await
    }

    async fn update(
        &self,
        api: &dyn PartnerCenterSellApi,
        diff: &ResourceDiff<'_>,
    ) -> Result<Value, ProviderError> {
        LOCATION
            .update::<GlobalCatalogPlan, _, _>(
                api,
                diff,
                &self.schema,
                CATALOG_PLAN_PATCH_FIELDS,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryPartnerCenter;
    use crate::resources::assert_fields_resolve;
    use crate::validation;
    use serde_json::json;

    const PRODUCT: &str =
        "00000000000000000000000000000001:o:00000001-0000-4000-8000-000000000001";
    const CATALOG_PRODUCT: &str = "catalog_product-1";

    async fn api_with_catalog_product() -> InMemoryPartnerCenter {
        let api = InMemoryPartnerCenter::new();
        api.insert(format!("/products/{}", PRODUCT), json!({"id": PRODUCT}))
            .await;
        api.insert(
            format!("/products/{}/catalog_products/{}", PRODUCT, CATALOG_PRODUCT),
            json!({"id": CATALOG_PRODUCT}),
        )
        .await;
        api
    }

    fn planned() -> Value {
        json!({
            "product_id": PRODUCT,
            "catalog_product_id": CATALOG_PRODUCT,
            "name": "Standard.Plan",
            "active": true,
            "disabled": false,
            "kind": "plan",
            "tags": ["paid"],
            "pricing_tags": ["monthly"],
            "object_provider": {"name": "Acme", "email": "ops@acme.example"},
            "metadata": {
                "rc_compatible": true,
                "pricing": {"type": "paid", "origin": "pricing_catalog", "sales_avenue": ["seller"]},
                "plan": {"allow_internal_users": true, "reservable": false},
                "ui": {
                    "strings": {"en": {
                        "navigation_items": [
                            {"id": "docs", "url": "https://acme.example/docs", "label": "Docs"},
                            {"id": "api", "url": "https://acme.example/api", "label": "API"}
                        ]
                    }}
                },
                "other": {"resource_controller": {"subscription_provider_id": "acme-sub"}}
            }
        })
    }

    #[test]
    fn test_schema_rules() {
        let resource = CatalogPlanResource::new();
        assert!(validation::is_valid(resource.schema(), &planned()));

        let mut bad_kind = planned();
        bad_kind["kind"] = json!("service");
        assert!(!validation::is_valid(resource.schema(), &bad_kind));

        let mut bad_parent = planned();
        bad_parent["catalog_product_id"] = json!("x");
        assert!(!validation::is_valid(resource.schema(), &bad_parent));

        let mut no_tags = planned();
        no_tags.as_object_mut().unwrap().remove("tags");
        assert!(!validation::is_valid(resource.schema(), &no_tags));
    }

    #[test]
    fn test_patch_table_paths_exist_in_schema() {
        let resource = CatalogPlanResource::new();
        assert_fields_resolve(&resource.schema().block, CATALOG_PLAN_PATCH_FIELDS, "");
    }

    #[tokio::test]
    async fn test_create_uses_three_part_id() {
        let api = api_with_catalog_product().await;
        let resource = CatalogPlanResource::new();

        let state = resource.create(&api, &planned()).await.unwrap();
        assert_eq!(state["id"], format!("{}/{}/plan-1", PRODUCT, CATALOG_PRODUCT));
        assert_eq!(state["catalog_product_id"], CATALOG_PRODUCT);
        assert_eq!(state["catalog_plan_id"], "plan-1");
        assert_eq!(state["metadata"]["pricing"]["origin"], "pricing_catalog");
    }

    #[tokio::test]
    async fn test_update_clears_pricing_and_navigation_label() {
        let api = api_with_catalog_product().await;
        let resource = CatalogPlanResource::new();
        let prior = resource.create(&api, &planned()).await.unwrap();

        let mut next = prior.clone();
        next["metadata"]["pricing"]["sales_avenue"] = json!([]);
        next["metadata"]["ui"]["strings"]["en"]["navigation_items"][1]["label"] = json!("");
        next["pricing_tags"] = json!(null);
        let diff = ResourceDiff::new(resource.schema(), &prior, &next);
        let state = resource.update(&api, &diff).await.unwrap();

        let patch = api.last_patch().await.unwrap();
        assert_eq!(patch["pricing_tags"], json!(null));
        assert_eq!(patch["metadata"]["pricing"]["sales_avenue"], json!(null));
        assert_eq!(patch["metadata"]["pricing"]["type"], "paid");
        let items = &patch["metadata"]["ui"]["strings"]["en"]["navigation_items"];
        assert_eq!(items[0]["label"], "Docs");
        assert_eq!(items[1]["label"], json!(null));
        assert!(patch.get("tags").is_none());
        assert!(state.get("pricing_tags").is_none());
    }

    #[tokio::test]
    async fn test_update_rejects_catalog_product_move() {
        let api = api_with_catalog_product().await;
        let resource = CatalogPlanResource::new();
        let prior = resource.create(&api, &planned()).await.unwrap();

        let mut next = prior.clone();
        next["catalog_product_id"] = json!("catalog_product-2");
        let diff = ResourceDiff::new(resource.schema(), &prior, &next);
        let err = resource.update(&api, &diff).await.unwrap_err();
        assert!(err.message().contains("catalog_product_id"));
        assert!(api.last_patch().await.is_none());
    }

    #[tokio::test]
    async fn test_import_and_delete() {
        let api = api_with_catalog_product().await;
        let resource = CatalogPlanResource::new();
        let created = resource.create(&api, &planned()).await.unwrap();
        let id = created["id"].as_str().unwrap();

        assert!(resource.import_state("p/plan-1").is_err());
        let imported = resource
            .read(&api, &resource.import_state(id).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(imported["product_id"], PRODUCT);
        assert_eq!(imported["name"], "Standard.Plan");

        resource.delete(&api, &created).await.unwrap();
        assert!(resource.read(&api, &created).await.unwrap().is_none());
    }
}
