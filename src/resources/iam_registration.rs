//! `onboarding_iam_registration`: the IAM service registration of a product.
//!
//! Registrations are keyed by their service name, so the ID is
//! `<product_id>/<name>` and the name cannot change in place.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::global_catalog::product_id_attribute;
use super::nested::{NestedLocation, Operations};
use super::{changed, model_from, ResourceHandler};
use crate::client::PartnerCenterSellApi;
use crate::config::env_attribute;
use crate::error::ProviderError;
use crate::patch::FieldSpec;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, StringValidator};
use crate::snapshot::ResourceDiff;

/// Pattern of an IAM service name.
pub const IAM_NAME_PATTERN: &str = r"^[a-zA-Z0-9\-.]+$";

const LOCATION: NestedLocation = NestedLocation {
    type_name: IamRegistrationResource::TYPE_NAME,
    ancestors: &[("product_id", "products")],
    collection: "iam_registrations",
    key_field: "name",
    key_attribute: "name",
    operations: Operations {
        create: "CreateIamRegistration",
        get: "GetIamRegistration",
        update: "UpdateIamRegistration",
        delete: "DeleteIamRegistration",
    },
};

const LOCALES: [&str; 11] = [
    "default", "en", "de", "es", "fr", "it", "ja", "ko", "pt_br", "zh_tw", "zh_cn",
];

static LOCALIZED_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("default"),
    FieldSpec::scalar("en"),
    FieldSpec::scalar("de"),
    FieldSpec::scalar("es"),
    FieldSpec::scalar("fr"),
    FieldSpec::scalar("it"),
    FieldSpec::scalar("ja"),
    FieldSpec::scalar("ko"),
    FieldSpec::scalar("pt_br"),
    FieldSpec::scalar("zh_tw"),
    FieldSpec::scalar("zh_cn"),
];

static HIDDEN_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("hidden")];

static ACTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("id"),
    FieldSpec::scalar("roles"),
    FieldSpec::object("description", LOCALIZED_FIELDS),
    FieldSpec::object("display_name", LOCALIZED_FIELDS),
    FieldSpec::object("options", HIDDEN_FIELDS),
];

static KEY_VALUE_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("key"), FieldSpec::scalar("value")];

static ANONYMOUS_ATTRIBUTES_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("account_id"),
    FieldSpec::scalar("service_name"),
    FieldSpec::scalar("additional_properties"),
];

static ANONYMOUS_ACCESS_FIELDS: &[FieldSpec] = &[
    FieldSpec::object("attributes", ANONYMOUS_ATTRIBUTES_FIELDS),
    FieldSpec::scalar("roles"),
];

static HIERARCHY_VALUE_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("key")];

static RESOURCE_HIERARCHY_FIELDS: &[FieldSpec] = &[
    FieldSpec::object("key", KEY_VALUE_FIELDS),
    FieldSpec::object("value", HIERARCHY_VALUE_FIELDS),
];

static ATTRIBUTE_OPTIONS_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("operators"),
    FieldSpec::scalar("hidden"),
    FieldSpec::scalar("supported_patterns"),
    FieldSpec::scalar("policy_types"),
    FieldSpec::scalar("is_empty_value_supported"),
    FieldSpec::scalar("is_string_exists_false_value_supported"),
    FieldSpec::scalar("key"),
    FieldSpec::object("resource_hierarchy", RESOURCE_HIERARCHY_FIELDS),
];

static INPUT_VALUE_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("value"),
    FieldSpec::object("display_name", LOCALIZED_FIELDS),
];

static GST_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("query"),
    FieldSpec::scalar("value_property_name"),
    FieldSpec::scalar("label_property_name"),
    FieldSpec::scalar("input_option_label"),
];

static INPUT_URL_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("url_endpoint"),
    FieldSpec::scalar("input_option_label"),
];

static INPUT_DETAILS_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("type"),
    FieldSpec::list("values", INPUT_VALUE_FIELDS),
    FieldSpec::object("gst", GST_FIELDS),
    FieldSpec::object("url", INPUT_URL_FIELDS),
];

static ATTRIBUTE_UI_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("input_type"),
    FieldSpec::object("input_details", INPUT_DETAILS_FIELDS),
];

static SUPPORTED_ATTRIBUTE_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("key"),
    FieldSpec::object("options", ATTRIBUTE_OPTIONS_FIELDS),
    FieldSpec::object("display_name", LOCALIZED_FIELDS),
    FieldSpec::object("description", LOCALIZED_FIELDS),
    FieldSpec::object("ui", ATTRIBUTE_UI_FIELDS),
];

static SUBJECT_ATTRIBUTES_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("service_name"),
    FieldSpec::scalar("resource_type"),
];

static AUTHORIZATION_SUBJECT_FIELDS: &[FieldSpec] = &[
    FieldSpec::object("attributes", SUBJECT_ATTRIBUTES_FIELDS),
    FieldSpec::scalar("roles"),
];

static ROLE_OPTIONS_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("access_policy"),
    FieldSpec::scalar("policy_type"),
    FieldSpec::scalar("account_type"),
];

static ROLE_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("id"),
    FieldSpec::object("description", LOCALIZED_FIELDS),
    FieldSpec::object("display_name", LOCALIZED_FIELDS),
    FieldSpec::object("options", ROLE_OPTIONS_FIELDS),
];

static ENVIRONMENT_ATTRIBUTE_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("key"),
    FieldSpec::scalar("values"),
    FieldSpec::object("options", HIDDEN_FIELDS),
];

static NETWORK_FIELDS: &[FieldSpec] =
    &[FieldSpec::list("environment_attributes", ENVIRONMENT_ATTRIBUTE_FIELDS)];

/// Fields an `UpdateIamRegistration` merge-patch may carry.
pub static IAM_REGISTRATION_PATCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("enabled"),
    FieldSpec::scalar("service_type"),
    FieldSpec::list("actions", ACTION_FIELDS),
    FieldSpec::scalar("additional_policy_scopes"),
    FieldSpec::object("display_name", LOCALIZED_FIELDS),
    FieldSpec::scalar("parent_ids"),
    FieldSpec::object("resource_hierarchy_attribute", KEY_VALUE_FIELDS),
    FieldSpec::list("supported_anonymous_accesses", ANONYMOUS_ACCESS_FIELDS),
    FieldSpec::list("supported_attributes", SUPPORTED_ATTRIBUTE_FIELDS),
    FieldSpec::list("supported_authorization_subjects", AUTHORIZATION_SUBJECT_FIELDS),
    FieldSpec::list("supported_roles", ROLE_FIELDS),
    FieldSpec::object("supported_network", NETWORK_FIELDS),
];

/// A text translated into the languages IAM displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamText {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub de: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub it: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ja: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ko: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pt_br: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zh_tw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zh_cn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<IamText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<IamText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<HiddenOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousAccessAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedAnonymousAccess {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AnonymousAccessAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHierarchy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<HierarchyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operators: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_patterns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_empty_value_supported: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_string_exists_false_value_supported: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_hierarchy: Option<ResourceHierarchy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<IamText>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputGst {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_property_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_property_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_option_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputUrl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_option_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDetails {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<InputValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gst: Option<InputGst>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<InputUrl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeUi {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_details: Option<InputDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedAttribute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<AttributeOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<IamText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<IamText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<AttributeUi>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedAuthorizationSubject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<SubjectAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_policy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedRole {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<IamText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<IamText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<RoleOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentAttribute {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<HiddenOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_attributes: Option<Vec<EnvironmentAttribute>>,
}

/// The patchable part of a registration. Doubles as the `UpdateIamRegistration`
/// body before reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamRegistrationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<IamAction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_policy_scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<IamText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_hierarchy_attribute: Option<KeyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_anonymous_accesses: Option<Vec<SupportedAnonymousAccess>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_attributes: Option<Vec<SupportedAttribute>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_authorization_subjects: Option<Vec<SupportedAuthorizationSubject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_roles: Option<Vec<SupportedRole>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_network: Option<SupportedNetwork>,
}

/// Body of `CreateIamRegistration`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamRegistrationPrototype {
    pub name: String,
    #[serde(flatten)]
    pub fields: IamRegistrationPatch,
}

/// An IAM registration as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamServiceRegistration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub fields: IamRegistrationPatch,
}

/// Handler for `onboarding_iam_registration`.
#[derive(Debug, Clone)]
pub struct IamRegistrationResource {
    schema: Schema,
}

impl IamRegistrationResource {
    /// Resource type name.
    pub const TYPE_NAME: &'static str = "onboarding_iam_registration";

    pub fn new() -> Self {
        Self {
            schema: iam_registration_schema(),
        }
    }

    fn patch_values(diff: &ResourceDiff<'_>) -> Result<IamRegistrationPatch, ProviderError> {
        Ok(IamRegistrationPatch {
            enabled: changed(diff, "enabled")?,
            service_type: changed(diff, "service_type")?,
            actions: changed(diff, "actions")?,
            additional_policy_scopes: changed(diff, "additional_policy_scopes")?,
            display_name: changed(diff, "display_name")?,
            parent_ids: changed(diff, "parent_ids")?,
            resource_hierarchy_attribute: changed(diff, "resource_hierarchy_attribute")?,
            supported_anonymous_accesses: changed(diff, "supported_anonymous_accesses")?,
            supported_attributes: changed(diff, "supported_attributes")?,
            supported_authorization_subjects: changed(diff, "supported_authorization_subjects")?,
            supported_roles: changed(diff, "supported_roles")?,
            supported_network: changed(diff, "supported_network")?,
        })
    }
}

impl Default for IamRegistrationResource {
    fn default() -> Self {
        Self::new()
    }
}

fn single(block: Block) -> NestedBlock {
    NestedBlock::single(block).with_max_items(1)
}

fn strings(names: &[&str]) -> Block {
    names.iter().fold(Block::new(), |block, name| {
        block.with_attribute(*name, Attribute::optional_string())
    })
}

fn localized() -> NestedBlock {
    single(strings(&LOCALES))
}

fn hidden_option() -> NestedBlock {
    single(Block::new().with_attribute("hidden", Attribute::optional_bool()))
}

fn action_block() -> Block {
    Block::new()
        .with_attribute("id", Attribute::optional_string())
        .with_attribute("roles", Attribute::optional_string_list())
        .with_block("description", localized())
        .with_block("display_name", localized())
        .with_block("options", hidden_option())
}

fn anonymous_access_block() -> Block {
    let attributes = Block::new()
        .with_attribute("account_id", Attribute::required_string())
        .with_attribute("service_name", Attribute::required_string())
        .with_attribute(
            "additional_properties",
            Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::required()),
        );
    Block::new()
        .with_block("attributes", single(attributes).with_min_items(1))
        .with_attribute("roles", Attribute::optional_string_list())
}

fn supported_attribute_block() -> Block {
    let resource_hierarchy = Block::new()
        .with_block("key", single(strings(&["key", "value"])))
        .with_block("value", single(strings(&["key"])));
    let options = Block::new()
        .with_attribute("operators", Attribute::optional_string_list())
        .with_attribute("hidden", Attribute::optional_bool())
        .with_attribute("supported_patterns", Attribute::optional_string_list())
        .with_attribute("policy_types", Attribute::optional_string_list())
        .with_attribute("is_empty_value_supported", Attribute::optional_bool())
        .with_attribute("is_string_exists_false_value_supported", Attribute::optional_bool())
        .with_attribute("key", Attribute::optional_string())
        .with_block("resource_hierarchy", single(resource_hierarchy));

    let input_details = Block::new()
        .with_attribute("type", Attribute::optional_string())
        .with_block(
            "values",
            NestedBlock::list(
                Block::new()
                    .with_attribute("value", Attribute::optional_string())
                    .with_block("display_name", localized()),
            ),
        )
        .with_block(
            "gst",
            single(strings(&[
                "query",
                "value_property_name",
                "label_property_name",
                "input_option_label",
            ])),
        )
        .with_block("url", single(strings(&["url_endpoint", "input_option_label"])));
    let ui = Block::new()
        .with_attribute("input_type", Attribute::optional_string())
        .with_block("input_details", single(input_details));

    Block::new()
        .with_attribute("key", Attribute::optional_string())
        .with_block("options", single(options))
        .with_block("display_name", localized())
        .with_block("description", localized())
        .with_block("ui", single(ui))
}

fn authorization_subject_block() -> Block {
    Block::new()
        .with_block("attributes", single(strings(&["service_name", "resource_type"])))
        .with_attribute("roles", Attribute::optional_string_list())
}

fn role_block() -> Block {
    let options = Block::new()
        .with_attribute("access_policy", Attribute::required_bool())
        .with_attribute("policy_type", Attribute::optional_string_list())
        .with_attribute("account_type", Attribute::optional_string());
    Block::new()
        .with_attribute("id", Attribute::optional_string())
        .with_block("description", localized())
        .with_block("display_name", localized())
        .with_block("options", single(options))
}

fn network_block() -> Block {
    Block::new().with_block(
        "environment_attributes",
        NestedBlock::list(
            Block::new()
                .with_attribute("key", Attribute::optional_string())
                .with_attribute("values", Attribute::optional_string_list())
                .with_block("options", hidden_option()),
        ),
    )
}

fn iam_registration_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("The `<product_id>/<name>` pair."),
        )
        .with_attribute("product_id", product_id_attribute())
        .with_attribute("env", env_attribute())
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_description("The IAM registration name, which must be the programmatic name of the product.")
                .with_force_new()
                .with_validator(StringValidator::regexp(IAM_NAME_PATTERN)),
        )
        .with_attribute("enabled", Attribute::optional_bool())
        .with_attribute(
            "service_type",
            Attribute::optional_string()
                .with_validator(StringValidator::allowed_values(&["platform_service", "service"])),
        )
        .with_block("actions", NestedBlock::list(action_block()))
        .with_attribute("additional_policy_scopes", Attribute::optional_string_list())
        .with_block("display_name", localized())
        .with_attribute("parent_ids", Attribute::optional_string_list())
        .with_block("resource_hierarchy_attribute", single(strings(&["key", "value"])))
        .with_block(
            "supported_anonymous_accesses",
            NestedBlock::list(anonymous_access_block()),
        )
        .with_block("supported_attributes", NestedBlock::list(supported_attribute_block()))
        .with_block(
            "supported_authorization_subjects",
            NestedBlock::list(authorization_subject_block()),
        )
        .with_block("supported_roles", NestedBlock::list(role_block()))
        .with_block("supported_network", single(network_block()))
}

#[async_trait]
impl ResourceHandler for IamRegistrationResource {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn patch_fields(&self) -> &'static [FieldSpec] {
        IAM_REGISTRATION_PATCH_FIELDS
    }

    async fn create(
        &self,
        api: &dyn PartnerCenterSellApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let body: IamRegistrationPrototype = model_from(planned)?;
        LOCATION
            .create::<_, IamServiceRegistration>(api, planned, &body)
            .await
    }

    async fn read(
        &self,
        api: &dyn PartnerCenterSellApi,
        state: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        LOCATION.read::<IamServiceRegistration>(api, state).await
    }

    async fn update(
        &self,
        api: &dyn PartnerCenterSellApi,
        diff: &ResourceDiff<'_>,
    ) -> Result<Value, ProviderError> {
        LOCATION
            .update::<IamServiceRegistration, _, _>(
                api,
                diff,
                &self.schema,
                IAM_REGISTRATION_PATCH_FIELDS,
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

    async fn api_with_product() -> InMemoryPartnerCenter {
        let api = InMemoryPartnerCenter::new();
        api.insert(format!("/products/{}", PRODUCT), json!({"id": PRODUCT}))
            .await;
        api
    }

    fn planned() -> Value {
        json!({
            "product_id": PRODUCT,
            "name": "acme-widget",
            "enabled": true,
            "service_type": "service",
            "display_name": {"default": "Acme Widget", "en": "Acme Widget", "de": "Acme-Widget"},
            "actions": [{
                "id": "acme-widget.dashboard.view",
                "roles": ["crn:v1:bluemix:public:iam::::serviceRole:Reader"],
                "description": {"default": "View the dashboard", "en": "View the dashboard"},
                "display_name": {"default": "View", "en": "View"},
                "options": {"hidden": false}
            }],
            "supported_roles": [{
                "id": "crn:v1:bluemix:public:acme-widget::::serviceRole:Operator",
                "description": {"default": "Operates widgets", "en": "Operates widgets"},
                "display_name": {"default": "Operator", "en": "Operator"},
                "options": {"access_policy": true, "policy_type": ["access"]}
            }],
            "supported_anonymous_accesses": [{
                "attributes": {
                    "account_id": "acme",
                    "service_name": "acme-widget",
                    "additional_properties": {"region": "eu-de"}
                },
                "roles": ["crn:v1:bluemix:public:iam::::serviceRole:Reader"]
            }],
            "supported_network": {
                "environment_attributes": [{"key": "networkType", "values": ["public"]}]
            }
        })
    }

    #[test]
    fn test_schema_rules() {
        let resource = IamRegistrationResource::new();
        assert!(validation::is_valid(resource.schema(), &planned()));

        let mut bad_type = planned();
        bad_type["service_type"] = json!("database");
        assert!(!validation::is_valid(resource.schema(), &bad_type));

        let mut no_policy = planned();
        no_policy["supported_roles"][0]["options"]
            .as_object_mut()
            .unwrap()
            .remove("access_policy");
        assert!(!validation::is_valid(resource.schema(), &no_policy));
    }

    #[test]
    fn test_patch_table_paths_exist_in_schema() {
        let resource = IamRegistrationResource::new();
        assert_fields_resolve(&resource.schema().block, IAM_REGISTRATION_PATCH_FIELDS, "");
    }

    #[tokio::test]
    async fn test_create_keys_by_name() {
        let api = api_with_product().await;
        let resource = IamRegistrationResource::new();

        let state = resource.create(&api, &planned()).await.unwrap();
        assert_eq!(state["id"], format!("{}/acme-widget", PRODUCT));
        assert_eq!(state["name"], "acme-widget");
        assert_eq!(state["display_name"]["de"], "Acme-Widget");
        assert!(api
            .object(&format!("/products/{}/iam_registrations/acme-widget", PRODUCT))
            .await
            .is_some());

        let err = resource.create(&api, &planned()).await.unwrap_err();
        assert!(err.message().starts_with("CreateIamRegistration failed"));
    }

    #[tokio::test]
    async fn test_update_clears_nested_text_and_role_option() {
        let api = api_with_product().await;
        let resource = IamRegistrationResource::new();
        let prior = resource.create(&api, &planned()).await.unwrap();

        let mut next = prior.clone();
        next["actions"][0]["description"]["en"] = json!(null);
        next["supported_roles"][0]["options"]["policy_type"] = json!([]);
        let diff = ResourceDiff::new(resource.schema(), &prior, &next);
        let state = resource.update(&api, &diff).await.unwrap();

        let patch = api.last_patch().await.unwrap();
        assert_eq!(patch["actions"][0]["description"]["en"], json!(null));
        assert_eq!(patch["actions"][0]["description"]["default"], "View the dashboard");
        let options = &patch["supported_roles"][0]["options"];
        assert_eq!(options["policy_type"], json!(null));
        assert_eq!(options["access_policy"], true);
        assert!(patch.get("display_name").is_none());
        assert!(patch.get("name").is_none());
        assert!(state["actions"][0]["description"].get("en").is_none());
    }

    #[tokio::test]
    async fn test_update_rejects_rename() {
        let api = api_with_product().await;
        let resource = IamRegistrationResource::new();
        let prior = resource.create(&api, &planned()).await.unwrap();

        let mut next = prior.clone();
        next["name"] = json!("acme-gadget");
        let diff = ResourceDiff::new(resource.schema(), &prior, &next);
        let err = resource.update(&api, &diff).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
        assert!(api.last_patch().await.is_none());
    }

    #[tokio::test]
    async fn test_import_rebuilds_name_and_product() {
        let api = api_with_product().await;
        let resource = IamRegistrationResource::new();
        resource.create(&api, &planned()).await.unwrap();

        assert!(resource.import_state("acme-widget").is_err());
        let state = resource
            .import_state(&format!("{}/acme-widget", PRODUCT))
            .unwrap();
        let imported = resource.read(&api, &state).await.unwrap().unwrap();
        assert_eq!(imported["product_id"], PRODUCT);
        assert_eq!(imported["name"], "acme-widget");
        assert_eq!(imported["supported_network"]["environment_attributes"][0]["key"], "networkType");

        resource.delete(&api, &imported).await.unwrap();
        assert!(resource.read(&api, &imported).await.unwrap().is_none());
    }
}
