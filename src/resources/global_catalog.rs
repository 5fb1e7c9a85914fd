//! Pieces shared by the global-catalog resources.
//!
//! Catalog products, plans and deployments describe the same kind of catalog
//! entry at different levels, so their providers, overview texts, UI metadata
//! and service flags have one model, one schema block and one field table each.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::patch::FieldSpec;
use crate::schema::{Attribute, Block, NestedBlock, StringValidator};

/// Pattern of a product ID: 32 alphanumerics, `:o:`, then a UUID.
pub const PRODUCT_ID_PATTERN: &str =
    "^[a-zA-Z0-9]{32}:o:[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";

/// Pattern of a catalog product or plan ID.
pub const CATALOG_OBJECT_ID_PATTERN: &str = r"^[a-zA-Z\-_\d]+$";

/// Pattern of a catalog product or deployment name.
pub const CATALOG_NAME_PATTERN: &str = r"^[a-z0-9\-.]+$";

pub(crate) static PROVIDER_FIELDS: &[FieldSpec] =
    &[FieldSpec::scalar("name"), FieldSpec::scalar("email")];

static TRANSLATED_CONTENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("display_name"),
    FieldSpec::scalar("description"),
    FieldSpec::scalar("long_description"),
];

pub(crate) static OVERVIEW_UI_FIELDS: &[FieldSpec] =
    &[FieldSpec::object("en", TRANSLATED_CONTENT_FIELDS)];

static HIGHLIGHT_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("description"),
    FieldSpec::scalar("description_i18n"),
    FieldSpec::scalar("title"),
    FieldSpec::scalar("title_i18n"),
];

static MEDIA_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("caption"),
    FieldSpec::scalar("caption_i18n"),
    FieldSpec::scalar("thumbnail"),
    FieldSpec::scalar("type"),
    FieldSpec::scalar("url"),
];

static NAVIGATION_ITEM_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("id"),
    FieldSpec::scalar("url"),
    FieldSpec::scalar("label"),
];

static DASHBOARD_CONTENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::list("bullets", HIGHLIGHT_FIELDS),
    FieldSpec::list("media", MEDIA_FIELDS),
    FieldSpec::scalar("embeddable_dashboard"),
];

static NAVIGATION_CONTENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::list("bullets", HIGHLIGHT_FIELDS),
    FieldSpec::list("media", MEDIA_FIELDS),
    FieldSpec::list("navigation_items", NAVIGATION_ITEM_FIELDS),
];

static DASHBOARD_STRINGS_FIELDS: &[FieldSpec] = &[FieldSpec::object("en", DASHBOARD_CONTENT_FIELDS)];

static NAVIGATION_STRINGS_FIELDS: &[FieldSpec] =
    &[FieldSpec::object("en", NAVIGATION_CONTENT_FIELDS)];

static URLS_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("doc_url"),
    FieldSpec::scalar("apidocs_url"),
    FieldSpec::scalar("terms_url"),
    FieldSpec::scalar("instructions_url"),
    FieldSpec::scalar("catalog_details_url"),
    FieldSpec::scalar("custom_create_page_url"),
    FieldSpec::scalar("dashboard"),
];

static DASHBOARD_UI_FIELDS: &[FieldSpec] = &[
    FieldSpec::object("strings", DASHBOARD_STRINGS_FIELDS),
    FieldSpec::object("urls", URLS_FIELDS),
    FieldSpec::scalar("hidden"),
    FieldSpec::scalar("side_by_side_index"),
];

static NAVIGATION_UI_FIELDS: &[FieldSpec] = &[
    FieldSpec::object("strings", NAVIGATION_STRINGS_FIELDS),
    FieldSpec::object("urls", URLS_FIELDS),
    FieldSpec::scalar("hidden"),
    FieldSpec::scalar("side_by_side_index"),
];

pub(crate) static SERVICE_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("rc_provisionable"),
    FieldSpec::scalar("iam_compatible"),
    FieldSpec::scalar("bindable"),
    FieldSpec::scalar("plan_updateable"),
    FieldSpec::scalar("service_key_supported"),
];

/// Shape of `metadata.ui.strings.en` for a kind of catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UiFlavor {
    /// Localized bullets and media plus an embeddable dashboard (products, deployments).
    Dashboard,
    /// Plain bullets and media plus navigation items (plans).
    Navigation,
}

impl UiFlavor {
    /// Field table of the `ui` object.
    pub(crate) const fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::Dashboard => DASHBOARD_UI_FIELDS,
            Self::Navigation => NAVIGATION_UI_FIELDS,
        }
    }

    fn localized(self) -> bool {
        self == Self::Dashboard
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogObjectProvider {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewUi {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<TranslatedContent>,
}

/// Translations keyed by language code.
pub type LocalizedText = BTreeMap<String, String>;

/// A highlight shown as a bullet on the catalog page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_i18n: Option<LocalizedText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_i18n: Option<LocalizedText>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_i18n: Option<LocalizedText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// English UI strings. Which members a catalog object accepts depends on its [`UiFlavor`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiStringsContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bullets: Option<Vec<HighlightItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_items: Option<Vec<NavigationItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddable_dashboard: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiStrings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<UiStringsContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apidocs_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_details_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_create_page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<String>,
}

/// How the catalog renders the object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataUi {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strings: Option<UiStrings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<UiUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_by_side_index: Option<f64>,
}

/// Resource-controller capabilities of the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc_provisionable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iam_compatible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_updateable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_key_supported: Option<bool>,
}

/// `product_id`: the owning product, fixed at creation.
pub(crate) fn product_id_attribute() -> Attribute {
    Attribute::required_string()
        .with_description("The unique ID of the product.")
        .with_force_new()
        .with_validator(StringValidator::regexp(PRODUCT_ID_PATTERN))
        .with_validator(StringValidator::length(71, 71))
}

/// A parent catalog product or plan ID, fixed at creation.
pub(crate) fn catalog_object_id_attribute(description: &str) -> Attribute {
    Attribute::required_string()
        .with_description(description)
        .with_force_new()
        .with_validator(StringValidator::regexp(CATALOG_OBJECT_ID_PATTERN))
        .with_validator(StringValidator::length(2, 128))
}

/// `object_id`: chosen by the caller or assigned by the API.
pub(crate) fn object_id_attribute() -> Attribute {
    Attribute::optional_string()
        .with_description("The desired ID of the global catalog object.")
        .with_computed()
        .with_force_new()
}

pub(crate) fn object_provider_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("email", Attribute::optional_string()),
    )
    .with_min_items(1)
    .with_max_items(1)
}

pub(crate) fn overview_ui_block() -> NestedBlock {
    let translated = Block::new()
        .with_attribute("display_name", Attribute::optional_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("long_description", Attribute::optional_string());
    NestedBlock::single(
        Block::new().with_block("en", NestedBlock::single(translated).with_max_items(1)),
    )
    .with_max_items(1)
}

fn single(block: Block) -> NestedBlock {
    NestedBlock::single(block).with_max_items(1)
}

/// `metadata.ui` in the given flavor.
pub(crate) fn ui_block(flavor: UiFlavor) -> NestedBlock {
    let mut bullet = Block::new()
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("title", Attribute::optional_string());
    let mut media = Block::new()
        .with_attribute("caption", Attribute::required_string())
        .with_attribute("thumbnail", Attribute::optional_string())
        .with_attribute("type", Attribute::required_string())
        .with_attribute("url", Attribute::required_string());
    if flavor.localized() {
        bullet = bullet
            .with_attribute("description_i18n", Attribute::optional_string_map())
            .with_attribute("title_i18n", Attribute::optional_string_map());
        media = media.with_attribute("caption_i18n", Attribute::optional_string_map());
    }

    let content = Block::new()
        .with_block("bullets", NestedBlock::list(bullet))
        .with_block("media", NestedBlock::list(media));
    let content = match flavor {
        UiFlavor::Dashboard => {
            content.with_attribute("embeddable_dashboard", Attribute::optional_string())
        }
        UiFlavor::Navigation => content.with_block(
            "navigation_items",
            NestedBlock::list(
                Block::new()
                    .with_attribute("id", Attribute::optional_string())
                    .with_attribute("url", Attribute::optional_string())
                    .with_attribute("label", Attribute::optional_string()),
            ),
        ),
    };

    let urls = [
        "doc_url",
        "apidocs_url",
        "terms_url",
        "instructions_url",
        "catalog_details_url",
        "custom_create_page_url",
        "dashboard",
    ]
    .into_iter()
    .fold(Block::new(), |block, name| {
        block.with_attribute(name, Attribute::optional_string())
    });

    single(
        Block::new()
            .with_description("The UI metadata of this catalog object.")
            .with_block("strings", single(Block::new().with_block("en", single(content))))
            .with_block("urls", single(urls))
            .with_attribute("hidden", Attribute::optional_bool())
            .with_attribute("side_by_side_index", Attribute::optional_float64()),
    )
}

/// `metadata.service`.
pub(crate) fn service_block() -> NestedBlock {
    let block = SERVICE_FIELDS
        .iter()
        .fold(Block::new(), |block, field| {
            block.with_attribute(field.name, Attribute::optional_bool())
        });
    single(block.with_description("The global catalog metadata of the service."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::FieldKind;
    use crate::validation;
    use crate::schema::Schema;
    use serde_json::json;

    #[test]
    fn test_ui_flavors_differ_in_strings() {
        let dashboard = Block::new().with_block("ui", ui_block(UiFlavor::Dashboard));
        assert!(dashboard.resolves("ui.strings.en.embeddable_dashboard"));
        assert!(dashboard.resolves("ui.strings.en.bullets.0.title_i18n.fr"));
        assert!(!dashboard.resolves("ui.strings.en.navigation_items"));

        let navigation = Block::new().with_block("ui", ui_block(UiFlavor::Navigation));
        assert!(navigation.resolves("ui.strings.en.navigation_items.0.label"));
        assert!(!navigation.resolves("ui.strings.en.media.0.caption_i18n"));
        assert!(!navigation.resolves("ui.strings.en.embeddable_dashboard"));

        for flavor in [UiFlavor::Dashboard, UiFlavor::Navigation] {
            let strings = flavor.fields().iter().find(|f| f.name == "strings");
            assert!(matches!(strings.map(|f| f.kind), Some(FieldKind::Object(_))));
        }
    }

    #[test]
    fn test_media_requires_caption_type_and_url() {
        let schema = Schema::v0().with_block("ui", ui_block(UiFlavor::Dashboard));
        let config = |media: serde_json::Value| {
            json!({"ui": {"strings": {"en": {"media": [media]}}}})
        };

        assert!(validation::is_valid(
            &schema,
            &config(json!({"caption": "Tour", "type": "youtube", "url": "https://acme.example/tour"}))
        ));
        assert!(!validation::is_valid(&schema, &config(json!({"caption": "Tour"}))));
    }

    #[test]
    fn test_ui_model_reads_side_by_side_index() {
        let ui: MetadataUi = serde_json::from_value(json!({
            "hidden": false,
            "side_by_side_index": 1.5,
            "strings": {"en": {"bullets": [{"title": "Fast", "title_i18n": {"fr": "Rapide"}}]}}
        }))
        .unwrap();
        assert_eq!(ui.side_by_side_index, Some(1.5));
        let bullets = ui.strings.and_then(|s| s.en).and_then(|en| en.bullets).unwrap();
        assert_eq!(bullets[0].title_i18n.as_ref().unwrap()["fr"], "Rapide");
    }
}
