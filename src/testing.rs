//! Test harness for driving a provider end to end.
//!
//! [`ProviderTester`] wraps any [`ProviderService`] and chains plan, apply and
//! refresh the way a host would. The assertion helpers check plans,
//! diagnostics, and the merge-patch bodies a provider sent.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use partner_center_sell_provider::testing::{assert_patch_clears, ProviderTester};
//! use partner_center_sell_provider::{InMemoryPartnerCenter, PartnerCenterSellProvider};
//!
//! let api = Arc::new(InMemoryPartnerCenter::new());
//! let tester = ProviderTester::new(PartnerCenterSellProvider::new(api.clone()));
//! let state = tester.lifecycle_create("onboarding_product", config).await?;
//! tester.lifecycle_update("onboarding_product", state, without_tax_assessment).await?;
//! assert_patch_clears(&api.last_patch().await.unwrap(), "tax_assessment");
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::snapshot::lookup;
use crate::types::{ImportedResource, PlanResult};

/// A test harness for provider implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Validate provider configuration, failing on any error diagnostic.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider, failing on any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration, failing on any error diagnostic.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, proposed_state).await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state)
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a resource.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<ImportedResource, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Plan, create, then refresh. Returns the refreshed state.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.refresh(resource_type, created).await
    }

    /// Plan, update, then refresh. Returns the refreshed state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        if plan.requires_replace {
            return Err(ProviderError::FailedPrecondition(format!(
                "plan for {} requires replacement",
                resource_type
            )));
        }
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.refresh(resource_type, updated).await
    }

    /// Plan a delete, then delete.
    pub async fn lifecycle_delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update, then delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }

    async fn refresh(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.read(resource_type, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("{} vanished on refresh", resource_type)))
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation returned error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed outright.
    Provider(ProviderError),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "{} error diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  {}", diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Assert that a plan has changes and does not replace.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan has no changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got: {:?}",
        changed_paths(plan)
    );
}

/// Assert that a plan requires resource replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, changed: {:?}",
        changed_paths(plan)
    );
}

/// Assert that a plan updates in place.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty() && !plan.requires_replace,
        "Expected an in-place update, got replace={} changes={:?}",
        plan.requires_replace,
        changed_paths(plan)
    );
}

/// Assert that a plan changes the given top-level attribute or block.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change '{}', changed: {:?}",
        path,
        changed_paths(plan)
    );
}

/// Assert that a plan leaves the given top-level attribute or block alone.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !plan.changes.iter().any(|c| c.path == path),
        "Expected plan to not change '{}', but it was changed",
        path
    );
}

/// Assert that diagnostics contain no errors.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).map(|d| &d.summary).collect();
    assert!(errors.is_empty(), "Expected no errors, but got: {:?}", errors);
}

/// Assert that diagnostics contain an error mentioning `substring` in its
/// summary or detail.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics.iter().filter(|d| d.is_error()).any(|d| {
        d.summary.contains(substring) || d.detail.as_deref().is_some_and(|s| s.contains(substring))
    });
    assert!(
        found,
        "Expected an error containing '{}', got: {:?}",
        substring, diagnostics
    );
}

/// Assert that a merge-patch explicitly clears the dotted `path`.
pub fn assert_patch_clears(patch: &Value, path: &str) {
    assert_eq!(
        lookup(patch, path),
        Some(&Value::Null),
        "Expected patch to clear '{}': {}",
        path,
        patch
    );
}

/// Assert that a merge-patch does not mention the dotted `path` at all.
pub fn assert_patch_omits(patch: &Value, path: &str) {
    assert!(
        lookup(patch, path).is_none(),
        "Expected patch to omit '{}': {}",
        path,
        patch
    );
}

/// Assert that a merge-patch sets the dotted `path` to `expected`.
pub fn assert_patch_sets(patch: &Value, path: &str, expected: &Value) {
    assert_eq!(
        lookup(patch, path),
        Some(expected),
        "Expected patch to set '{}': {}",
        path,
        patch
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryPartnerCenter;
    use crate::service::PartnerCenterSellProvider;
    use serde_json::json;
    use std::sync::Arc;

    const PRODUCT: &str = "onboarding_product";
    const CATALOG_PRODUCT: &str = "onboarding_catalog_product";

    fn tester() -> (Arc<InMemoryPartnerCenter>, ProviderTester<PartnerCenterSellProvider>) {
        let api = Arc::new(InMemoryPartnerCenter::new());
        let tester = ProviderTester::new(PartnerCenterSellProvider::new(api.clone()));
        (api, tester)
    }

    fn product_config() -> Value {
        json!({
            "type": "software",
            "primary_contact": {"name": "Pat", "email": "pat@example.com"},
            "ero_class": "standard",
            "tax_assessment": "high",
            "support": {
                "escalation_contacts": [
                    {"name": "Sam", "email": "sam@example.com", "role": "lead"},
                    {"name": "Kim", "email": "kim@example.com"}
                ]
            }
        })
    }

    fn catalog_config(product_id: &str) -> Value {
        json!({
            "product_id": product_id,
            "name": "acme-widget",
            "active": true,
            "disabled": false,
            "kind": "composite",
            "object_provider": {"name": "Acme", "email": "ops@acme.example"},
            "metadata": {
                "other": {
                    "composite": {
                        "composite_kind": "service",
                        "composite_tag": "widget",
                        "children": [{"kind": "service", "name": "widget-api"}]
                    }
                }
            }
        })
    }

    async fn last_patch(api: &InMemoryPartnerCenter) -> Value {
        api.last_patch().await.expect("no merge-patch was sent")
    }

    #[tokio::test]
    async fn test_configure_and_schema() {
        let (_, tester) = tester();
        tester.configure(json!({"env": "current"})).await.unwrap();
        assert!(tester.configure(json!({"env": "Bad Env"})).await.is_err());
        assert!(tester.schema().resources.contains_key(PRODUCT));
        assert_eq!(tester.resource_types().len(), 6);
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let (_, tester) = tester();
        tester
            .validate_resource_config(PRODUCT, product_config())
            .await
            .unwrap();

        let mut config = product_config();
        config["type"] = json!("hardware");
        let err = tester
            .validate_resource_config(PRODUCT, config)
            .await
            .unwrap_err();
        match err {
            TestError::Diagnostics(diagnostics) => {
                assert_error_contains(&diagnostics, "software_saas");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_plans() {
        let (_, tester) = tester();
        let plan = tester.plan_create(PRODUCT, product_config()).await.unwrap();
        assert_plan_creates(&plan);
        assert_plan_changes_attribute(&plan, "type");

        let state = tester.lifecycle_create(PRODUCT, product_config()).await.unwrap();
        let plan = tester.plan_update(PRODUCT, state.clone(), product_config()).await.unwrap();
        assert_plan_no_changes(&plan);

        let mut changed = product_config();
        changed["ero_class"] = json!("restricted");
        let plan = tester.plan_update(PRODUCT, state.clone(), changed).await.unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "ero_class");
        assert_plan_does_not_change_attribute(&plan, "tax_assessment");

        let mut retyped = product_config();
        retyped["type"] = json!("service");
        let plan = tester.plan_update(PRODUCT, state, retyped).await.unwrap();
        assert_plan_replaces(&plan);
    }

    #[tokio::test]
    async fn test_cleared_field_is_sent_as_null() {
        let (api, tester) = tester();
        let state = tester.lifecycle_create(PRODUCT, product_config()).await.unwrap();

        let mut config = product_config();
        config["tax_assessment"] = json!("");
        let updated = tester.lifecycle_update(PRODUCT, state, config).await.unwrap();

        let patch = last_patch(&api).await;
        assert_patch_clears(&patch, "tax_assessment");
        assert!(updated.get("tax_assessment").is_none());
    }

    #[tokio::test]
    async fn test_unchanged_field_is_omitted() {
        let (api, tester) = tester();
        let state = tester.lifecycle_create(PRODUCT, product_config()).await.unwrap();

        let mut config = product_config();
        config["eccn_number"] = json!("5D002");
        tester.lifecycle_update(PRODUCT, state, config).await.unwrap();

        let patch = last_patch(&api).await;
        assert_patch_sets(&patch, "eccn_number", &json!("5D002"));
        assert_patch_omits(&patch, "ero_class");
        assert_patch_omits(&patch, "tax_assessment");
        assert_patch_omits(&patch, "primary_contact");
    }

    #[tokio::test]
    async fn test_cleared_nested_list_keeps_siblings() {
        let (api, tester) = tester();
        let product = tester.lifecycle_create(PRODUCT, product_config()).await.unwrap();
        let product_id = product["id"].as_str().unwrap().to_string();
        let state = tester
            .lifecycle_create(CATALOG_PRODUCT, catalog_config(&product_id))
            .await
            .unwrap();

        let mut config = catalog_config(&product_id);
        config["metadata"]["other"]["composite"]["children"] = json!([]);
        let updated = tester
            .lifecycle_update(CATALOG_PRODUCT, state, config)
            .await
            .unwrap();

        let patch = last_patch(&api).await;
        assert_patch_clears(&patch, "metadata.other.composite.children");
        assert_patch_sets(&patch, "metadata.other.composite.composite_kind", &json!("service"));
        assert_patch_sets(&patch, "metadata.other.composite.composite_tag", &json!("widget"));
        assert!(updated["metadata"]["other"]["composite"].get("children").is_none());
    }

    #[tokio::test]
    async fn test_changed_nested_field_passes_through() {
        let (api, tester) = tester();
        let state = tester.lifecycle_create(PRODUCT, product_config()).await.unwrap();

        let mut config = product_config();
        config["primary_contact"]["email"] = json!("pat@acme.example");
        let updated = tester.lifecycle_update(PRODUCT, state, config).await.unwrap();

        let patch = last_patch(&api).await;
        assert_patch_sets(&patch, "primary_contact.email", &json!("pat@acme.example"));
        assert_patch_omits(&patch, "support");
        assert_eq!(updated["primary_contact"]["email"], "pat@acme.example");
    }

    #[tokio::test]
    async fn test_list_elements_reconciled_individually() {
        let (api, tester) = tester();
        let state = tester.lifecycle_create(PRODUCT, product_config()).await.unwrap();

        let mut config = product_config();
        config["support"]["escalation_contacts"][0]["role"] = json!("");
        tester.lifecycle_update(PRODUCT, state, config).await.unwrap();

        let patch = last_patch(&api).await;
        assert_patch_clears(&patch, "support.escalation_contacts.0.role");
        assert_patch_sets(&patch, "support.escalation_contacts.1.name", &json!("Kim"));
        assert_patch_omits(&patch, "support.escalation_contacts.1.role");
    }

    #[tokio::test]
    async fn test_lifecycle_crud_and_import() {
        let (api, tester) = tester();
        tester.configure(json!({"env": "current"})).await.unwrap();

        let mut updated_config = product_config();
        updated_config["ero_class"] = json!("restricted");
        let updated = tester
            .lifecycle_crud(PRODUCT, product_config(), updated_config)
            .await
            .unwrap();
        assert_eq!(updated["ero_class"], "restricted");
        assert_eq!(updated["env"], "current");

        let id = updated["id"].as_str().unwrap();
        assert!(tester.read(PRODUCT, updated.clone()).await.unwrap().is_none());
        assert!(tester.import_resource(PRODUCT, id).await.unwrap_err().is_not_found());
        assert!(api.requests().await.iter().all(|r| r.env.as_deref() == Some("current")));
    }

    #[tokio::test]
    async fn test_catalog_hierarchy_lifecycle() {
        let (_, tester) = tester();
        let product = tester.lifecycle_create(PRODUCT, product_config()).await.unwrap();
        let product_id = product["id"].as_str().unwrap();
        let catalog = tester
            .lifecycle_create(CATALOG_PRODUCT, catalog_config(product_id))
            .await
            .unwrap();

        let plan = tester
            .lifecycle_create(
                "onboarding_catalog_plan",
                json!({
                    "product_id": product_id,
                    "catalog_product_id": catalog["catalog_product_id"],
                    "name": "Standard",
                    "active": true,
                    "disabled": false,
                    "kind": "plan",
                    "tags": ["paid"],
                    "object_provider": {"name": "Acme", "email": "ops@acme.example"}
                }),
            )
            .await
            .unwrap();
        assert_eq!(plan["id"].as_str().unwrap().split('/').count(), 3);

        let config = json!({
            "product_id": product_id,
            "catalog_product_id": plan["catalog_product_id"],
            "catalog_plan_id": plan["catalog_plan_id"],
            "name": "eu-de",
            "active": true,
            "disabled": false,
            "kind": "deployment",
            "tags": ["eu-de"],
            "object_provider": {"name": "Acme", "email": "ops@acme.example"},
            "metadata": {"deployment": {"location": "eu-de"}}
        });
        let deployment = tester
            .lifecycle_create("onboarding_catalog_deployment", config.clone())
            .await
            .unwrap();
        assert_eq!(deployment["id"].as_str().unwrap().split('/').count(), 4);

        let mut disabled = config;
        disabled["disabled"] = json!(true);
        let deployment = tester
            .lifecycle_update("onboarding_catalog_deployment", deployment, disabled)
            .await
            .unwrap();
        assert_eq!(deployment["disabled"], true);

        tester.delete(PRODUCT, product).await.unwrap();
        assert!(tester
            .read("onboarding_catalog_deployment", deployment)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_update_refuses_replacement() {
        let (_, tester) = tester();
        let state = tester.lifecycle_create(PRODUCT, product_config()).await.unwrap();

        let mut config = product_config();
        config["type"] = json!("service");
        let err = tester.lifecycle_update(PRODUCT, state, config).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[test]
    fn test_assert_no_errors() {
        assert_no_errors(&[Diagnostic::warning("Just a warning")]);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("An error")]);
    }

    #[test]
    #[should_panic(expected = "Expected patch to omit")]
    fn test_assert_patch_omits_fails_on_null() {
        assert_patch_omits(&json!({"tax_assessment": null}), "tax_assessment");
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("First error").with_attribute("env"),
            Diagnostic::error("Second error").with_detail("More info"),
        ]);

        let display = err.to_string();
        assert!(display.contains("First error"));
        assert!(display.contains("(at env)"));
        assert!(display.contains("More info"));
    }
}
