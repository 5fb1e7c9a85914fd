//! The provider surface a host drives.
//!
//! [`ProviderService`] is the high-level interface: schema, configuration,
//! planning and CRUD per resource type, all in terms of JSON state documents.
//! [`PartnerCenterSellProvider`] implements it by dispatching to the
//! [`ResourceHandler`] registered for each resource type, handing every call
//! the transport it was constructed with.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::client::PartnerCenterSellApi;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::resources::{
    env_of, CatalogDeploymentResource, CatalogPlanResource, CatalogProductResource,
    IamRegistrationResource, ProductResource, RegistrationResource, ResourceHandler,
};
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::snapshot::{is_empty, normalize, ResourceDiff};
use crate::types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
use crate::validation;

/// Operations a provider exposes to its host.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use partner_center_sell_provider::{InMemoryPartnerCenter, PartnerCenterSellProvider, ProviderService};
/// use serde_json::json;
///
/// let provider = PartnerCenterSellProvider::new(Arc::new(InMemoryPartnerCenter::new()));
/// provider.configure(json!({"env": "current"})).await?;
/// let state = provider.create("onboarding_registration", json!({ /* ... */ })).await?;
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.schema().resources.keys().cloned().collect(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider. Returns diagnostics (errors and warnings).
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource. A null `proposed_state` plans a delete.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh a resource. `Ok(None)` means it no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Bring an existing object under management.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<ImportedResource, ProviderError>;
}

/// The Partner Center Sell provider.
///
/// Owns the transport for its whole lifetime; nothing is global.
pub struct PartnerCenterSellProvider {
    api: Arc<dyn PartnerCenterSellApi>,
    config: RwLock<ProviderConfig>,
    resources: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
}

impl PartnerCenterSellProvider {
    /// Create a provider talking to `api`, with every resource type registered.
    pub fn new(api: Arc<dyn PartnerCenterSellApi>) -> Self {
        let handlers: Vec<Box<dyn ResourceHandler>> = vec![
            Box::new(ProductResource::new()),
            Box::new(RegistrationResource::new()),
            Box::new(CatalogProductResource::new()),
            Box::new(CatalogPlanResource::new()),
            Box::new(CatalogDeploymentResource::new()),
            Box::new(IamRegistrationResource::new()),
        ];
        Self {
            api,
            config: RwLock::new(ProviderConfig::default()),
            resources: handlers.into_iter().map(|h| (h.type_name(), h)).collect(),
        }
    }

    /// Start from an already-parsed configuration instead of calling `configure`.
    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = RwLock::new(config);
        self
    }

    /// The active provider configuration.
    pub async fn config(&self) -> ProviderConfig {
        self.config.read().await.clone()
    }

    fn handler(&self, resource_type: &str) -> Result<&dyn ResourceHandler, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|handler| &**handler)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    /// Fill in the provider-level `env` when the resource does not set one.
    async fn with_default_env(&self, mut state: Value) -> Value {
        if env_of(&state).is_some() {
            return state;
        }
        let env = self.config.read().await.env.clone();
        if let (Some(env), Value::Object(map)) = (env, &mut state) {
            map.insert("env".to_string(), Value::String(env));
        }
        state
    }
}

/// Reject a configuration that fails schema validation.
fn ensure_valid(schema: &Schema, config: &Value) -> Result<(), ProviderError> {
    let details: Vec<String> = validation::validate(schema, config)
        .into_iter()
        .filter(Diagnostic::is_error)
        .map(|d| d.detail.unwrap_or(d.summary))
        .collect();
    if details.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::Validation(details.join("; ")))
    }
}

/// Copy computed attributes the proposed state does not know yet.
fn carry_computed(schema: &Schema, prior: &Value, planned: &mut Value) {
    let (Some(prior), Value::Object(planned)) = (prior.as_object(), planned) else {
        return;
    };
    for (name, attr) in &schema.block.attributes {
        if !attr.flags.computed || planned.get(name).is_some_and(|v| !is_empty(v)) {
            continue;
        }
        if let Some(value) = prior.get(name) {
            planned.insert(name.clone(), value.clone());
        }
    }
}

/// One change per configurable top-level attribute or block that differs.
fn diff_top_level(schema: &Schema, prior: &Value, planned: &Value) -> Vec<AttributeChange> {
    let attributes = schema
        .block
        .attributes
        .iter()
        .filter(|(_, attr)| attr.flags.required || attr.flags.optional)
        .map(|(name, _)| name);
    attributes
        .chain(schema.block.blocks.keys())
        .filter_map(|name| {
            let before = prior.get(name).and_then(normalize);
            let after = planned.get(name).and_then(normalize);
            match (before, after) {
                (before, after) if before == after => None,
                (None, Some(after)) => Some(AttributeChange::added(name.as_str(), after)),
                (Some(before), None) => Some(AttributeChange::removed(name.as_str(), before)),
                (Some(before), Some(after)) => {
                    Some(AttributeChange::modified(name.as_str(), before, after))
                }
                (None, None) => None,
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl ProviderService for PartnerCenterSellProvider {
    fn schema(&self) -> ProviderSchema {
        self.resources.iter().fold(
            ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
            |schema, (name, handler)| schema.with_resource(*name, handler.schema().clone()),
        )
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&ProviderConfig::schema(), &config))
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        match ProviderConfig::from_value(config) {
            Ok(parsed) => {
                info!(env = ?parsed.env, "provider configured");
                *self.config.write().await = parsed;
                Ok(vec![])
            }
            Err(e) => {
                warn!(error = %e, "provider configuration rejected");
                Ok(vec![e.into()])
            }
        }
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let handler = self.handler(resource_type)?;
        Ok(validation::validate(handler.schema(), &config))
    }

    #[instrument(skip(self, prior_state, proposed_state), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.handler(resource_type)?.schema();

        let result = match prior_state {
            None => {
                let planned = self.with_default_env(proposed_state).await;
                let changes = diff_top_level(schema, &Value::Null, &planned);
                PlanResult::with_changes(planned, changes, false)
            }
            Some(prior) if proposed_state.is_null() => {
                let changes = diff_top_level(schema, &prior, &Value::Null);
                PlanResult::with_changes(Value::Null, changes, false)
            }
            Some(prior) => {
                let mut planned = self.with_default_env(proposed_state).await;
                carry_computed(schema, &prior, &mut planned);
                let changes = diff_top_level(schema, &prior, &planned);
                if changes.is_empty() {
                    PlanResult::no_change(planned)
                } else {
                    let force_new: BTreeSet<&str> = schema.force_new_attributes().collect();
                    let requires_replace = changes.iter().any(|c| force_new.contains(c.path.as_str()));
                    PlanResult::with_changes(planned, changes, requires_replace)
                }
            }
        };

        debug!(
            resource_type,
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "plan completed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let handler = self.handler(resource_type)?;
        let planned = self.with_default_env(planned_state).await;
        ensure_valid(handler.schema(), &planned)?;
        handler.create(self.api.as_ref(), &planned).await
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError> {
        let handler = self.handler(resource_type)?;
        let state = self.with_default_env(current_state).await;
        let refreshed = handler.read(self.api.as_ref(), &state).await?;
        if refreshed.is_none() {
            info!(resource_type, "resource no longer exists, removing from state");
        }
        Ok(refreshed)
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.handler(resource_type)?;
        let mut planned = self.with_default_env(planned_state).await;
        carry_computed(handler.schema(), &prior_state, &mut planned);
        ensure_valid(handler.schema(), &planned)?;
        let diff = ResourceDiff::new(handler.schema(), &prior_state, &planned);
        handler.update(self.api.as_ref(), &diff).await
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let handler = self.handler(resource_type)?;
        let state = self.with_default_env(current_state).await;
        handler.delete(self.api.as_ref(), &state).await
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<ImportedResource, ProviderError> {
        let handler = self.handler(resource_type)?;
        let state = self.with_default_env(handler.import_state(id)?).await;
        match handler.read(self.api.as_ref(), &state).await? {
            Some(state) => Ok(ImportedResource::new(resource_type, state)),
            None => Err(ProviderError::NotFound(format!(
                "{} {} does not exist",
                resource_type, id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryPartnerCenter;
    use serde_json::json;

    fn provider() -> (Arc<InMemoryPartnerCenter>, PartnerCenterSellProvider) {
        let api = Arc::new(InMemoryPartnerCenter::new());
        let provider = PartnerCenterSellProvider::new(api.clone());
        (api, provider)
    }

    fn registration() -> Value {
        json!({
            "account_id": "4a5c3c51b97a446fbb1d0e1ef089823b",
            "company_name": "Acme",
            "primary_contact": {"name": "Pat", "email": "pat@example.com"}
        })
    }

    #[test]
    fn test_schema_lists_every_resource() {
        let (_, provider) = provider();
        let schema = provider.schema();
        assert!(schema.provider.block.attributes.contains_key("env"));
        assert_eq!(
            provider.metadata().resources,
            vec![
                "onboarding_catalog_deployment",
                "onboarding_catalog_plan",
                "onboarding_catalog_product",
                "onboarding_iam_registration",
                "onboarding_product",
                "onboarding_registration"
            ]
        );
    }

    #[tokio::test]
    async fn test_configure_reports_bad_env() {
        let (_, provider) = provider();
        let diagnostics = provider.configure(json!({"env": "PROD"})).await.unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
        assert_eq!(provider.config().await.env, None);
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let (_, provider) = provider();
        let err = provider
            .create("onboarding_catalog_pricing", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_provider_env_is_the_default() {
        let (api, provider) = provider();
        provider.configure(json!({"env": "stage"})).await.unwrap();

        let state = provider
            .create("onboarding_registration", registration())
            .await
            .unwrap();
        assert_eq!(state["env"], "stage");
        assert!(api
            .requests()
            .await
            .iter()
            .all(|r| r.env.as_deref() == Some("stage")));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_config() {
        let (api, provider) = provider();
        let mut config = registration();
        config["account_id"] = json!("short");
        let err = provider
            .create("onboarding_registration", config)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(api.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_plan_update_carries_computed_and_detects_replace() {
        let (_, provider) = provider();
        let prior = provider
            .create("onboarding_registration", registration())
            .await
            .unwrap();

        let mut proposed = registration();
        proposed["company_name"] = json!("Acme Corp");
        let plan = provider
            .plan("onboarding_registration", Some(prior.clone()), proposed)
            .await
            .unwrap();
        assert_eq!(plan.planned_state["id"], prior["id"]);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "company_name");
        assert!(!plan.requires_replace);

        let mut moved = registration();
        moved["account_id"] = json!("0000000000000000000000000000000a");
        let plan = provider
            .plan("onboarding_registration", Some(prior), moved)
            .await
            .unwrap();
        assert!(plan.requires_replace);
    }

    #[tokio::test]
    async fn test_plan_delete_removes_everything() {
        let (_, provider) = provider();
        let prior = json!({"id": "registration-1", "company_name": "Acme"});
        let plan = provider
            .plan("onboarding_registration", Some(prior), Value::Null)
            .await
            .unwrap();
        assert!(plan.planned_state.is_null());
        assert_eq!(
            plan.changes,
            vec![AttributeChange::removed("company_name", json!("Acme"))]
        );
    }

    #[tokio::test]
    async fn test_read_after_remote_delete() {
        let (api, provider) = provider();
        let state = provider
            .create("onboarding_registration", registration())
            .await
            .unwrap();
        api.delete(&format!("/registrations/{}", state["id"].as_str().unwrap()), None)
            .await
            .unwrap();

        let refreshed = provider.read("onboarding_registration", state).await.unwrap();
        assert!(refreshed.is_none());
    }

    #[tokio::test]
    async fn test_import() {
        let (_, provider) = provider();
        let state = provider
            .create("onboarding_registration", registration())
            .await
            .unwrap();
        let id = state["id"].as_str().unwrap();

        let imported = provider
            .import_resource("onboarding_registration", id)
            .await
            .unwrap();
        assert_eq!(imported.resource_type, "onboarding_registration");
        assert_eq!(imported.state["company_name"], "Acme");

        let err = provider
            .import_resource("onboarding_registration", "registration-99")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
