//! Provider-level configuration.
//!
//! The host passes the provider block as JSON to
//! [`ProviderService::configure`](crate::service::ProviderService::configure).
//! Settings left out fall back to environment variables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema, StringValidator};
use crate::validation;

/// Environment variable supplying the default `env` when the provider block omits it.
pub const ENV_VAR: &str = "PARTNER_CENTER_SELL_ENV";

/// Pattern every `env` value must match.
pub const ENV_PATTERN: &str = "^[a-z]+$";

/// Settings shared by every resource operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Default environment for resources that do not set `env` themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

impl ProviderConfig {
    /// Parse the provider block.
    ///
    /// `null` yields the default configuration. The `env` fallback is applied
    /// and the result validated.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        let mut config: Self = if value.is_null() {
            Self::default()
        } else {
            serde_json::from_value(value)
                .map_err(|e| ProviderError::Configuration(e.to_string()))?
        };
        if config.env.as_deref().map_or(true, str::is_empty) {
            config.env = std::env::var(ENV_VAR).ok().filter(|v| !v.is_empty());
        }

        let diagnostics = config.validate();
        match diagnostics.into_iter().find(Diagnostic::is_error) {
            Some(diag) => Err(ProviderError::Configuration(
                diag.detail.unwrap_or(diag.summary),
            )),
            None => Ok(config),
        }
    }

    /// Set the default environment.
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Validate the settings against [`ProviderConfig::schema`].
    pub fn validate(&self) -> Vec<Diagnostic> {
        match serde_json::to_value(self) {
            Ok(value) => validation::validate(&Self::schema(), &value),
            Err(e) => vec![Diagnostic::error("Malformed provider configuration").with_detail(e.to_string())],
        }
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0().with_attribute("env", env_attribute())
    }
}

/// The `env` attribute shared by the provider block and every resource.
pub(crate) fn env_attribute() -> Attribute {
    Attribute::optional_string()
        .with_description("The environment to fetch this object from.")
        .with_validator(StringValidator::regexp(ENV_PATTERN))
        .with_validator(StringValidator::length(1, 64))
}
