//! Partner Center Sell provider
//!
//! Manages Partner Center Sell onboarding objects (products, registrations,
//! IAM registrations and global-catalog products, plans and deployments) from
//! declarative configuration, and keeps updates precise: every update is an
//! RFC 7396 merge-patch in which removed fields are sent as explicit `null`
//! and untouched fields are left out.
//!
//! # Overview
//!
//! - **Patch reconciliation** ([`patch`]): corrects a sparse patch against a
//!   [`ConfigSnapshot`] using a static [`FieldSpec`] table per resource
//! - **Snapshots** ([`snapshot`]): change and presence flags over prior and planned state
//! - **Transport** ([`client`]): the [`PartnerCenterSellApi`] trait, injected at construction
//! - **Resources** ([`resources`]): schema, models and CRUD glue per resource type
//! - **Provider** ([`service`]): the [`ProviderService`] trait and [`PartnerCenterSellProvider`]
//! - **Validation**, **error types** and **logging** shared by all of the above
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use partner_center_sell_provider::{
//!     init_logging, InMemoryPartnerCenter, PartnerCenterSellProvider, ProviderService,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     let provider = PartnerCenterSellProvider::new(Arc::new(InMemoryPartnerCenter::new()));
//!     provider.configure(json!({"env": "current"})).await?;
//!
//!     let prior = provider.create("onboarding_product", json!({
//!         "type": "software",
//!         "primary_contact": {"name": "Pat", "email": "pat@example.com"},
//!         "tax_assessment": "high"
//!     })).await?;
//!
//!     // Removing tax_assessment sends {"tax_assessment": null}.
//!     let mut planned = prior.clone();
//!     planned["tax_assessment"] = json!(null);
//!     provider.update("onboarding_product", prior, planned).await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod patch;
pub mod resources;
pub mod schema;
pub mod service;
pub mod snapshot;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::{InMemoryPartnerCenter, PartnerCenterSellApi};
pub use config::ProviderConfig;
pub use error::{ApiError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use patch::{as_patch, reconcile, FieldKind, FieldOutcome, FieldSpec, MergePatch};
pub use resources::{
    CatalogDeploymentResource, CatalogPlanResource, CatalogProductResource, IamRegistrationResource,
    ProductResource, RegistrationResource, ResourceHandler,
};
pub use schema::ProviderSchema;
pub use service::{PartnerCenterSellProvider, ProviderService};
pub use snapshot::{ConfigSnapshot, ResourceDiff};
pub use types::{AttributeChange, CompositeId, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
