//! Transport seam between resource glue and the Partner Center Sell API.
//!
//! Resources never talk HTTP themselves. They receive a
//! [`PartnerCenterSellApi`] from the provider, which owns it for the lifetime
//! of the process. [`InMemoryPartnerCenter`] is a complete implementation
//! backed by a map, used by the test-suite and by hosts that want a dry run.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ApiError;
use crate::patch::MergePatch;

/// Operations the provider needs from the Partner Center Sell API.
///
/// Paths are API-relative, e.g. `/products/{id}`. `env` selects the
/// environment the object lives in and maps to the `env` query parameter.
#[async_trait]
pub trait PartnerCenterSellApi: Send + Sync {
    /// `POST {collection}`: create an object and return it with its ID.
    async fn create(
        &self,
        collection: &str,
        env: Option<&str>,
        body: Value,
    ) -> Result<Value, ApiError>;

    /// `GET {path}`.
    async fn get(&self, path: &str, env: Option<&str>) -> Result<Value, ApiError>;

    /// `PATCH {path}` with an RFC 7396 merge-patch body.
    async fn update(
        &self,
        path: &str,
        env: Option<&str>,
        patch: MergePatch,
    ) -> Result<Value, ApiError>;

    /// `DELETE {path}`.
    async fn delete(&self, path: &str, env: Option<&str>) -> Result<(), ApiError>;
}

/// HTTP-like verb of a recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Create.
    Post,
    /// Read.
    Get,
    /// Merge-patch update.
    Patch,
    /// Delete.
    Delete,
}

/// A request seen by [`InMemoryPartnerCenter`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedRequest {
    /// Verb.
    pub method: Method,
    /// Collection or object path.
    pub path: String,
    /// Environment query parameter.
    pub env: Option<String>,
    /// Request body for create and update.
    pub body: Option<Value>,
}

/// Collections whose objects are keyed by their `name` rather than a generated ID.
const NAMED_COLLECTIONS: &[&str] = &["iam_registrations"];

#[derive(Debug, Default)]
struct Store {
    objects: BTreeMap<String, Value>,
    requests: Vec<RecordedRequest>,
    next_id: u64,
    fail_next: Option<ApiError>,
}

impl Store {
    fn record(&mut self, method: Method, path: &str, env: Option<&str>, body: Option<Value>) {
        self.requests.push(RecordedRequest {
            method,
            path: path.to_string(),
            env: env.map(str::to_string),
            body,
        });
    }

    fn take_failure(&mut self) -> Result<(), ApiError> {
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn allocate_id(&mut self, collection: &str) -> String {
        self.next_id += 1;
        let n = self.next_id;
        if collection == "/products" {
            // Product IDs are `<32 alphanumerics>:o:<uuid>`.
            format!(
                "{:032x}:o:{:08x}-0000-4000-8000-{:012x}",
                n, n, n
            )
        } else {
            let leaf = collection.rsplit('/').next().unwrap_or("object");
            format!("{}-{}", leaf.trim_end_matches('s'), n)
        }
    }
}

/// An in-process Partner Center Sell API.
///
/// Objects are stored by path. Creating under a nested collection requires the
/// parent object to exist, and deleting an object deletes everything below it.
/// IAM registrations are keyed by their name; creating one twice is a conflict.
/// Updates apply RFC 7396 merge-patch semantics.
#[derive(Debug, Default)]
pub struct InMemoryPartnerCenter {
    store: RwLock<Store>,
}

impl InMemoryPartnerCenter {
    /// Create an empty API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object at `path`.
    pub async fn insert(&self, path: impl Into<String>, object: Value) {
        self.store.write().await.objects.insert(path.into(), object);
    }

    /// The stored object at `path`.
    pub async fn object(&self, path: &str) -> Option<Value> {
        self.store.read().await.objects.get(path).cloned()
    }

    /// Every request received so far, oldest first.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.store.read().await.requests.clone()
    }

    /// The body of the most recent merge-patch request.
    pub async fn last_patch(&self) -> Option<Value> {
        self.store
            .read()
            .await
            .requests
            .iter()
            .rev()
            .find(|r| r.method == Method::Patch)
            .and_then(|r| r.body.clone())
    }

    /// Make the next call fail with `error`.
    pub async fn fail_next(&self, error: ApiError) {
        self.store.write().await.fail_next = Some(error);
    }
}

#[async_trait]
impl PartnerCenterSellApi for InMemoryPartnerCenter {
    async fn create(
        &self,
        collection: &str,
        env: Option<&str>,
        body: Value,
    ) -> Result<Value, ApiError> {
        let mut store = self.store.write().await;
        store.record(Method::Post, collection, env, Some(body.clone()));
        store.take_failure()?;

        let parent = collection.rsplit_once('/').map_or("", |(parent, _)| parent);
        if !parent.is_empty() && !store.objects.contains_key(parent) {
            return Err(ApiError::not_found(parent));
        }

        let Value::Object(mut object) = body else {
            return Err(ApiError::new(400, "request body must be an object"));
        };
        let leaf = collection.rsplit('/').next().unwrap_or_default();
        let id = if NAMED_COLLECTIONS.contains(&leaf) {
            let name = object
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| ApiError::new(400, "name is required"))?
                .to_string();
            if store.objects.contains_key(&format!("{}/{}", collection, name)) {
                return Err(ApiError::new(409, format!("{} already exists", name)));
            }
            name
        } else {
            let id = store.allocate_id(collection);
            object.insert("id".to_string(), Value::String(id.clone()));
            id
        };
        let object = Value::Object(object);

        debug!(collection, id = %id, "created object");
        store
            .objects
            .insert(format!("{}/{}", collection, id), object.clone());
        Ok(object)
    }

    async fn get(&self, path: &str, env: Option<&str>) -> Result<Value, ApiError> {
        let mut store = self.store.write().await;
        store.record(Method::Get, path, env, None);
        store.take_failure()?;
        store
            .objects
            .get(path)
            .cloned()
            .ok_or_else(|| ApiError::not_found(path))
    }

    async fn update(
        &self,
        path: &str,
        env: Option<&str>,
        patch: MergePatch,
    ) -> Result<Value, ApiError> {
        let mut store = self.store.write().await;
        store.record(Method::Patch, path, env, Some(Value::Object(patch.clone())));
        store.take_failure()?;

        let object = store
            .objects
            .get_mut(path)
            .ok_or_else(|| ApiError::not_found(path))?;
        let id = object.get("id").cloned();
        apply_merge_patch(object, Value::Object(patch));
        if let (Some(id), Value::Object(map)) = (id, &mut *object) {
            map.insert("id".to_string(), id);
        }
        Ok(object.clone())
    }

    async fn delete(&self, path: &str, env: Option<&str>) -> Result<(), ApiError> {
        let mut store = self.store.write().await;
        store.record(Method::Delete, path, env, None);
        store.take_failure()?;

        if store.objects.remove(path).is_none() {
            return Err(ApiError::not_found(path));
        }
        let children = format!("{}/", path);
        store.objects.retain(|key, _| !key.starts_with(&children));
        Ok(())
    }
}

/// Apply an RFC 7396 merge-patch to `target` in place.
///
/// Objects merge recursively, `null` removes the key, anything else replaces.
pub fn apply_merge_patch(target: &mut Value, patch: Value) {
    let Value::Object(patch) = patch else {
        *target = patch;
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Default::default());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(&key);
            } else {
                apply_merge_patch(target.entry(key).or_insert(Value::Null), value);
            }
        }
    }
}
