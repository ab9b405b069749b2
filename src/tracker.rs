//! In-memory object store serving the mock server's CRUD mode

use crate::utils::{ensure_metadata, increment_resource_version};
use http::StatusCode;
use kube::api::ObjectMeta;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, trace};

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GVR {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GVR {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }
}

/// Failure raised by the store, rendered by the mock server as a `Status` body
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{resource} \"{name}\" not found")]
    NotFound { resource: String, name: String },

    #[error("{resource} \"{name}\" already exists")]
    AlreadyExists { resource: String, name: String },

    #[error("Operation cannot be fulfilled on {resource} \"{name}\": {reason}")]
    Conflict {
        resource: String,
        name: String,
        reason: String,
    },

    #[error("{0}")]
    Invalid(String),

    #[error("malformed object: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl StoreError {
    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::AlreadyExists { .. } | StoreError::Conflict { .. } => StatusCode::CONFLICT,
            StoreError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::Malformed(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "NotFound",
            StoreError::AlreadyExists { .. } => "AlreadyExists",
            StoreError::Conflict { .. } => "Conflict",
            StoreError::Invalid(_) => "Invalid",
            StoreError::Malformed(_) => "BadRequest",
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

type ObjectsByName = BTreeMap<String, Value>;
type ObjectsByNamespace = BTreeMap<String, ObjectsByName>;
type ObjectStorage = HashMap<GVR, ObjectsByNamespace>;

/// Objects keyed by resource, namespace and name
///
/// Cluster-scoped objects live under the empty namespace.
#[derive(Default)]
pub struct ObjectTracker {
    objects: RwLock<ObjectStorage>,
    with_status_subresource: RwLock<HashSet<GVR>>,
}

impl ObjectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_status_subresource(&self, gvr: GVR) {
        self.with_status_subresource
            .write()
            .expect("ObjectTracker lock poisoned")
            .insert(gvr);
    }

    pub fn has_status_subresource(&self, gvr: &GVR) -> bool {
        self.with_status_subresource
            .read()
            .expect("ObjectTracker lock poisoned")
            .contains(gvr)
    }

    /// Seed an object as-is, overwriting any previous one with the same name
    pub fn add(&self, gvr: &GVR, mut object: Value, namespace: &str) -> StoreResult<Value> {
        trace!("Adding object: {:?} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = require_name(&meta)?;

        if meta.resource_version.as_deref().is_none_or(str::is_empty) {
            meta.resource_version = Some("1".to_string());
        }
        ensure_metadata(&mut meta, namespace);
        object["metadata"] = serde_json::to_value(&meta)?;

        self.objects
            .write()
            .expect("ObjectTracker lock poisoned")
            .entry(gvr.clone())
            .or_default()
            .entry(namespace.to_string())
            .or_default()
            .insert(name.clone(), object.clone());

        debug!("Added object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn create(&self, gvr: &GVR, mut object: Value, namespace: &str) -> StoreResult<Value> {
        trace!("Creating object: {:?} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = require_name(&meta)?;

        if meta.resource_version.as_deref().is_some_and(|rv| !rv.is_empty()) {
            return Err(StoreError::Invalid(
                "resourceVersion can not be set for Create requests".to_string(),
            ));
        }

        let mut objects = self.objects.write().expect("ObjectTracker lock poisoned");
        let ns_objects = objects
            .entry(gvr.clone())
            .or_default()
            .entry(namespace.to_string())
            .or_default();

        if ns_objects.contains_key(&name) {
            return Err(StoreError::AlreadyExists {
                resource: gvr.resource.clone(),
                name,
            });
        }

        meta.resource_version = Some("1".to_string());
        ensure_metadata(&mut meta, namespace);
        object["metadata"] = serde_json::to_value(&meta)?;
        ns_objects.insert(name.clone(), object.clone());

        debug!("Created object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn get(&self, gvr: &GVR, namespace: &str, name: &str) -> StoreResult<Value> {
        trace!("Getting object: {:?} {}/{}", gvr, namespace, name);

        self.objects
            .read()
            .expect("ObjectTracker lock poisoned")
            .get(gvr)
            .and_then(|by_ns| by_ns.get(namespace))
            .and_then(|by_name| by_name.get(name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                resource: gvr.resource.clone(),
                name: name.to_string(),
            })
    }

    /// Replace a stored object
    ///
    /// A non-empty resourceVersion on the incoming object must equal the
    /// stored one. Status updates only change `status`; regular updates keep
    /// the stored `status` when the resource has a status subresource.
    pub fn update(
        &self,
        gvr: &GVR,
        mut object: Value,
        namespace: &str,
        is_status: bool,
    ) -> StoreResult<Value> {
        trace!("Updating object: {:?} in namespace: {}", gvr, namespace);

        let meta = extract_metadata(&object)?;
        let name = require_name(&meta)?;

        let mut objects = self.objects.write().expect("ObjectTracker lock poisoned");
        let existing = objects
            .get_mut(gvr)
            .and_then(|by_ns| by_ns.get_mut(namespace))
            .and_then(|by_name| by_name.get_mut(&name))
            .ok_or_else(|| StoreError::NotFound {
                resource: gvr.resource.clone(),
                name: name.clone(),
            })?;
        let existing_meta = extract_metadata(existing)?;

        if let (Some(provided), Some(current)) = (
            meta.resource_version.as_deref().filter(|rv| !rv.is_empty()),
            existing_meta.resource_version.as_deref(),
        ) {
            if provided != current {
                return Err(StoreError::Conflict {
                    resource: gvr.resource.clone(),
                    name,
                    reason: format!(
                        "the object has been modified; expected resourceVersion {}, got {}",
                        current, provided
                    ),
                });
            }
        }

        if is_status {
            let status = object.get("status").cloned().unwrap_or(Value::Null);
            object = existing.clone();
            object["status"] = status;
        } else if self.has_status_subresource(gvr) {
            match existing.get("status") {
                Some(status) => object["status"] = status.clone(),
                None => {
                    if let Some(obj) = object.as_object_mut() {
                        obj.remove("status");
                    }
                }
            }
        }

        let mut new_meta = if is_status {
            existing_meta.clone()
        } else {
            meta
        };
        new_meta.resource_version = Some(increment_resource_version(
            existing_meta.resource_version.as_deref().unwrap_or(""),
        )?);
        new_meta.uid = existing_meta.uid;
        new_meta.creation_timestamp = existing_meta.creation_timestamp;
        ensure_metadata(&mut new_meta, namespace);
        object["metadata"] = serde_json::to_value(&new_meta)?;

        *existing = object.clone();

        debug!("Updated object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn delete(&self, gvr: &GVR, namespace: &str, name: &str) -> StoreResult<Value> {
        trace!("Deleting object: {:?} {}/{}", gvr, namespace, name);

        let removed = self
            .objects
            .write()
            .expect("ObjectTracker lock poisoned")
            .get_mut(gvr)
            .and_then(|by_ns| by_ns.get_mut(namespace))
            .and_then(|by_name| by_name.remove(name))
            .ok_or_else(|| StoreError::NotFound {
                resource: gvr.resource.clone(),
                name: name.to_string(),
            })?;

        debug!("Deleted object: {}/{}", namespace, name);
        Ok(removed)
    }

    /// Objects of a resource in one namespace, or in all of them, ordered by namespace then name
    pub fn list(&self, gvr: &GVR, namespace: Option<&str>) -> Vec<Value> {
        trace!("Listing objects: {:?} in namespace: {:?}", gvr, namespace);

        let objects = self.objects.read().expect("ObjectTracker lock poisoned");
        let Some(by_ns) = objects.get(gvr) else {
            return Vec::new();
        };

        match namespace {
            Some(ns) => by_ns
                .get(ns)
                .map(|by_name| by_name.values().cloned().collect())
                .unwrap_or_default(),
            None => by_ns
                .values()
                .flat_map(|by_name| by_name.values().cloned())
                .collect(),
        }
    }
}

fn extract_metadata(object: &Value) -> StoreResult<ObjectMeta> {
    let meta = object
        .get("metadata")
        .cloned()
        .ok_or_else(|| StoreError::Invalid("object is missing metadata".to_string()))?;
    Ok(serde_json::from_value(meta)?)
}

fn require_name(meta: &ObjectMeta) -> StoreResult<String> {
    meta.name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| StoreError::Invalid("metadata.name is required".to_string()))
}
