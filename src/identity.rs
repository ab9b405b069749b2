//! Resource addressing
//!
//! A [`ResourceIdentity`] is the narrowed target of an operation: a resource
//! type plus whatever namespace/name the caller pinned. It is resolved against
//! an item's metadata into a concrete [`Address`] right before a request is
//! built.

use crate::client_utils::pluralize;
use crate::{Error, Result};
use kube::api::ObjectMeta;
use kube::core::{ClusterResourceScope, NamespaceResourceScope};
use kube::Resource;

/// Compile-time scope of a resource type
pub trait Scope {
    const NAMESPACED: bool;
}

impl Scope for NamespaceResourceScope {
    const NAMESPACED: bool = true;
}

impl Scope for ClusterResourceScope {
    const NAMESPACED: bool = false;
}

/// Group/version/kind descriptor of a resource type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceType {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl ResourceType {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        plural: impl Into<String>,
        namespaced: bool,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: plural.into(),
            namespaced,
        }
    }

    /// Descriptor with the plural derived from the kind
    pub fn from_kind(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        namespaced: bool,
    ) -> Self {
        let kind = kind.into();
        let plural = pluralize(&kind);
        Self::new(group, version, kind, plural, namespaced)
    }

    /// Descriptor of a statically typed resource
    pub fn of<K>() -> Self
    where
        K: Resource,
        K::DynamicType: Default,
        K::Scope: Scope,
    {
        let dt = K::DynamicType::default();
        Self {
            group: K::group(&dt).into_owned(),
            version: K::version(&dt).into_owned(),
            kind: K::kind(&dt).into_owned(),
            plural: K::plural(&dt).into_owned(),
            namespaced: <K::Scope as Scope>::NAMESPACED,
        }
    }

    /// `apps/v1`, or just `v1` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// `/api/v1` for the core group, `/apis/{group}/{version}` otherwise
    pub fn url_prefix(&self) -> String {
        if self.group.is_empty() {
            format!("/api/{}", self.version)
        } else {
            format!("/apis/{}/{}", self.group, self.version)
        }
    }
}

/// Narrowed operation target
///
/// Every narrowing call returns a new value, so a partially narrowed identity
/// can be reused for several operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentity {
    resource: ResourceType,
    namespace: Option<String>,
    name: Option<String>,
    any_namespace: bool,
}

impl ResourceIdentity {
    pub fn new(resource: ResourceType) -> Self {
        Self {
            resource,
            namespace: None,
            name: None,
            any_namespace: false,
        }
    }

    pub fn in_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            any_namespace: false,
            ..self.clone()
        }
    }

    pub fn in_any_namespace(&self) -> Self {
        Self {
            namespace: None,
            any_namespace: true,
            ..self.clone()
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self.clone()
        }
    }

    pub fn resource(&self) -> &ResourceType {
        &self.resource
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_any_namespace(&self) -> bool {
        self.any_namespace
    }

    /// Resolve to a concrete address, filling gaps from `meta` when given
    ///
    /// Values pinned on the identity must agree with the item's metadata.
    /// A namespaced type with no namespace anywhere falls back to
    /// `default_namespace`, unless the identity spans all namespaces.
    pub fn resolve(&self, meta: Option<&ObjectMeta>, default_namespace: &str) -> Result<Address> {
        let item_name = meta.and_then(|m| m.name.as_deref());
        let item_namespace = meta.and_then(|m| m.namespace.as_deref());

        let name = match (self.name.as_deref(), item_name) {
            (Some(expected), Some(actual)) if expected != actual => {
                return Err(Error::NameMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
            (Some(name), _) | (None, Some(name)) => Some(name.to_string()),
            (None, None) => None,
        };

        let namespace = if !self.resource.namespaced {
            None
        } else {
            match (self.namespace.as_deref(), item_namespace) {
                (Some(expected), Some(actual)) if expected != actual => {
                    return Err(Error::NamespaceMismatch {
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
                (Some(ns), _) | (None, Some(ns)) => Some(ns.to_string()),
                (None, None) if self.any_namespace => None,
                (None, None) => Some(default_namespace.to_string()),
            }
        };

        Ok(Address {
            resource: self.resource.clone(),
            namespace,
            name,
        })
    }
}

/// Fully resolved request target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub resource: ResourceType,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl Address {
    /// Collection path, with the namespace segment when one is set
    pub fn collection_path(&self) -> String {
        let prefix = self.resource.url_prefix();
        match &self.namespace {
            Some(ns) => format!("{}/namespaces/{}/{}", prefix, ns, self.resource.plural),
            None => format!("{}/{}", prefix, self.resource.plural),
        }
    }

    /// Path of the single item this address names
    pub fn item_path(&self) -> Result<String> {
        let name = self.name.as_deref().ok_or_else(|| {
            Error::InvalidRequest(format!("a name is required to address a {}", self.resource.kind))
        })?;
        if self.resource.namespaced && self.namespace.is_none() {
            return Err(Error::InvalidRequest(format!(
                "{} {} has no namespace to address it in",
                self.resource.kind, name
            )));
        }
        Ok(format!("{}/{}", self.collection_path(), name))
    }
}
