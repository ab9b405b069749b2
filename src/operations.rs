//! Resource operation engine
//!
//! [`Resources`] is an immutable handle: narrowing calls (`in_namespace`,
//! `with_name`, `with_label`, ...) return a new handle and the verbs
//! (`create`, `replace`, `edit`, `delete`, ...) turn the narrowed identity into
//! requests, send them through the client's transport and interpret the
//! response.
//!
//! Conflict handling differs per verb:
//!
//! | Status | create | create_or_replace | replace | edit | delete | get | list |
//! |---|---|---|---|---|---|---|---|
//! | 404 | error | error | error | error (get step) | `false` | `None` | error |
//! | 409 | error | one fallback replace | `Conflict` | `Conflict` | `false` | error | error |
//! | other | error | error | error | error | `false` | error | error |
//!
//! `create_or_replace` retries a conflicting create as a replace exactly once.
//! `replace` and `edit` never retry: a conflict means the caller's view of the
//! resource is stale and is reported as [`Error::Conflict`].

use crate::client::Client;
use crate::identity::{Address, ResourceIdentity, ResourceType};
use crate::request::{build_request, HttpResponse, ListSelectors, Verb};
use crate::{Error, Result};
use bytes::Bytes;
use http::StatusCode;
use kube::api::ListMeta;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::{debug, trace, warn};

/// Collection returned by list operations
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "K: DeserializeOwned"))]
pub struct ResourceList<K> {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default = "Vec::new")]
    pub items: Vec<K>,
}

impl<K> ResourceList<K> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.items.iter()
    }
}

impl<K> IntoIterator for ResourceList<K> {
    type Item = K;
    type IntoIter = std::vec::IntoIter<K>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Handle for operating on one resource type
pub struct Resources<K> {
    client: Client,
    identity: ResourceIdentity,
    selectors: ListSelectors,
    locked_resource_version: Option<String>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for Resources<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            identity: self.identity.clone(),
            selectors: self.selectors.clone(),
            locked_resource_version: self.locked_resource_version.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K> Resources<K> {
    pub(crate) fn new(client: Client, resource: ResourceType) -> Self {
        Self {
            client,
            identity: ResourceIdentity::new(resource),
            selectors: ListSelectors::default(),
            locked_resource_version: None,
            _kind: PhantomData,
        }
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn in_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            identity: self.identity.in_namespace(namespace),
            ..self.clone()
        }
    }

    /// Span every namespace
    ///
    /// The returned handle only offers collection operations and deletes of
    /// explicit items, whose own metadata supplies the namespace.
    pub fn in_any_namespace(&self) -> AllNamespaces<K> {
        AllNamespaces {
            inner: Self {
                identity: self.identity.in_any_namespace(),
                ..self.clone()
            },
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            identity: self.identity.with_name(name),
            ..self.clone()
        }
    }

    pub fn with_label(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.selectors.labels = next.selectors.labels.equal(key, value);
        next
    }

    pub fn with_labels<I, L, V>(&self, labels: I) -> Self
    where
        I: IntoIterator<Item = (L, V)>,
        L: Into<String>,
        V: Into<String>,
    {
        labels
            .into_iter()
            .fold(self.clone(), |next, (k, v)| next.with_label(k, v))
    }

    pub fn without_label(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.selectors.labels = next.selectors.labels.not_equal(key, value);
        next
    }

    pub fn with_field(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.selectors.fields = next.selectors.fields.equal(key, value);
        next
    }

    /// Pin the resourceVersion sent by `replace`, `replace_status` and `edit`
    ///
    /// The server rejects the write with a conflict when the stored version
    /// differs; the conflict is returned to the caller, never retried.
    pub fn lock_resource_version(&self, resource_version: impl Into<String>) -> Self {
        Self {
            locked_resource_version: Some(resource_version.into()),
            ..self.clone()
        }
    }
}

impl<K> Resources<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Fetch the named resource, `None` when the server answers 404
    pub async fn get(&self) -> Result<Option<K>> {
        let address = self.address(None)?;
        let response = self.execute(&address, Verb::Get, None).await?;

        match response.status {
            status if status.is_success() => decode(&response).map(Some),
            StatusCode::NOT_FOUND => {
                debug!("{} not found", describe(&address));
                Ok(None)
            }
            status => Err(Error::from_status(status, &response.body)),
        }
    }

    /// Fetch the named resource, failing when it does not exist
    pub async fn require(&self) -> Result<K> {
        let address = self.address(None)?;
        let response = self.execute(&address, Verb::Get, None).await?;
        expect_success(response)
    }

    pub async fn list(&self) -> Result<ResourceList<K>> {
        let address = self.address(None)?;
        let response = self.execute(&address, Verb::List, None).await?;
        expect_success(response)
    }

    pub async fn create(&self, item: &K) -> Result<K> {
        let address = self.address(Some(item))?;
        let response = self
            .execute(&address, Verb::Create, Some(encode(item)?))
            .await?;
        expect_success(response)
    }

    /// Create the item, replacing it instead if it already exists
    ///
    /// Issues at most two requests. The replace carries the resourceVersion
    /// from the conflict response when the server reports one, else the
    /// item's own.
    pub async fn create_or_replace(&self, item: &K) -> Result<K> {
        let address = self.address(Some(item))?;
        let response = self
            .execute(&address, Verb::Create, Some(encode(item)?))
            .await?;

        if response.status != StatusCode::CONFLICT {
            return expect_success(response);
        }

        debug!("{} already exists, replacing", describe(&address));
        let mut replacement = item.clone();
        if let Some(rv) = resource_version_of(&response.body) {
            replacement.meta_mut().resource_version = Some(rv);
        }
        let response = self
            .execute(&address, Verb::Replace, Some(encode(&replacement)?))
            .await?;
        expect_success(response)
    }

    pub async fn replace(&self, item: &K) -> Result<K> {
        let item = self.locked(item.clone());
        let address = self.address(Some(&item))?;
        let response = self
            .execute(&address, Verb::Replace, Some(encode(&item)?))
            .await?;
        expect_success(response)
    }

    /// Fetch the named resource, apply `edit` and write the result back
    ///
    /// A missing resource fails the get step and nothing is written. A
    /// conflicting write is returned as [`Error::Conflict`].
    pub async fn edit<F>(&self, edit: F) -> Result<K>
    where
        F: FnOnce(K) -> K + Send,
    {
        let address = self.address(None)?;
        let response = self.execute(&address, Verb::Get, None).await?;
        let current: K = expect_success(response)?;

        let desired = self.locked(edit(current));
        let address = self.address(Some(&desired))?;
        let response = self
            .execute(&address, Verb::Replace, Some(encode(&desired)?))
            .await?;
        expect_success(response)
    }

    /// Replace the status subresource of the item
    pub async fn replace_status(&self, item: &K) -> Result<K> {
        let item = self.locked(item.clone());
        let address = self.address(Some(&item))?;
        let response = self
            .execute(&address, Verb::ReplaceStatus, Some(encode(&item)?))
            .await?;
        expect_success(response)
    }

    #[deprecated(note = "use `replace_status`, `edit` or a locked `replace` instead")]
    pub async fn update_status(&self, item: &K) -> Result<K> {
        self.replace_status(item).await
    }

    /// Delete the named resource; `false` for any non-2xx answer
    pub async fn delete(&self) -> Result<bool> {
        self.delete_one(None).await
    }

    /// Delete the resource the item's metadata identifies
    pub async fn delete_item(&self, item: &K) -> Result<bool> {
        self.delete_items(std::slice::from_ref(item)).await
    }

    /// Delete every item, in order, returning `true` only if all deletes succeeded
    ///
    /// Every item is attempted even after a failure. Items that cannot be
    /// addressed count as failures. A transport failure is returned once all
    /// items have been attempted.
    pub async fn delete_items<'a, I>(&self, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let mut all_deleted = true;
        let mut transport_error = None;

        for item in items {
            match self.delete_one(Some(item)).await {
                Ok(true) => {}
                Ok(false) => all_deleted = false,
                Err(err @ (Error::Transport(_) | Error::UnmatchedRequest { .. })) => {
                    all_deleted = false;
                    if transport_error.is_none() {
                        transport_error = Some(err);
                    }
                }
                Err(err) => {
                    warn!("Skipping delete of {:?}: {}", item.meta().name, err);
                    all_deleted = false;
                }
            }
        }

        match transport_error {
            Some(err) => Err(err),
            None => Ok(all_deleted),
        }
    }

    async fn delete_one(&self, item: Option<&K>) -> Result<bool> {
        let address = self.address(item)?;
        let response = self.execute(&address, Verb::Delete, None).await?;

        if response.is_success() {
            debug!("Deleted {}", describe(&address));
            Ok(true)
        } else {
            warn!(
                "Delete of {} returned {}",
                describe(&address),
                response.status
            );
            Ok(false)
        }
    }

    fn address(&self, item: Option<&K>) -> Result<Address> {
        self.identity
            .resolve(item.map(|i| i.meta()), &self.client.default_namespace)
    }

    fn locked(&self, mut item: K) -> K {
        if let Some(rv) = &self.locked_resource_version {
            item.meta_mut().resource_version = Some(rv.clone());
        }
        item
    }

    async fn execute(
        &self,
        address: &Address,
        verb: Verb,
        body: Option<Bytes>,
    ) -> Result<HttpResponse> {
        let request = build_request(address, verb, &self.selectors, body)?;
        trace!("{:?} {}", verb, request);
        let response = self.client.send(request).await?;
        trace!("{:?} {} -> {}", verb, describe(address), response.status);
        Ok(response)
    }
}

/// Collection-only handle spanning every namespace
pub struct AllNamespaces<K> {
    inner: Resources<K>,
}

impl<K> Clone for AllNamespaces<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K> AllNamespaces<K> {
    pub fn identity(&self) -> &ResourceIdentity {
        self.inner.identity()
    }

    /// Narrow back down to a single namespace
    pub fn in_namespace(&self, namespace: impl Into<String>) -> Resources<K> {
        self.inner.in_namespace(namespace)
    }

    pub fn with_label(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            inner: self.inner.with_label(key, value),
        }
    }

    pub fn with_labels<I, L, V>(&self, labels: I) -> Self
    where
        I: IntoIterator<Item = (L, V)>,
        L: Into<String>,
        V: Into<String>,
    {
        Self {
            inner: self.inner.with_labels(labels),
        }
    }

    pub fn without_label(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            inner: self.inner.without_label(key, value),
        }
    }

    pub fn with_field(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            inner: self.inner.with_field(key, value),
        }
    }
}

impl<K> AllNamespaces<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub async fn list(&self) -> Result<ResourceList<K>> {
        self.inner.list().await
    }

    pub async fn delete_item(&self, item: &K) -> Result<bool> {
        self.inner.delete_item(item).await
    }

    pub async fn delete_items<'a, I>(&self, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        self.inner.delete_items(items).await
    }
}

fn encode<K: Serialize>(item: &K) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(item)?))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(Error::Decode)
}

fn expect_success<T: DeserializeOwned>(response: HttpResponse) -> Result<T> {
    if response.is_success() {
        decode(&response)
    } else {
        Err(Error::from_status(response.status, &response.body))
    }
}

/// `metadata.resourceVersion` of a response body, when it carries one
fn resource_version_of(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .pointer("/metadata/resourceVersion")
        .and_then(|rv| rv.as_str())
        .filter(|rv| !rv.is_empty())
        .map(str::to_string)
}

fn describe(address: &Address) -> String {
    let name = address.name.as_deref().unwrap_or("*");
    match &address.namespace {
        Some(ns) => format!("{} {}/{}", address.resource.kind, ns, name),
        None => format!("{} {}", address.resource.kind, name),
    }
}
