//! Generic resource client

use crate::identity::{ResourceType, Scope};
use crate::operations::Resources;
use crate::request::{HttpRequest, HttpResponse};
use crate::transport::Transport;
use crate::Result;
use kube::Resource;
use std::fmt;
use std::sync::Arc;

/// Entry point for resource operations
///
/// Cheap to clone; every clone shares the same transport.
#[derive(Clone)]
pub struct Client {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) default_namespace: String,
}

impl Client {
    /// Create a client over `transport` using the `default` namespace
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            default_namespace: "default".to_string(),
        }
    }

    /// Namespace used when neither the call chain nor the item names one
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Operations on a statically typed resource
    ///
    /// ```rust,no_run
    /// use kube_resource_client::MockServer;
    /// use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let server = MockServer::crud();
    /// let client = server.client();
    /// let hpa = client
    ///     .resources::<HorizontalPodAutoscaler>()
    ///     .in_namespace("test")
    ///     .with_name("web")
    ///     .get()
    ///     .await?;
    /// assert!(hpa.is_none());
    /// # Ok(())
    /// # }
    /// ```
    pub fn resources<K>(&self) -> Resources<K>
    where
        K: Resource,
        K::DynamicType: Default,
        K::Scope: Scope,
    {
        Resources::new(self.clone(), ResourceType::of::<K>())
    }

    /// Operations on a resource whose type is only known at runtime
    pub fn resources_with<K: Resource>(&self, resource: ResourceType) -> Resources<K> {
        Resources::new(self.clone(), resource)
    }

    pub(crate) async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport.send(request).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("default_namespace", &self.default_namespace)
            .finish_non_exhaustive()
    }
}
