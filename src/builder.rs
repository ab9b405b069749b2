//! Builder for constructing clients with various options

use crate::client::Client;
use crate::transport::Transport;
use std::sync::Arc;

/// Builder for creating clients
///
/// # Example
///
/// ```rust
/// use kube_resource_client::{ClientBuilder, MockServer};
///
/// let server = MockServer::new();
/// let client = ClientBuilder::new()
///     .with_namespace("staging")
///     .build(server);
/// assert_eq!(client.default_namespace(), "staging");
/// ```
pub struct ClientBuilder {
    namespace: String,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self {
            namespace: "default".to_string(),
        }
    }

    /// Set the namespace used when an operation does not name one
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Build a client sending requests through `transport`
    pub fn build(self, transport: impl Transport + 'static) -> Client {
        self.build_shared(Arc::new(transport))
    }

    /// Build a client over a transport that is shared elsewhere
    pub fn build_shared(self, transport: Arc<dyn Transport>) -> Client {
        Client {
            transport,
            default_namespace: self.namespace,
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
