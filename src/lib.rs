//! Generic Kubernetes resource client with an expectation-driven mock server.
//!
//! The same verbs work for every resource kind: a [`Resources`] handle is
//! narrowed with `in_namespace` / `with_name` / `with_label` and then issues
//! `get`, `list`, `create`, `create_or_replace`, `replace`, `edit`,
//! `replace_status`, `delete`, `delete_item` or `delete_items` through a
//! [`Transport`]. The transport is either a real `kube::Client` or a
//! [`MockServer`].
//!
//! # Examples
//!
//! ## Stubbed responses
//!
//! ```rust
//! use kube_resource_client::MockServer;
//! use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockServer::new();
//! server
//!     .expect()
//!     .with_path("/apis/autoscaling/v1/namespaces/ns1/horizontalpodautoscalers")
//!     .and_return(200, &json!({ "items": [] }))
//!     .once();
//!
//! let hpas = server
//!     .client()
//!     .resources::<HorizontalPodAutoscaler>()
//!     .in_namespace("ns1")
//!     .list()
//!     .await?;
//! assert!(hpas.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## In-memory CRUD
//!
//! ```rust
//! use kube_resource_client::MockServer;
//! use k8s_openapi::api::core::v1::ConfigMap;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockServer::crud();
//! let config_maps = server.client().resources::<ConfigMap>();
//!
//! let mut cm = ConfigMap::default();
//! cm.metadata.name = Some("settings".to_string());
//! config_maps.create(&cm).await?;
//!
//! let stored = config_maps.with_name("settings").get().await?;
//! assert!(stored.is_some());
//! # Ok(())
//! # }
//! ```

mod builder;
mod client;
mod client_utils;
mod error;
mod field_selectors;
pub mod identity;
pub mod label_selector;
pub mod load;
mod mock_server;
mod mock_service;
mod operations;
pub mod request;
pub mod selector;
mod tracker;
pub mod transport;
mod utils;

#[cfg(test)]
mod operations_test;

pub use builder::ClientBuilder;
pub use client::Client;
pub use error::{Error, Result};
pub use identity::{Address, ResourceIdentity, ResourceType};
pub use mock_server::{
    ExpectationBuilder, MockServer, PathExpectation, Repeat, Reply, Responder, MOCK_NAMESPACE,
};
pub use operations::{AllNamespaces, ResourceList, Resources};
pub use request::{HttpRequest, HttpResponse};
pub use selector::SelectorSet;
pub use transport::Transport;
