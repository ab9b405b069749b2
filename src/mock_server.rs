//! Expectation-matching mock API server
//!
//! Tests register expectations before exercising the code under test:
//!
//! ```rust
//! use kube_resource_client::MockServer;
//! use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockServer::new();
//! server
//!     .expect()
//!     .with_path("/apis/autoscaling/v1/namespaces/test/horizontalpodautoscalers/web")
//!     .and_return(200, &HorizontalPodAutoscaler::default())
//!     .once();
//!
//! let hpa = server
//!     .client()
//!     .resources::<HorizontalPodAutoscaler>()
//!     .with_name("web")
//!     .get()
//!     .await?;
//! assert!(hpa.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! Expectations are tried in registration order. The first one whose method
//! (if narrowed) and `path?query` equal the request, and which still has uses
//! left, answers it. Query strings are compared literally, so the order of
//! label selector requirements is part of the match. A request nothing
//! answers fails with [`Error::UnmatchedRequest`], unless the server runs in
//! CRUD mode, where it is served from an in-memory object store instead.

use crate::builder::ClientBuilder;
use crate::client::Client;
use crate::client_utils::pluralize;
use crate::load::load_yaml_values;
use crate::mock_service::CrudBackend;
use crate::request::{HttpRequest, HttpResponse};
use crate::tracker::GVR;
use crate::transport::Transport;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Namespace the clients handed out by the mock server default to
pub const MOCK_NAMESPACE: &str = "test";

/// Produces the reply for the n-th (zero based) request an expectation answers
pub type Responder = Arc<dyn Fn(&HttpRequest, usize) -> Result<HttpResponse> + Send + Sync>;

/// How many requests an expectation may answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Once,
    Times(usize),
    Always,
}

struct Expectation {
    method: Option<Method>,
    path: String,
    responder: Responder,
    remaining: Option<usize>,
    calls: usize,
}

impl Expectation {
    fn new(method: Option<Method>, path: String, responder: Responder, repeat: Repeat) -> Self {
        let remaining = match repeat {
            Repeat::Once => Some(1),
            Repeat::Times(n) => Some(n),
            Repeat::Always => None,
        };
        Self {
            method,
            path,
            responder,
            remaining,
            calls: 0,
        }
    }

    fn accepts(&self, method: &Method, target: &str) -> bool {
        self.remaining != Some(0)
            && self.method.as_ref().is_none_or(|m| m == method)
            && self.path == target
    }

    /// Use up one reply, returning the responder and the call index
    fn consume(&mut self) -> (Responder, usize) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        let call = self.calls;
        self.calls += 1;
        (self.responder.clone(), call)
    }
}

struct Inner {
    expectations: Mutex<Vec<Expectation>>,
    history: Mutex<Vec<HttpRequest>>,
    crud: Option<CrudBackend>,
}

/// In-process fake API server
///
/// Cheap to clone; clones share expectations, history and stored objects.
#[derive(Clone)]
pub struct MockServer {
    inner: Arc<Inner>,
}

impl MockServer {
    /// Server answering only from registered expectations
    pub fn new() -> Self {
        Self::with_backend(None)
    }

    /// Server falling back to an in-memory object store for unmatched requests
    pub fn crud() -> Self {
        Self::with_backend(Some(CrudBackend::new()))
    }

    fn with_backend(crud: Option<CrudBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                expectations: Mutex::new(Vec::new()),
                history: Mutex::new(Vec::new()),
                crud,
            }),
        }
    }

    pub fn is_crud(&self) -> bool {
        self.inner.crud.is_some()
    }

    /// Start registering an expectation
    pub fn expect(&self) -> ExpectationBuilder<'_> {
        ExpectationBuilder {
            server: self,
            method: None,
        }
    }

    /// Register an expectation directly
    pub fn register(
        &self,
        method: Option<Method>,
        path: impl Into<String>,
        responder: Responder,
        repeat: Repeat,
    ) {
        let path = path.into();
        debug!("Registering expectation {:?} {} ({:?})", method, path, repeat);
        self.inner
            .expectations
            .lock()
            .expect("MockServer expectations lock poisoned")
            .push(Expectation::new(method, path, responder, repeat));
    }

    /// Seed the CRUD store with the objects of a YAML document stream
    ///
    /// Objects without a namespace land in the mock namespace.
    pub fn with_fixture(self, yaml: &str) -> Result<Self> {
        self.seed(yaml, &[])?;
        Ok(self)
    }

    /// Like [`with_fixture`](Self::with_fixture), naming the cluster-scoped kinds
    ///
    /// Objects whose kind is listed in `cluster_kinds` are stored without a
    /// namespace; other objects without one land in the mock namespace.
    pub fn with_cluster_fixture(self, yaml: &str, cluster_kinds: &[&str]) -> Result<Self> {
        self.seed(yaml, cluster_kinds)?;
        Ok(self)
    }

    fn seed(&self, yaml: &str, cluster_kinds: &[&str]) -> Result<()> {
        let crud = self.inner.crud.as_ref().ok_or_else(|| {
            Error::InvalidRequest("fixtures can only seed a CRUD mode server".to_string())
        })?;
        for object in load_yaml_values(yaml)? {
            let cluster_scoped = object
                .get("kind")
                .and_then(|k| k.as_str())
                .is_some_and(|k| cluster_kinds.contains(&k));
            crud.seed(object, cluster_scoped)?;
        }
        Ok(())
    }

    /// Keep the stored status when regular updates replace a resource of this type
    pub fn with_status_subresource(self, group: &str, version: &str, kind: &str) -> Self {
        if let Some(crud) = &self.inner.crud {
            crud.tracker
                .add_status_subresource(GVR::new(group, version, pluralize(kind)));
        }
        self
    }

    /// Answer one request
    ///
    /// The request is recorded while the expectations are locked, so history
    /// order is the order in which expectations were consumed.
    pub fn handle(&self, request: HttpRequest) -> Result<HttpResponse> {
        let target = request.path_and_query();

        let matched = {
            let mut expectations = self
                .inner
                .expectations
                .lock()
                .expect("MockServer expectations lock poisoned");
            self.inner
                .history
                .lock()
                .expect("MockServer history lock poisoned")
                .push(request.clone());
            expectations
                .iter_mut()
                .find(|e| e.accepts(&request.method, &target))
                .map(Expectation::consume)
        };

        if let Some((responder, call)) = matched {
            debug!("Expectation answered {} (call {})", request, call);
            return responder(&request, call);
        }

        if let Some(crud) = &self.inner.crud {
            return Ok(crud.serve(&request));
        }

        warn!("No expectation matched {}", request);
        Err(Error::UnmatchedRequest {
            method: request.method.to_string(),
            path: target,
        })
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner
            .history
            .lock()
            .expect("MockServer history lock poisoned")
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.inner
            .history
            .lock()
            .expect("MockServer history lock poisoned")
            .len()
    }

    /// Requests received with this method for this exact `path?query`
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        self.inner
            .history
            .lock()
            .expect("MockServer history lock poisoned")
            .iter()
            .filter(|r| r.method == method && r.path_and_query() == path)
            .cloned()
            .collect()
    }

    /// Expectations that can still answer at least one more request
    pub fn pending_expectations(&self) -> usize {
        self.inner
            .expectations
            .lock()
            .expect("MockServer expectations lock poisoned")
            .iter()
            .filter(|e| e.remaining != Some(0))
            .count()
    }

    /// Forget all expectations and recorded requests
    pub fn reset(&self) {
        let mut expectations = self
            .inner
            .expectations
            .lock()
            .expect("MockServer expectations lock poisoned");
        expectations.clear();
        self.inner
            .history
            .lock()
            .expect("MockServer history lock poisoned")
            .clear();
    }

    /// Resource client talking to this server, defaulting to the `test` namespace
    pub fn client(&self) -> Client {
        ClientBuilder::new()
            .with_namespace(MOCK_NAMESPACE)
            .build(self.clone())
    }

    /// A real `kube::Client` whose service is this server
    ///
    /// Must be called from within a Tokio runtime.
    pub fn kube_client(&self) -> kube::Client {
        kube::Client::new(self.clone(), MOCK_NAMESPACE)
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockServer {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.handle(request)
    }
}

/// First step of `server.expect()...`: optional method narrowing, then the path
pub struct ExpectationBuilder<'a> {
    server: &'a MockServer,
    method: Option<Method>,
}

impl<'a> ExpectationBuilder<'a> {
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn get(self) -> Self {
        self.method(Method::GET)
    }

    pub fn post(self) -> Self {
        self.method(Method::POST)
    }

    pub fn put(self) -> Self {
        self.method(Method::PUT)
    }

    pub fn delete(self) -> Self {
        self.method(Method::DELETE)
    }

    /// Match requests whose `path?query` equals `path` byte for byte
    pub fn with_path(self, path: impl Into<String>) -> PathExpectation<'a> {
        PathExpectation {
            server: self.server,
            method: self.method,
            path: path.into(),
        }
    }
}

/// Expectation with its request side fixed, waiting for the reply
pub struct PathExpectation<'a> {
    server: &'a MockServer,
    method: Option<Method>,
    path: String,
}

impl<'a> PathExpectation<'a> {
    /// Reply with `body` serialized as JSON
    ///
    /// # Panics
    ///
    /// Panics if `status` is not a valid HTTP status code or `body` cannot be
    /// serialized.
    pub fn and_return<B: Serialize + ?Sized>(self, status: u16, body: &B) -> Reply<'a> {
        let body = serde_json::to_vec(body).expect("expectation body must serialize to JSON");
        self.and_return_raw(status, body)
    }

    /// Reply with `body` exactly as given
    ///
    /// # Panics
    ///
    /// Panics if `status` is not a valid HTTP status code.
    pub fn and_return_raw(self, status: u16, body: impl Into<Bytes>) -> Reply<'a> {
        let status = to_status(status);
        let body = body.into();
        self.reply_with(Arc::new(move |_, _| {
            Ok(HttpResponse::new(status, body.clone()))
        }))
    }

    /// Reply with a body computed per call from the request and the call index
    ///
    /// # Panics
    ///
    /// Panics if `status` is not a valid HTTP status code.
    pub fn and_reply<F, B>(self, status: u16, reply: F) -> Reply<'a>
    where
        F: Fn(&HttpRequest, usize) -> B + Send + Sync + 'static,
        B: Serialize,
    {
        let status = to_status(status);
        self.reply_with(Arc::new(move |request, call| {
            let body = serde_json::to_vec(&reply(request, call))?;
            Ok(HttpResponse::new(status, body))
        }))
    }

    /// Fail the request as if the connection broke
    pub fn and_fail(self, message: impl Into<String>) -> Reply<'a> {
        let message = message.into();
        self.reply_with(Arc::new(move |_, _| Err(Error::Transport(message.clone()))))
    }

    fn reply_with(self, responder: Responder) -> Reply<'a> {
        Reply {
            server: self.server,
            method: self.method,
            path: self.path,
            responder,
        }
    }
}

/// Fully described expectation; choosing a repetition registers it
#[must_use = "an expectation is only registered by once(), times() or always()"]
pub struct Reply<'a> {
    server: &'a MockServer,
    method: Option<Method>,
    path: String,
    responder: Responder,
}

impl Reply<'_> {
    pub fn once(self) {
        self.repeat(Repeat::Once)
    }

    pub fn times(self, n: usize) {
        self.repeat(Repeat::Times(n))
    }

    pub fn always(self) {
        self.repeat(Repeat::Always)
    }

    pub fn repeat(self, repeat: Repeat) {
        self.server
            .register(self.method, self.path, self.responder, repeat);
    }
}

fn to_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code)
        .unwrap_or_else(|_| panic!("expectation status {} is not a valid HTTP status code", code))
}
