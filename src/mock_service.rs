//! CRUD routing for the mock server and its tower service adapter

use crate::client_utils::{api_version, pluralize, singularize};
use crate::field_selectors::matches_field_selector;
use crate::label_selector::matches_label_selector;
use crate::mock_server::{MockServer, MOCK_NAMESPACE};
use crate::request::{HttpRequest, HttpResponse};
use crate::tracker::{ObjectTracker, StoreError, StoreResult, GVR};
use crate::{Error, Result};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use kube::client::Body as KubeBody;
use serde_json::Value;
use std::collections::BTreeMap;
use std::task::{Context, Poll};
use tower::Service;
use tracing::trace;

/// Parsed Kubernetes API path information
#[derive(Debug, PartialEq)]
struct ParsedPath {
    group: String,
    version: String,
    namespace: Option<String>,
    resource: String,
    name: Option<String>,
    status: bool,
}

impl ParsedPath {
    fn gvr(&self) -> GVR {
        GVR::new(&self.group, &self.version, &self.resource)
    }

    fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.namespace(), self.name.as_deref().unwrap_or(""))
    }
}

/// Parse URL path to extract API info
/// Examples:
/// - /api/v1/namespaces/test/configmaps (namespaced)
/// - /apis/autoscaling/v1/namespaces/test/horizontalpodautoscalers/web (namespaced with name)
/// - /apis/autoscaling/v1/namespaces/test/horizontalpodautoscalers/web/status (status subresource)
/// - /api/v1/nodes/node-1 (cluster-scoped with name)
/// - /apis/autoscaling/v1/horizontalpodautoscalers (all namespaces)
fn parse_path(path: &str) -> Option<ParsedPath> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let (group, rest) = match parts.as_slice() {
        ["api", rest @ ..] => (String::new(), rest),
        ["apis", group, rest @ ..] => (group.to_string(), rest),
        _ => return None,
    };

    let (version, rest) = rest.split_first()?;
    let (namespace, rest) = match rest {
        ["namespaces", ns, rest @ ..] if !rest.is_empty() => (Some(ns.to_string()), rest),
        _ => (None, rest),
    };

    let (resource, name, status) = match rest {
        [resource] => (resource, None, false),
        [resource, name] => (resource, Some(name.to_string()), false),
        [resource, name, "status"] => (resource, Some(name.to_string()), true),
        _ => return None,
    };

    Some(ParsedPath {
        group,
        version: version.to_string(),
        namespace,
        resource: resource.to_string(),
        name,
        status,
    })
}

/// In-memory backend answering requests no expectation matched
pub(crate) struct CrudBackend {
    pub(crate) tracker: ObjectTracker,
}

impl CrudBackend {
    pub(crate) fn new() -> Self {
        Self {
            tracker: ObjectTracker::new(),
        }
    }

    /// Store an object loaded from a fixture
    pub(crate) fn seed(&self, object: Value, cluster_scoped: bool) -> Result<()> {
        let api_version_field = object
            .get("apiVersion")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidRequest("fixture object has no apiVersion".into()))?;
        let kind = object
            .get("kind")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidRequest("fixture object has no kind".into()))?;
        let (group, version) = api_version_field
            .split_once('/')
            .unwrap_or(("", api_version_field));
        let gvr = GVR::new(group, version, pluralize(kind));

        let namespace = if cluster_scoped {
            String::new()
        } else {
            object
                .pointer("/metadata/namespace")
                .and_then(|n| n.as_str())
                .unwrap_or(MOCK_NAMESPACE)
                .to_string()
        };

        self.tracker
            .add(&gvr, object, &namespace)
            .map_err(|e| Error::Internal(format!("failed to seed fixture object: {}", e)))?;
        Ok(())
    }

    pub(crate) fn serve(&self, request: &HttpRequest) -> HttpResponse {
        trace!("CRUD backend serving {}", request);

        let Some(parsed) = parse_path(&request.path) else {
            return status_response(
                StatusCode::NOT_FOUND,
                "NotFound",
                &format!("the server could not find the requested resource {}", request.path),
            );
        };

        let result = match request.method {
            Method::GET => self.handle_get(&parsed, request),
            Method::POST => self.handle_post(&parsed, request),
            Method::PUT => self.handle_put(&parsed, request),
            Method::DELETE => self.handle_delete(&parsed),
            _ => {
                return status_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "MethodNotAllowed",
                    "Method not allowed",
                )
            }
        };

        let success = if request.method == Method::POST {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };

        match result {
            Ok(value) => HttpResponse::new(success, value.to_string()),
            Err(err) => status_response(err.status(), err.reason(), &err.to_string()),
        }
    }

    fn handle_get(&self, parsed: &ParsedPath, request: &HttpRequest) -> StoreResult<Value> {
        let gvr = parsed.gvr();

        if let Some(name) = &parsed.name {
            return self.tracker.get(&gvr, parsed.namespace(), name);
        }

        let mut objects = self.tracker.list(&gvr, parsed.namespace.as_deref());

        if let Some(selector) = request.query_param("labelSelector") {
            let mut kept = Vec::with_capacity(objects.len());
            for obj in objects {
                let labels = labels_of(&obj);
                if matches_label_selector(&labels, selector).map_err(StoreError::Invalid)? {
                    kept.push(obj);
                }
            }
            objects = kept;
        }

        if let Some(selector) = request.query_param("fieldSelector") {
            let mut kept = Vec::with_capacity(objects.len());
            for obj in objects {
                if matches_field_selector(&obj, selector).map_err(StoreError::Invalid)? {
                    kept.push(obj);
                }
            }
            objects = kept;
        }

        let kind = objects
            .first()
            .and_then(|o| o.get("kind"))
            .and_then(|k| k.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| singularize(&parsed.resource));

        Ok(serde_json::json!({
            "kind": format!("{}List", kind),
            "apiVersion": api_version(&parsed.group, &parsed.version),
            "metadata": { "resourceVersion": "1" },
            "items": objects
        }))
    }

    fn handle_post(&self, parsed: &ParsedPath, request: &HttpRequest) -> StoreResult<Value> {
        if parsed.name.is_some() {
            return Err(StoreError::Invalid(
                "POST must target a collection".to_string(),
            ));
        }
        let obj = self.body_for(parsed, request)?;
        self.tracker.create(&parsed.gvr(), obj, parsed.namespace())
    }

    fn handle_put(&self, parsed: &ParsedPath, request: &HttpRequest) -> StoreResult<Value> {
        let Some(name) = &parsed.name else {
            return Err(StoreError::Invalid("PUT requires a name".to_string()));
        };
        let obj = self.body_for(parsed, request)?;

        let body_name = obj.pointer("/metadata/name").and_then(|n| n.as_str());
        if body_name.is_some_and(|n| n != name) {
            return Err(StoreError::Invalid(format!(
                "the name of the object ({}) does not match the name on the URL ({})",
                body_name.unwrap_or_default(),
                name
            )));
        }

        self.tracker
            .update(&parsed.gvr(), obj, parsed.namespace(), parsed.status)
    }

    fn handle_delete(&self, parsed: &ParsedPath) -> StoreResult<Value> {
        let Some(name) = &parsed.name else {
            return Err(StoreError::Invalid("DELETE requires a name".to_string()));
        };
        trace!("Deleting {}", parsed.describe());
        self.tracker.delete(&parsed.gvr(), parsed.namespace(), name)
    }

    /// Decode the request body, filling in apiVersion/kind and checking the namespace
    fn body_for(&self, parsed: &ParsedPath, request: &HttpRequest) -> StoreResult<Value> {
        let body = request
            .body
            .as_ref()
            .ok_or_else(|| StoreError::Invalid("request body is required".to_string()))?;
        let mut obj: Value = serde_json::from_slice(body)?;
        if !obj.is_object() {
            return Err(StoreError::Invalid("request body must be an object".to_string()));
        }

        if obj.get("apiVersion").is_none() {
            obj["apiVersion"] = Value::String(api_version(&parsed.group, &parsed.version));
        }
        if obj.get("kind").is_none() {
            obj["kind"] = Value::String(singularize(&parsed.resource));
        }

        let body_namespace = obj.pointer("/metadata/namespace").and_then(|n| n.as_str());
        if let (Some(url_ns), Some(body_ns)) = (parsed.namespace.as_deref(), body_namespace) {
            if url_ns != body_ns {
                return Err(StoreError::Invalid(format!(
                    "the namespace of the object ({}) does not match the namespace on the URL ({})",
                    body_ns, url_ns
                )));
            }
        }
        Ok(obj)
    }
}

fn labels_of(obj: &Value) -> BTreeMap<String, String> {
    obj.pointer("/metadata/labels")
        .and_then(|l| l.as_object())
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Kubernetes `Status` failure body
fn status_response(status: StatusCode, reason: &str, message: &str) -> HttpResponse {
    let body = serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": status.as_u16()
    });
    HttpResponse::new(status, body.to_string())
}

impl MockServer {
    async fn handle_http(
        self,
        req: Request<KubeBody>,
    ) -> std::result::Result<Response<Full<Bytes>>, Box<dyn std::error::Error + Send + Sync>> {
        let method = req.method().clone();
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        let body = req.into_body().collect().await?.to_bytes();
        let mut request = HttpRequest::parse_target(method, &target);
        if !body.is_empty() {
            request.body = Some(body);
        }

        let response = self.handle(request)?;
        Ok(Response::builder()
            .status(response.status)
            .header("Content-Type", "application/json")
            .body(Full::new(response.body))?)
    }
}

impl Service<Request<KubeBody>> for MockServer {
    type Response = Response<Full<Bytes>>;
    type Error = Box<dyn std::error::Error + Send + Sync>;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<KubeBody>) -> Self::Future {
        self.clone().handle_http(req).boxed()
    }
}
