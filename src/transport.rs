//! Transport seam between the operation engine and an API server

use crate::request::{HttpRequest, HttpResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use http::header::{ACCEPT, CONTENT_TYPE};
use http_body_util::BodyExt;
use kube::client::Body as KubeBody;
use std::sync::Arc;
use tracing::trace;

/// Sends one request and returns the raw response
///
/// Non-2xx statuses are responses, not errors; an `Err` means no response was
/// obtained at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request).await
    }
}

/// Real transport backed by a configured `kube::Client`
#[async_trait]
impl Transport for kube::Client {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        trace!("Sending {}", request);

        let body = match request.body.clone() {
            Some(bytes) => KubeBody::from(bytes.to_vec()),
            None => KubeBody::empty(),
        };
        let http_request = http::Request::builder()
            .method(request.method.clone())
            .uri(request.path_and_query())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;

        let response = kube::Client::send(self, http_request)
            .await
            .map_err(into_transport_error)?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?
            .to_bytes();

        Ok(HttpResponse { status, body })
    }
}

/// Keep errors raised by an in-process service (such as the mock server) intact
fn into_transport_error(err: kube::Error) -> Error {
    match err {
        kube::Error::Service(inner) => match inner.downcast::<Error>() {
            Ok(err) => *err,
            Err(other) => Error::Transport(other.to_string()),
        },
        other => Error::Transport(other.to_string()),
    }
}
