//! HTTP request/response values and the verb-to-request mapping

use crate::identity::Address;
use crate::selector::SelectorSet;
use crate::Result;
use bytes::Bytes;
use http::{Method, StatusCode};
use std::fmt;

/// Outgoing API request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    /// Decoded query parameters, in order
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Value of the first query parameter named `key`
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Path followed by the percent-encoded query string, if any
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }

    /// Split a raw `path?query` target, decoding the query values
    pub fn parse_target(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let mut request = HttpRequest::new(method, path);
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let decoded = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                request.query.push((key.to_string(), decoded));
            }
        }
        request
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path_and_query())
    }
}

/// Response returned by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Wire-level operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    List,
    Create,
    Replace,
    ReplaceStatus,
    Delete,
}

/// Selectors attached to list requests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSelectors {
    pub labels: SelectorSet,
    pub fields: SelectorSet,
}

/// Build the request for `verb` against `address`
///
/// `body` is used by the writing verbs and ignored otherwise; `selectors` only
/// applies to [`Verb::List`].
pub fn build_request(
    address: &Address,
    verb: Verb,
    selectors: &ListSelectors,
    body: Option<Bytes>,
) -> Result<HttpRequest> {
    let request = match verb {
        Verb::Get => HttpRequest::new(Method::GET, address.item_path()?),
        Verb::List => {
            let mut request = HttpRequest::new(Method::GET, address.collection_path());
            if !selectors.labels.is_empty() {
                request = request.with_query("labelSelector", selectors.labels.encode());
            }
            if !selectors.fields.is_empty() {
                request = request.with_query("fieldSelector", selectors.fields.encode());
            }
            request
        }
        Verb::Create => HttpRequest::new(Method::POST, address.collection_path()),
        Verb::Replace => HttpRequest::new(Method::PUT, address.item_path()?),
        Verb::ReplaceStatus => {
            HttpRequest::new(Method::PUT, format!("{}/status", address.item_path()?))
        }
        Verb::Delete => HttpRequest::new(Method::DELETE, address.item_path()?),
    };

    Ok(match (verb, body) {
        (Verb::Create | Verb::Replace | Verb::ReplaceStatus, Some(body)) => request.with_body(body),
        _ => request,
    })
}
