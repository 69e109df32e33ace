//! Transport abstraction for fetching remote resources

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;

/// Options passed through to the transport with every request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    /// Extra request headers
    pub headers: BTreeMap<String, String>,

    /// Per-request timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// A request: a locator plus the transport options to fetch it with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTemplate {
    /// Locator of the resource
    pub url: String,

    /// Options to fetch it with
    #[serde(default)]
    pub options: TransportOptions,
}

impl RequestTemplate {
    /// Create a request for `url` with default options
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: TransportOptions::default(),
        }
    }

    /// Replace the transport options
    #[must_use]
    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a request header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name.into(), value.into());
        self
    }

    /// Derive a request for another locator, keeping these options
    #[must_use]
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: self.options.clone(),
        }
    }
}

impl From<&str> for RequestTemplate {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for RequestTemplate {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// A complete response from a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// Status code of the response
    pub status: u16,

    /// The fully buffered response body
    pub body: Bytes,
}

impl TransportResponse {
    /// Whether the status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can fetch a remote resource in full
///
/// Returns `Err` only when the request itself could not complete; a
/// response with a failure status is still `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the resource described by `request`
    async fn fetch(&self, request: &RequestTemplate) -> Result<TransportResponse>;
}

/// A transport serving resources from memory
///
/// Unknown locators get a 404 response. Every requested locator is recorded
/// in order.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    resources: HashMap<String, Bytes>,
    requests: Mutex<Vec<String>>,
}

impl InMemoryTransport {
    /// Create a transport with no resources
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`
    #[must_use]
    pub fn with_resource(mut self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.insert(url, body);
        self
    }

    /// Serve `body` at `url`, replacing any previous body
    pub fn insert(&mut self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.resources.insert(url.into(), body.into());
    }

    /// Locators requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn fetch(&self, request: &RequestTemplate) -> Result<TransportResponse> {
        trace!(url = %request.url, "in-memory fetch");
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.url.clone());

        Ok(match self.resources.get(&request.url) {
            Some(body) => TransportResponse {
                status: 200,
                body: body.clone(),
            },
            None => TransportResponse {
                status: 404,
                body: Bytes::new(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_url_keeps_options() {
        let template = RequestTemplate::new("https://data.example/train-")
            .with_header("authorization", "Bearer abc")
            .with_options(TransportOptions {
                headers: BTreeMap::from([("x-shard".to_string(), "yes".to_string())]),
                timeout_ms: Some(500),
            });
        let derived = template.with_url("https://data.example/train-00001.bin");

        assert_eq!(derived.url, "https://data.example/train-00001.bin");
        assert_eq!(derived.options, template.options);
        assert_eq!(derived.options.timeout_ms, Some(500));
    }

    #[test]
    fn test_success_range() {
        let response = |status| TransportResponse {
            status,
            body: Bytes::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(304).is_success());
        assert!(!response(404).is_success());
        assert!(!response(500).is_success());
    }

    #[test]
    fn test_request_template_from_json() {
        let json = r#"{"url": "s3://bucket/part-", "options": {"timeout_ms": 1000}}"#;
        let template: RequestTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(template.url, "s3://bucket/part-");
        assert_eq!(template.options.timeout_ms, Some(1000));
        assert!(template.options.headers.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_transport() {
        let transport = InMemoryTransport::new().with_resource("a", Bytes::from_static(b"alpha"));

        let found = transport.fetch(&"a".into()).await.unwrap();
        assert!(found.is_success());
        assert_eq!(&found.body[..], b"alpha");

        let missing = transport.fetch(&"b".into()).await.unwrap();
        assert_eq!(missing.status, 404);

        assert_eq!(transport.requests(), vec!["a".to_string(), "b".to_string()]);
    }
}
