//! HTTP transport backed by `reqwest`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::Result;
use crate::transport::{RequestTemplate, Transport, TransportResponse};

/// Fetches resources with HTTP GET requests
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport sharing an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &RequestTemplate) -> Result<TransportResponse> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.options.headers {
            builder = builder.header(name, value);
        }
        if let Some(timeout_ms) = request.options.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        debug!(url = %request.url, status, bytes = body.len(), "http fetch");

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_invalid_url_is_a_transport_error() {
        let transport = HttpTransport::new();
        let result = transport.fetch(&"not a url".into()).await;
        assert!(matches!(result, Err(Error::Http(_))));
    }
}
