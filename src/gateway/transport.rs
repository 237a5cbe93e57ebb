//! Outbound transport for document submissions.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as ReqwestClient;
use tracing::{debug, error};

use crate::config::TransportConfig;
use crate::error::Result;

/// Document creation endpoint of the registration service.
pub const CREATE_DOCUMENT_URL: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";

/// Header carrying the caller's signature token.
pub const SIGNATURE_HEADER: &str = "Signature";

/// A single outbound request carrying a serialized document.
///
/// Implementations return the raw response body without interpreting it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `body` with `signature` attached and return the response body.
    async fn send(&self, body: Vec<u8>, signature: &str) -> Result<String>;
}

/// HTTP transport posting JSON to the document creation endpoint.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: ReqwestClient,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport for the production endpoint.
    pub fn new() -> Self {
        Self::with_client(ReqwestClient::new())
    }

    /// Create a transport using a custom HTTP client.
    pub fn with_client(client: ReqwestClient) -> Self {
        Self {
            client,
            endpoint: CREATE_DOCUMENT_URL.to_string(),
        }
    }

    /// Create a transport from transport configuration.
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?))
    }

    /// Point the transport at a different endpoint, e.g. a local test server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The endpoint requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: Vec<u8>, signature: &str) -> Result<String> {
        debug!(
            endpoint = %self.endpoint,
            body_len = body.len(),
            "Sending document"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, endpoint = %self.endpoint, "Document request failed");
                e
            })?;

        let status = response.status();
        let text = response.text().await?;

        debug!(status = %status, body_len = text.len(), "Received response");
        Ok(text)
    }
}
