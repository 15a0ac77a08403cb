//! HTTP transport for GetFeatureInfo requests
//!
//! The fetch orchestrator only depends on the [`Transport`] trait, so tests and
//! embedders can plug in their own implementation. [`HttpTransport`] is the
//! reqwest-backed implementation used by the CLI.

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;
use url::Url;

use crate::config::ServiceConfig;
use crate::error::{Error, Result, TransportError};
use crate::query::QueryRequest;

/// Raw response of one request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body bytes
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one GetFeatureInfo request
///
/// Implementations must bound every call by a timeout and report failures as
/// [`TransportError`]; they must not retry on their own, since the fallback
/// between protocol variants is decided by the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the raw response
    async fn send(&self, request: &QueryRequest)
    -> std::result::Result<TransportResponse, TransportError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// reqwest-backed [`Transport`] issuing GET requests against the WMS base URL
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    /// Build the client with the configured headers and timeout
    ///
    /// Fails with [`Error::Config`] if the base URL or one of the header values
    /// cannot be used.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim()).map_err(|e| {
            Error::config(
                "service.base_url",
                format!("invalid URL {:?}: {e}", config.base_url),
            )
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            header::USER_AGENT,
            header_value("service.user_agent", &config.user_agent)?,
        );
        if let Some(referer) = &config.referer {
            headers.insert(header::REFERER, header_value("service.referer", referer)?);
        }
        if let Some(cookie) = &config.cookie {
            let mut value = header_value("service.cookie", cookie)?;
            value.set_sensitive(true);
            headers.insert(header::COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

fn header_value(key: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::config(key, format!("not a valid header value: {e}")))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &QueryRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let pending = self
            .client
            .get(self.base_url.clone())
            .query(request.params())
            .send();

        // The client timeout covers connect and headers; the outer one also
        // bounds a body that trickles in
        let exchange = async {
            let response = pending.await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(TransportResponse::new(status, body.to_vec()))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(response)) => {
                tracing::trace!(
                    status = response.status,
                    bytes = response.body.len(),
                    "Response received"
                );
                Ok(response)
            }
            Ok(Err(e)) => Err(TransportError::from(e)),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
