use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::app::{Result, RillError};
use crate::service::ServiceConfig;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Raw response of one API call. Non-2xx statuses are returned, not raised.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ServiceResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn is_no_content(&self) -> bool {
        self.status == StatusCode::NO_CONTENT.as_u16()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue `method` against `<endpoint>/v1/<path>`.
    ///
    /// Any network-level error surfaces as [`RillError::ServiceFailure`].
    async fn call(
        &self,
        config: &ServiceConfig,
        path: &str,
        method: Method,
        body: Option<String>,
    ) -> Result<ServiceResponse>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("rill/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RillError::service(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn headers(config: &ServiceConfig) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

        let (name, value) = config.auth.header();
        let value = HeaderValue::from_str(&value)
            .map_err(|_| RillError::Config("Credentials contain invalid header characters".into()))?;
        headers.insert(HeaderName::from_static(name), value);

        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        config: &ServiceConfig,
        path: &str,
        method: Method,
        body: Option<String>,
    ) -> Result<ServiceResponse> {
        let url = config.api_url(path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(Self::headers(config)?);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!("{} {} failed: {}", method, url, e);
            RillError::service("Network error")
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            tracing::debug!("Reading body of {} {} failed: {}", method, url, e);
            RillError::service("Network error")
        })?;

        tracing::debug!("{} {} -> {}", method, url, status);
        Ok(ServiceResponse::new(status, body.to_vec()))
    }
}
