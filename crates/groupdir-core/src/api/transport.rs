//! HTTP seam shared by the login exchange and every directory call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};

use super::error::TransportError;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const ATOM_CONTENT_TYPE: &str = "application/atom+xml";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub content_type: &'static str,
    pub authorization: Option<String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn form_post(url: &str, body: String) -> Self {
        Self {
            method: Method::POST,
            url: url.to_string(),
            content_type: FORM_CONTENT_TYPE,
            authorization: None,
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Executes one request and returns whatever status and body came back.
///
/// Non-2xx statuses are not errors at this layer; they are interpreted by
/// [`classify`](super::classify::classify).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport over a pooled reqwest client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .header(header::CONTENT_TYPE, request.content_type);

        if let Some(authorization) = request.authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}
