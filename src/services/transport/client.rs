//! HTTP transport interface used by the token validator.
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use thiserror::Error;
use url::Url;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport-level failures.
///
/// Note:
/// - These mean "validity unknown". The validator never caches them and never reads them
///   as a rejected token.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection to validation resource failed: {0}")]
    Connect(String),
    #[error("validation resource timed out")]
    Timeout,
    #[error("validation request failed: {0}")]
    Request(String),
    #[error("failed to read validation response body: {0}")]
    Body(String),
    #[error("invalid bearer token header value")]
    InvalidHeader,
}

/// Status and raw body of a completed GET.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// "Given a URL and headers, perform a GET and return status + body, or fail."
///
/// Implementations own their timeouts; the validator adds none of its own.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    // Transport name (for logging).
    fn backend_name(&self) -> &'static str;

    async fn get(&self, url: &Url, headers: HeaderMap) -> TransportResult<TransportResponse>;
}

/// Builds the `Authorization: Bearer <token>` header set.
pub fn bearer_headers(token: &str) -> TransportResult<HeaderMap> {
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| TransportError::InvalidHeader)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, value);
    Ok(headers)
}
