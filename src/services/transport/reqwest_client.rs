use async_trait::async_trait;
use axum::http::HeaderMap;
use std::time::Duration;
use url::Url;

use crate::services::transport::client::{
    HttpTransport, TransportError, TransportResponse, TransportResult,
};

/// reqwest-backed transport.
///
/// The client is connection-pooled and cheap to clone; one instance can be shared by
/// several validators.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with a whole-request timeout.
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wraps a caller-configured client (proxies, TLS roots, custom timeouts...).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_body() || err.is_decode() {
        TransportError::Body(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    fn backend_name(&self) -> &'static str {
        "reqwest"
    }

    async fn get(&self, url: &Url, headers: HeaderMap) -> TransportResult<TransportResponse> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response.bytes().await.map_err(classify)?;

        Ok(TransportResponse::new(status, body.to_vec()))
    }
}
