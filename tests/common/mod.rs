#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode, header};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use token_gate::services::auth::ManualClock;
use token_gate::services::transport::{
    HttpTransport, TransportError, TransportResponse, TransportResult,
};
use token_gate::{TokenValidator, ValidatorConfig};

#[derive(Clone)]
pub enum Reply {
    Status(StatusCode, String),
    Refused,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Reply::Status(StatusCode::OK, body.to_string())
    }

    pub fn status(status: StatusCode) -> Self {
        Reply::Status(status, String::new())
    }
}

/// Stub validation resource: a reply per token (or a default), counting calls per token.
pub struct ScriptedTransport {
    default: Mutex<Reply>,
    per_token: Mutex<HashMap<String, Reply>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    delay: Option<Duration>,
    per_token_delay: Mutex<HashMap<String, Duration>>,
}

impl ScriptedTransport {
    pub fn new(default: Reply) -> Arc<Self> {
        Arc::new(Self::build(default, None))
    }

    pub fn with_delay(default: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(default, Some(delay)))
    }

    fn build(default: Reply, delay: Option<Duration>) -> Self {
        Self {
            default: Mutex::new(default),
            per_token: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
            delay,
            per_token_delay: Mutex::new(HashMap::new()),
        }
    }

    pub fn reply_for(&self, token: &str, reply: Reply) {
        self.per_token
            .lock()
            .unwrap()
            .insert(token.to_string(), reply);
    }

    /// Holds the answer for `token` back by `delay` (overrides the shared delay).
    pub fn delay_for(&self, token: &str, delay: Duration) {
        self.per_token_delay
            .lock()
            .unwrap()
            .insert(token.to_string(), delay);
    }

    pub fn set_default(&self, reply: Reply) {
        *self.default.lock().unwrap() = reply;
    }

    pub fn calls_for(&self, token: &str) -> usize {
        self.calls.lock().unwrap().get(token).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    fn backend_name(&self) -> &'static str {
        "scripted"
    }

    async fn get(&self, _url: &Url, headers: HeaderMap) -> TransportResult<TransportResponse> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or_default()
            .to_string();

        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(token.clone()).or_default() += 1;

        let delay = self
            .per_token_delay
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .per_token
            .lock()
            .unwrap()
            .get(&token)
            .cloned()
            .unwrap_or_else(|| self.default.lock().unwrap().clone());

        match reply {
            Reply::Status(status, body) => Ok(TransportResponse::new(status, body)),
            Reply::Refused => Err(TransportError::Connect("connection refused".into())),
        }
    }
}

pub fn resource() -> Url {
    Url::parse("https://auth.example.com/oauthToken_validation").unwrap()
}

pub fn validator_with(
    transport: Arc<ScriptedTransport>,
    clock: &ManualClock,
    config: ValidatorConfig,
) -> TokenValidator {
    TokenValidator::new(config, transport).with_clock(Arc::new(clock.clone()))
}

pub fn validator(transport: Arc<ScriptedTransport>, clock: &ManualClock) -> TokenValidator {
    validator_with(transport, clock, ValidatorConfig::new(resource()))
}
