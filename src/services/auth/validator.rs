//! Remote bearer-token validation with positive/negative outcome caching.
//!
//! Lookup order for `is_valid_with`:
//! 1. negative cache (known bad, or known to belong to someone else)
//! 2. positive cache (+ identity binding against the claimed owner)
//! 3. `GET <validation resource>` with `Authorization: Bearer <token>`
//!
//! A 200 whose body is not a JSON object switches the validator to a sticky degraded mode:
//! bodies are no longer parsed and nothing is cached, but the remote status still decides.
//! Cache writes go through `store`, so a request in flight during the switch leaves nothing behind.
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::services::auth::body::{TokenDescriptor, ValidationBody};
use crate::services::auth::clock::{Clock, SystemClock, deadline};
use crate::services::cache::{CacheSettings, OutcomeCache, TokenRecord};
use crate::services::transport::{HttpTransport, TransportError, bearer_headers};

/// Only transport failures escape `is_valid_with`; every other outcome is a `bool`.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Outcome of a validation, with the owner the validation resource vouched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// `owner` is `None` when the answer named nobody (empty body, expiry-only body,
    /// degraded mode).
    Valid { owner: Option<String> },
    Invalid,
}

impl Verdict {
    fn valid(owner: Option<&str>) -> Self {
        Verdict::Valid {
            owner: owner.map(str::to_string),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid { .. })
    }

    /// Verified owner, never the caller's claim.
    pub fn owner(&self) -> Option<&str> {
        match self {
            Verdict::Valid { owner } => owner.as_deref(),
            Verdict::Invalid => None,
        }
    }

    pub fn into_owner(self) -> Option<String> {
        match self {
            Verdict::Valid { owner } => owner,
            Verdict::Invalid => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub validation_resource: Url,
    pub positive_cache: CacheSettings,
    pub negative_cache: CacheSettings,
    /// When off, claimed owners are ignored and tokens are bound to nobody.
    pub identity_binding: bool,
    /// Taken off remote expiration hints.
    pub expiry_margin: Duration,
}

impl ValidatorConfig {
    pub fn new(validation_resource: Url) -> Self {
        Self {
            validation_resource,
            positive_cache: CacheSettings::default(),
            negative_cache: CacheSettings::default(),
            identity_binding: true,
            expiry_margin: Duration::from_secs(5),
        }
    }
}

pub struct TokenValidator {
    validation_resource: Url,
    transport: Arc<dyn HttpTransport>,
    positive: OutcomeCache,
    negative: OutcomeCache,
    clock: Arc<dyn Clock>,
    identity_binding: bool,
    expiry_margin: Duration,
    // one-way: true -> false
    parsing_enabled: AtomicBool,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("validation_resource", &self.validation_resource.as_str())
            .field("transport", &self.transport.backend_name())
            .field("positive", &self.positive)
            .field("negative", &self.negative)
            .field("identity_binding", &self.identity_binding)
            .field("degraded", &self.is_degraded())
            .finish()
    }
}

impl TokenValidator {
    pub fn new(config: ValidatorConfig, transport: Arc<dyn HttpTransport>) -> Self {
        tracing::debug!(
            resource = %config.validation_resource,
            transport = transport.backend_name(),
            "token validator created"
        );

        Self {
            validation_resource: config.validation_resource,
            transport,
            positive: OutcomeCache::new(config.positive_cache),
            negative: OutcomeCache::new(config.negative_cache),
            clock: Arc::new(SystemClock),
            identity_binding: config.identity_binding,
            expiry_margin: config.expiry_margin,
            parsing_enabled: AtomicBool::new(true),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn positive_cache(&self) -> &OutcomeCache {
        &self.positive
    }

    pub fn negative_cache(&self) -> &OutcomeCache {
        &self.negative
    }

    pub fn identity_binding(&self) -> bool {
        self.identity_binding
    }

    /// True once a non-conforming body has been seen. Never resets.
    pub fn is_degraded(&self) -> bool {
        !self.parsing_enabled.load(Ordering::SeqCst)
    }

    pub async fn is_valid(&self, token: &str) -> Result<bool, ValidationError> {
        self.is_valid_with(token, None, None).await
    }

    pub async fn is_valid_for(
        &self,
        token: &str,
        claimed_owner: Option<&str>,
    ) -> Result<bool, ValidationError> {
        self.is_valid_with(token, claimed_owner, None).await
    }

    /// `ttl_override` only shortens the lifetime of records written by this call;
    /// anything longer than a cache's own TTL is capped to it.
    pub async fn is_valid_with(
        &self,
        token: &str,
        claimed_owner: Option<&str>,
        ttl_override: Option<Duration>,
    ) -> Result<bool, ValidationError> {
        self.verify_with(token, claimed_owner, ttl_override)
            .await
            .map(|verdict| verdict.is_valid())
    }

    pub async fn verify(
        &self,
        token: &str,
        claimed_owner: Option<&str>,
    ) -> Result<Verdict, ValidationError> {
        self.verify_with(token, claimed_owner, None).await
    }

    /// Same lookup as `is_valid_with`, but also reports which owner was verified.
    pub async fn verify_with(
        &self,
        token: &str,
        claimed_owner: Option<&str>,
        ttl_override: Option<Duration>,
    ) -> Result<Verdict, ValidationError> {
        let claimed_owner = if self.identity_binding {
            claimed_owner
        } else {
            None
        };

        if self.is_degraded() {
            return self.validate_uncached(token).await;
        }

        let now = self.clock.now();

        if let Some(record) = self.negative.get(token).await {
            if !record.is_fresh(now) {
                self.negative.invalidate_if_stale(token, now).await;
            } else if record.rejects(claimed_owner) {
                tracing::debug!(token = %fingerprint(token), "negative cache hit");
                return Ok(Verdict::Invalid);
            }
        }

        if let Some(record) = self.positive.get(token).await {
            if record.is_fresh(now) {
                return Ok(self
                    .bind_cached(token, &record, claimed_owner, ttl_override, now)
                    .await);
            }
            tracing::debug!(token = %fingerprint(token), "cached validation expired");
            self.positive.invalidate_if_stale(token, now).await;
        }

        self.validate_remote(token, claimed_owner, ttl_override)
            .await
    }

    async fn bind_cached(
        &self,
        token: &str,
        record: &TokenRecord,
        claimed_owner: Option<&str>,
        ttl_override: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Verdict {
        if record.accepts(claimed_owner) {
            tracing::debug!(token = %fingerprint(token), "retrieved token validation from cache");
            return Verdict::valid(record.owner_id.as_deref());
        }

        // accepts() only fails when both sides carry an owner
        if let (Some(owner), Some(claimant)) = (record.owner_id.as_deref(), claimed_owner) {
            self.reject_claimant(token, owner, claimant, ttl_override, now)
                .await;
        }
        Verdict::Invalid
    }

    async fn validate_remote(
        &self,
        token: &str,
        claimed_owner: Option<&str>,
        ttl_override: Option<Duration>,
    ) -> Result<Verdict, ValidationError> {
        let headers = bearer_headers(token)?;
        let response = self
            .transport
            .get(&self.validation_resource, headers)
            .await?;
        let now = self.clock.now();

        if response.status != StatusCode::OK {
            tracing::info!(
                token = %fingerprint(token),
                status = response.status.as_u16(),
                reason = response.status.canonical_reason().unwrap_or(""),
                "token rejected by validation resource"
            );
            if let Some(expiration) = self.negative_deadline(ttl_override, now) {
                let record =
                    TokenRecord::rejected(token, claimed_owner.map(str::to_string), expiration);
                self.store(&self.negative, token, record).await;
            }
            return Ok(Verdict::Invalid);
        }

        // Another task may have degraded the validator while we were waiting.
        if self.is_degraded() {
            return Ok(Verdict::valid(None));
        }

        match ValidationBody::parse(&response.body) {
            ValidationBody::Empty => {
                tracing::debug!(token = %fingerprint(token), "token valid, empty body, not cached");
                Ok(Verdict::valid(None))
            }
            ValidationBody::Unparseable(reason) => {
                self.degrade(&reason);
                Ok(Verdict::valid(None))
            }
            ValidationBody::Descriptor(descriptor) => Ok(self
                .accept_descriptor(token, claimed_owner, descriptor, ttl_override, now)
                .await),
        }
    }

    async fn accept_descriptor(
        &self,
        token: &str,
        claimed_owner: Option<&str>,
        descriptor: TokenDescriptor,
        ttl_override: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Verdict {
        if let (Some(owner), Some(claimant)) = (descriptor.subject(), claimed_owner) {
            if owner != claimant {
                self.reject_claimant(token, owner, claimant, ttl_override, now)
                    .await;
                return Verdict::Invalid;
            }
        }

        if descriptor.is_blank() {
            tracing::debug!(token = %fingerprint(token), "token valid, nothing cacheable in body");
            return Verdict::valid(None);
        }

        match self.positive_deadline(&descriptor, ttl_override, now) {
            Some(expiration) => {
                let owner = descriptor.subject().map(str::to_string);
                let record = TokenRecord::confirmed(token, owner, expiration);
                if self.store(&self.positive, token, record).await {
                    tracing::debug!(token = %fingerprint(token), %expiration, "token validation cached");
                }
            }
            None => {
                tracing::debug!(token = %fingerprint(token), "token valid but expiring, not cached");
            }
        }
        Verdict::valid(descriptor.subject())
    }

    /// A valid token presented by someone it does not belong to.
    async fn reject_claimant(
        &self,
        token: &str,
        owner: &str,
        claimant: &str,
        ttl_override: Option<Duration>,
        now: DateTime<Utc>,
    ) {
        tracing::warn!(
            event = "token_owner_mismatch",
            token = %fingerprint(token),
            owner,
            claimant,
            "token presented by an identity that does not own it"
        );
        if let Some(expiration) = self.negative_deadline(ttl_override, now) {
            let record = TokenRecord::owner_mismatch(token, claimant, expiration);
            self.store(&self.negative, token, record).await;
        }
    }

    /// Writes `record` unless the validator is degraded. A switch to degraded mode
    /// between the write and the re-check undoes the write; `degrade` sets the flag
    /// before clearing, so every write is either cleared or undone.
    async fn store(&self, cache: &OutcomeCache, token: &str, record: TokenRecord) -> bool {
        if self.is_degraded() {
            return false;
        }
        cache.put(token, record).await;
        if self.is_degraded() {
            cache.invalidate(token).await;
            return false;
        }
        true
    }

    async fn validate_uncached(&self, token: &str) -> Result<Verdict, ValidationError> {
        let headers = bearer_headers(token)?;
        let response = self
            .transport
            .get(&self.validation_resource, headers)
            .await?;

        let valid = response.status == StatusCode::OK;
        tracing::debug!(
            token = %fingerprint(token),
            status = response.status.as_u16(),
            valid,
            "degraded validation"
        );
        Ok(if valid {
            Verdict::valid(None)
        } else {
            Verdict::Invalid
        })
    }

    fn degrade(&self, reason: &str) {
        if self
            .parsing_enabled
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::warn!(
                resource = %self.validation_resource,
                reason,
                "validation resource returned a non-JSON body; disabling body parsing and caching"
            );
            self.positive.clear();
            self.negative.clear();
        }
    }

    fn positive_deadline(
        &self,
        descriptor: &TokenDescriptor,
        ttl_override: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let cap = deadline(now, effective_ttl(self.positive.ttl(), ttl_override))?;
        let expiration = match descriptor.expiry {
            Some(hint) => hint.resolve(now, self.expiry_margin).min(cap),
            None => cap,
        };
        (expiration > now).then_some(expiration)
    }

    fn negative_deadline(
        &self,
        ttl_override: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let expiration = deadline(now, effective_ttl(self.negative.ttl(), ttl_override))?;
        (expiration > now).then_some(expiration)
    }
}

fn effective_ttl(cache_ttl: Duration, ttl_override: Option<Duration>) -> Duration {
    ttl_override.map_or(cache_ttl, |ttl| ttl.min(cache_ttl))
}

/// Short, stable, non-reversible token id for logs.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest
        .iter()
        .take(6)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::clock::ManualClock;
    use crate::services::transport::{TransportResponse, TransportResult};
    use async_trait::async_trait;
    use axum::http::{HeaderMap, header};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Answers every GET with the same canned response and records what it saw.
    struct StubTransport {
        status: StatusCode,
        body: String,
        calls: AtomicUsize,
        seen_auth: Mutex<Vec<String>>,
    }

    impl StubTransport {
        fn new(status: StatusCode, body: &str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.to_string(),
                calls: AtomicUsize::new(0),
                seen_auth: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        fn backend_name(&self) -> &'static str {
            "stub"
        }

        async fn get(&self, _url: &Url, headers: HeaderMap) -> TransportResult<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(v) = headers.get(header::AUTHORIZATION) {
                self.seen_auth
                    .lock()
                    .unwrap()
                    .push(v.to_str().unwrap().to_string());
            }
            Ok(TransportResponse::new(self.status, self.body.clone()))
        }
    }

    fn validator(transport: Arc<StubTransport>, clock: &ManualClock) -> TokenValidator {
        let config = ValidatorConfig::new(Url::parse("https://auth.example.com/validate").unwrap());
        TokenValidator::new(config, transport).with_clock(Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn sends_bearer_header() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, r#"{"id":"alice"}"#);
        let v = validator(stub.clone(), &clock);

        assert!(v.is_valid("tok-1").await.unwrap());
        assert_eq!(*stub.seen_auth.lock().unwrap(), vec!["Bearer tok-1".to_string()]);
    }

    #[tokio::test]
    async fn identity_present_without_claim_is_cached_with_owner() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, r#"{"id":"alice"}"#);
        let v = validator(stub.clone(), &clock);

        assert!(v.is_valid("tok").await.unwrap());

        let record = v.positive_cache().get("tok").await.unwrap();
        assert_eq!(record.owner_id.as_deref(), Some("alice"));
        assert_eq!(record.expiration, clock.now() + chrono::TimeDelta::seconds(30));
    }

    #[tokio::test]
    async fn remote_owner_mismatch_is_negative() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, r#"{"id":"alice"}"#);
        let v = validator(stub.clone(), &clock);

        assert!(!v.is_valid_for("tok", Some("mallory")).await.unwrap());
        assert!(!v.positive_cache().contains("tok"));
        let record = v.negative_cache().get("tok").await.unwrap();
        assert_eq!(record.owner_id.as_deref(), Some("mallory"));

        // The real owner is not locked out by someone else's mismatch.
        assert!(v.is_valid_for("tok", Some("alice")).await.unwrap());
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn expiry_only_body_is_cached_without_owner() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, r#"{"token":"tok","expires_in":20}"#);
        let v = validator(stub.clone(), &clock);

        assert!(v.is_valid_for("tok", Some("bob")).await.unwrap());

        let record = v.positive_cache().get("tok").await.unwrap();
        assert_eq!(record.owner_id, None);
        // 20s hint minus the 5s margin, below the 30s cache TTL
        assert_eq!(record.expiration, clock.now() + chrono::TimeDelta::seconds(15));

        assert!(v.is_valid_for("tok", Some("carol")).await.unwrap());
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn hint_inside_the_margin_is_not_cached() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, r#"{"expires_in":3}"#);
        let v = validator(stub.clone(), &clock);

        assert!(v.is_valid("tok").await.unwrap());
        assert!(!v.positive_cache().contains("tok"));
    }

    #[tokio::test]
    async fn ttl_override_shortens_but_never_extends() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, r#"{"id":"alice"}"#);
        let v = validator(stub.clone(), &clock);

        v.is_valid_with("short", None, Some(Duration::from_secs(10)))
            .await
            .unwrap();
        v.is_valid_with("long", None, Some(Duration::from_secs(3600)))
            .await
            .unwrap();

        let short = v.positive_cache().get("short").await.unwrap();
        let long = v.positive_cache().get("long").await.unwrap();
        assert_eq!(short.expiration, clock.now() + chrono::TimeDelta::seconds(10));
        assert_eq!(long.expiration, clock.now() + chrono::TimeDelta::seconds(30));
    }

    #[tokio::test]
    async fn empty_body_is_valid_and_uncached() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, "");
        let v = validator(stub.clone(), &clock);

        assert!(v.is_valid("tok").await.unwrap());
        assert!(v.is_valid("tok").await.unwrap());
        assert_eq!(stub.calls(), 2);
        assert!(!v.is_degraded());
    }

    #[tokio::test]
    async fn blank_descriptor_is_valid_and_uncached() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, r#"{"status":"ok"}"#);
        let v = validator(stub.clone(), &clock);

        assert!(v.is_valid("tok").await.unwrap());
        assert!(!v.positive_cache().contains("tok"));
        assert!(!v.is_degraded());
    }

    #[tokio::test]
    async fn binding_disabled_ignores_claims() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, r#"{"id":"alice"}"#);
        let mut config =
            ValidatorConfig::new(Url::parse("https://auth.example.com/validate").unwrap());
        config.identity_binding = false;
        let v = TokenValidator::new(config, stub.clone()).with_clock(Arc::new(clock.clone()));

        assert!(v.is_valid_for("tok", Some("mallory")).await.unwrap());
        assert!(v.is_valid_for("tok", Some("eve")).await.unwrap());
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn stale_negative_entry_triggers_a_new_call() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::UNAUTHORIZED, "");
        let v = validator(stub.clone(), &clock);

        assert!(!v.is_valid("bad").await.unwrap());
        clock.advance(Duration::from_secs(31));
        assert!(!v.is_valid("bad").await.unwrap());
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn numeric_id_binds_without_degrading() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, r#"{"id":12345,"displayName":"Alice"}"#);
        let v = validator(stub.clone(), &clock);

        assert!(v.is_valid_for("tok", Some("12345")).await.unwrap());
        assert!(!v.is_degraded());
        assert!(!v.is_valid_for("tok", Some("mallory")).await.unwrap());
    }

    #[tokio::test]
    async fn string_lifetime_is_cached_without_degrading() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::OK, r#"{"token":"t","expires_in":"3599"}"#);
        let v = validator(stub.clone(), &clock);

        assert!(v.is_valid("tok").await.unwrap());
        assert!(!v.is_degraded());
        let record = v.positive_cache().get("tok").await.unwrap();
        assert_eq!(record.expiration, clock.now() + chrono::TimeDelta::seconds(30));
    }

    #[tokio::test]
    async fn zero_ttl_override_writes_no_negative_entry() {
        let clock = ManualClock::default();
        let stub = StubTransport::new(StatusCode::UNAUTHORIZED, "");
        let v = validator(stub.clone(), &clock);

        assert!(!v.is_valid_with("bad", None, Some(Duration::ZERO)).await.unwrap());
        assert!(!v.negative_cache().contains("bad"));
    }

    #[tokio::test]
    async fn verdict_reports_only_the_verified_owner() {
        let clock = ManualClock::default();
        let v = validator(StubTransport::new(StatusCode::OK, r#"{"id":"alice"}"#), &clock);
        assert_eq!(v.verify("tok", None).await.unwrap().owner(), Some("alice"));
        // cached path
        assert_eq!(v.verify("tok", Some("alice")).await.unwrap().owner(), Some("alice"));

        let v = validator(StubTransport::new(StatusCode::OK, r#"{"expires_in":600}"#), &clock);
        let verdict = v.verify("tok", Some("admin")).await.unwrap();
        assert!(verdict.is_valid());
        assert_eq!(verdict.owner(), None);

        let v = validator(StubTransport::new(StatusCode::UNAUTHORIZED, ""), &clock);
        assert_eq!(v.verify("tok", None).await.unwrap(), Verdict::Invalid);
    }

    #[tokio::test]
    async fn store_is_refused_once_degraded() {
        let clock = ManualClock::default();
        let v = validator(StubTransport::new(StatusCode::OK, "<html/>"), &clock);
        v.degrade("test");

        let record = TokenRecord::rejected("tok", None, clock.now() + chrono::TimeDelta::seconds(5));
        assert!(!v.store(v.negative_cache(), "tok", record).await);
        assert!(!v.negative_cache().contains("tok"));
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = fingerprint("secret-token");
        assert_eq!(a.len(), 12);
        assert_eq!(a, fingerprint("secret-token"));
        assert_ne!(a, fingerprint("other-token"));
        assert!(!a.contains("secret"));
    }
}
