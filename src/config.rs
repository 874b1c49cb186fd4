/*
 * Responsibility
 * - Read settings from the environment (validation resource, cache sizes/TTLs, binding)
 * - Validate them (missing or malformed values fail startup)
 * - Hand the validator its own `ValidatorConfig`
 */
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::services::auth::ValidatorConfig;
use crate::services::cache::{CacheSettings, ExpiryAnchor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub validation_resource: Url,
    pub validation_timeout: Duration,

    pub positive_cache: CacheSettings,
    pub negative_cache: CacheSettings,
    pub identity_binding: bool,
    pub expiry_margin: Duration,

    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source (the process env in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&lookup, "PORT", 3000)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let validation_resource = lookup("TOKEN_VALIDATION_URL")
            .ok_or(ConfigError::Missing("TOKEN_VALIDATION_URL"))?;
        let validation_resource = Url::parse(validation_resource.trim())
            .map_err(|_| ConfigError::Invalid("TOKEN_VALIDATION_URL"))?;
        if !matches!(validation_resource.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid("TOKEN_VALIDATION_URL"));
        }

        let validation_timeout =
            Duration::from_secs(parse_or(&lookup, "VALIDATION_HTTP_TIMEOUT_SECONDS", 10)?);

        let anchor = match lookup("TOKEN_CACHE_EXPIRY") {
            Some(raw) => {
                ExpiryAnchor::parse(&raw).ok_or(ConfigError::Invalid("TOKEN_CACHE_EXPIRY"))?
            }
            None => ExpiryAnchor::Write,
        };

        let cache_size: u64 = parse_or(&lookup, "TOKEN_CACHE_SIZE", 1000)?;
        let cache_ttl: u64 = parse_or(&lookup, "TOKEN_CACHE_TTL_SECONDS", 30)?;
        if cache_ttl == 0 {
            return Err(ConfigError::Invalid("TOKEN_CACHE_TTL_SECONDS"));
        }
        let negative_size: u64 = parse_or(&lookup, "NEGATIVE_CACHE_SIZE", cache_size)?;
        let negative_ttl: u64 = parse_or(&lookup, "NEGATIVE_CACHE_TTL_SECONDS", cache_ttl)?;
        if negative_ttl == 0 {
            return Err(ConfigError::Invalid("NEGATIVE_CACHE_TTL_SECONDS"));
        }

        let positive_cache =
            CacheSettings::new(cache_size, Duration::from_secs(cache_ttl)).with_anchor(anchor);
        let negative_cache =
            CacheSettings::new(negative_size, Duration::from_secs(negative_ttl)).with_anchor(anchor);

        let identity_binding = match lookup("TOKEN_IDENTITY_BINDING") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid("TOKEN_IDENTITY_BINDING"))?,
            None => true,
        };

        let expiry_margin =
            Duration::from_secs(parse_or(&lookup, "TOKEN_EXPIRY_MARGIN_SECONDS", 5)?);
        let request_timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?);

        Ok(Self {
            addr,
            app_env,
            validation_resource,
            validation_timeout,
            positive_cache,
            negative_cache,
            identity_binding,
            expiry_margin,
            request_timeout,
        })
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            validation_resource: self.validation_resource.clone(),
            positive_cache: self.positive_cache,
            negative_cache: self.negative_cache,
            identity_binding: self.identity_binding,
            expiry_margin: self.expiry_margin,
        }
    }
}

// Absent -> default. Present but malformed -> error (a typo should not silently fall back).
fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
