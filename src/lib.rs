//! Bearer-token validation against a remote resource, with positive and negative
//! outcome caches, identity binding, and an axum gate built on top.
//!
//! ```ignore
//! let config = ValidatorConfig::new(Url::parse("https://auth.example.com/validate")?);
//! let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(10))?);
//! let validator = TokenValidator::new(config, transport);
//!
//! if validator.is_valid_for(token, Some("user-42")).await? {
//!     // token belongs to user-42
//! }
//! ```
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

pub use services::auth::{TokenValidator, ValidationError, ValidatorConfig, Verdict};
pub use services::cache::{CacheSettings, ExpiryAnchor, OutcomeCache, TokenRecord};
pub use services::transport::{HttpTransport, ReqwestTransport, TransportError};
