/// Factory: build `TokenValidator` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::TokenValidator;
use crate::services::transport::{HttpTransport, ReqwestTransport, TransportError};

pub fn build_token_validator(config: &Config) -> Result<Arc<TokenValidator>, TransportError> {
    let transport = ReqwestTransport::new(config.validation_timeout)?;
    Ok(build_token_validator_with(config, Arc::new(transport)))
}

/// Same as `build_token_validator`, with a caller-supplied transport.
pub fn build_token_validator_with(
    config: &Config,
    transport: Arc<dyn HttpTransport>,
) -> Arc<TokenValidator> {
    Arc::new(TokenValidator::new(config.validator_config(), transport))
}
