pub mod body;
pub mod clock;
pub mod factory;
pub mod validator;

pub use body::{ExpiryHint, RemoteIdentity, TokenDescriptor, ValidationBody};
pub use clock::{Clock, ManualClock, SystemClock};
pub use factory::{build_token_validator, build_token_validator_with};
pub use validator::{TokenValidator, ValidationError, ValidatorConfig, Verdict};
