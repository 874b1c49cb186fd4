pub mod outcome;
pub mod record;

pub use outcome::{CacheSettings, ExpiryAnchor, OutcomeCache};
pub use record::{RecordOrigin, TokenRecord};
