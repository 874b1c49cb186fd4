/*
 * Responsibility
 * - The authenticated context handlers see
 * - bearer_auth middleware validates and inserts it into request extensions
 */

/// Context attached to a request whose bearer token was accepted.
///
/// - `owner_id` is the owner the validation resource named for the token; `None` when its
///   answer named nobody. The caller's claim alone never ends up here.
#[derive(Debug, Clone, Default)]
pub struct AuthCtx {
    pub owner_id: Option<String>,
}

impl AuthCtx {
    pub fn new(owner_id: Option<String>) -> Self {
        Self { owner_id }
    }
}
