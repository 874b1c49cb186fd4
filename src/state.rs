/*
 * Responsibility
 * - Shared context handed to the router (the token validator)
 * - Clone is cheap (Arc inside)
 */
use std::sync::Arc;

use crate::services::auth::TokenValidator;

#[derive(Clone, Debug)]
pub struct AppState {
    pub validator: Arc<TokenValidator>,
}

impl AppState {
    pub fn new(validator: Arc<TokenValidator>) -> Self {
        Self { validator }
    }
}
