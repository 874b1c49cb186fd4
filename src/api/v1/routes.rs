/*
 * Responsibility
 * - v1 URL layout
 * - Everything under /api/v1 sits behind the bearer-token gate
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::session::session;
use crate::middleware::bearer_auth;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new().route("/session", get(session));
    bearer_auth::apply(protected, state)
}
