/*
 * Responsibility
 * - Extract the bearer token (and the optional claimed owner) from the request
 * - Ask the TokenValidator, reject with 401 / 503
 * - On success put AuthCtx (with the owner the validator verified) into request extensions
 */
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::auth::validator::fingerprint;
use crate::state::AppState;

/// Header carrying the identity the caller claims the token belongs to.
pub const CLAIMED_OWNER_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Puts bearer-token validation in front of every route of `router`.
///
/// ```ignore
/// let v1 = api::v1::routes();
/// let v1 = middleware::bearer_auth::apply(v1, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, bearer_middleware))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn claimed_owner(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(&CLAIMED_OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

async fn bearer_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or(AppError::Unauthorized)?
        .to_string();
    let owner = claimed_owner(req.headers()).map(str::to_string);

    let verdict = match state.validator.verify(&token, owner.as_deref()).await {
        Ok(verdict) => verdict,
        Err(err) => {
            tracing::warn!(error = %err, token = %fingerprint(&token), "token validation failed");
            return Err(err.into());
        }
    };

    if !verdict.is_valid() {
        return Err(AppError::Unauthorized);
    }

    // The claim header is only an input to binding; never echo it as the owner.
    req.extensions_mut().insert(AuthCtx::new(verdict.into_owner()));

    Ok(next.run(req).await)
}
