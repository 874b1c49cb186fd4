use axum::Json;
use serde::Serialize;

use crate::api::v1::extractors::AuthCtxExtractor;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub owner_id: Option<String>,
}

/// GET /api/v1/session: echoes what the bearer gate established.
pub async fn session(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: true,
        owner_id: ctx.owner_id,
    })
}
