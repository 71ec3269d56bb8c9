use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::auth::resolve_session;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, db_call};

/// Resolve the bearer token into an `Identity` extension. Rejects requests
/// without a live session.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .ok_or_else(ApiError::session_expired)?;

    let (identity, _) = db_call(&state, move |s| resolve_session(s, &token)).await?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
