use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::AppState;

/// Collaborators (payment validator, bot, scheduler, provider webhook)
/// authenticate with the operator-provisioned service secret.
pub async fn require_service_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(ApiError::unauthorized)?;

    if token != state.service_secret {
        return Err(ApiError::unauthorized());
    }

    Ok(next.run(req).await)
}
