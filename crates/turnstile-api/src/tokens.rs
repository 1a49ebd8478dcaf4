use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use turnstile_access::tokens;
use turnstile_types::api::{
    IssueTokenRequest, IssueTokenResponse, RedeemTokenRequest, RedeemTokenResponse,
};
use turnstile_types::time::parse_ts;

use crate::error::ApiError;
use crate::AppState;

/// POST /api/v1/tokens — the payment validator's entry point: a confirmed
/// payment becomes a pending activation token.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<IssueTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = tokens::issue(
        &state.db,
        &state.config,
        req.user_id,
        req.payment_ref.as_deref(),
        req.offer,
        Utc::now(),
    )?;

    let expires_at = parse_ts(&row.expires_at).map_err(|_| ApiError::internal())?;
    Ok((
        StatusCode::CREATED,
        Json(IssueTokenResponse {
            token: row.token,
            expires_at,
        }),
    ))
}

/// POST /api/v1/tokens/redeem — the bot's entry point: token in, one-time
/// invite link out.
pub async fn redeem_token(
    State(state): State<AppState>,
    Json(req): Json<RedeemTokenRequest>,
) -> Result<Json<RedeemTokenResponse>, ApiError> {
    let invite = turnstile_access::redeem_token(
        &state.db,
        state.adapter.as_ref(),
        &state.config,
        &req.token,
        &req.external_id,
        Utc::now(),
    )
    .await?;

    let expires_at = parse_ts(&invite.expires_at).map_err(|_| ApiError::internal())?;
    Ok(Json(RedeemTokenResponse {
        invite_link: invite.invite_link,
        expires_at,
    }))
}

/// POST /api/v1/tokens/{token}/revoke — operator force-revoke of a pending
/// token.
pub async fn revoke_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let revoked = tokens::revoke(&state.db, &token)?;
    Ok(Json(serde_json::json!({ "revoked": revoked })))
}
