use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use turnstile_access::membership;
use turnstile_types::api::MembershipResponse;
use turnstile_types::status::MembershipStatus;
use turnstile_types::time::parse_ts;

use crate::error::ApiError;
use crate::AppState;

/// GET /api/v1/memberships/{channel_id}/{external_id} — access check for
/// the bot front-end.
pub async fn get_membership(
    State(state): State<AppState>,
    Path((channel_id, external_id)): Path<(String, String)>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let row = state
        .db
        .get_membership_by_identity(&channel_id, &external_id)
        .map_err(turnstile_access::AccessError::Db)?
        .ok_or_else(|| {
            ApiError::not_found("MEMBERSHIP_NOT_FOUND", "No membership for this identity")
        })?;

    let now = Utc::now();
    let is_active = membership::is_active(&row, now);

    let status: MembershipStatus = row.status.parse().map_err(|_| ApiError::internal())?;
    let user_id: Uuid = row.user_id.parse().map_err(|_| ApiError::internal())?;

    Ok(Json(MembershipResponse {
        user_id,
        channel_id: row.channel_id,
        external_id: row.external_id,
        status,
        joined_at: parse_ts(&row.joined_at).map_err(|_| ApiError::internal())?,
        expires_at: parse_ts(&row.expires_at).map_err(|_| ApiError::internal())?,
        is_active,
    }))
}

/// POST /api/v1/memberships/{channel_id}/{external_id}/revoke — operator
/// kick + ban.
pub async fn revoke_membership(
    State(state): State<AppState>,
    Path((channel_id, external_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let revoked = membership::revoke(
        &state.db,
        state.adapter.as_ref(),
        &external_id,
        &channel_id,
        Utc::now(),
    )
    .await?;

    Ok(Json(serde_json::json!({ "revoked": revoked })))
}
