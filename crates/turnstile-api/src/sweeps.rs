use axum::extract::State;
use axum::Json;
use chrono::Utc;
use tracing::info;

use turnstile_access::{notify, sweep};
use turnstile_types::api::SweepResponse;

use crate::error::ApiError;
use crate::AppState;

/// The scheduler-facing sweep triggers. Each runs one idempotent pass and
/// answers with the number of records it moved — the only observability
/// contract the scheduler gets.

pub async fn sweep_tokens(State(state): State<AppState>) -> Result<Json<SweepResponse>, ApiError> {
    let swept = sweep::expire_stale_tokens(&state.db, Utc::now())?;
    info!("Token sweep via API: {} expired", swept);
    Ok(Json(SweepResponse { swept }))
}

pub async fn sweep_invites(State(state): State<AppState>) -> Result<Json<SweepResponse>, ApiError> {
    let swept = sweep::expire_stale_invites(&state.db, Utc::now())?;
    info!("Invite sweep via API: {} expired", swept);
    Ok(Json(SweepResponse { swept }))
}

pub async fn sweep_memberships(
    State(state): State<AppState>,
) -> Result<Json<SweepResponse>, ApiError> {
    let swept =
        sweep::revoke_expired_memberships(&state.db, state.adapter.as_ref(), Utc::now()).await?;
    info!("Membership sweep via API: {} revoked", swept);
    Ok(Json(SweepResponse { swept }))
}

pub async fn sweep_notifications(
    State(state): State<AppState>,
) -> Result<Json<SweepResponse>, ApiError> {
    let swept = notify::run_reminder_sweep(&state.db, Utc::now())?;
    info!("Reminder sweep via API: {} created", swept);
    Ok(Json(SweepResponse { swept }))
}

pub async fn sweep_purge(State(state): State<AppState>) -> Result<Json<SweepResponse>, ApiError> {
    let swept = sweep::purge_old_notifications(&state.db, &state.config, Utc::now())?;
    info!("Notification purge via API: {} deleted", swept);
    Ok(Json(SweepResponse { swept }))
}
