use axum::extract::State;
use axum::Json;
use chrono::Utc;

use turnstile_access::membership;
use turnstile_types::api::MemberEventResponse;
use turnstile_types::events::MemberEvent;

use crate::error::ApiError;
use crate::AppState;

/// POST /api/v1/events/member — the provider's push subscription lands
/// here. Untracked events are acknowledged so the provider doesn't retry
/// what we deliberately ignore.
pub async fn member_event(
    State(state): State<AppState>,
    Json(event): Json<MemberEvent>,
) -> Result<Json<MemberEventResponse>, ApiError> {
    let now = Utc::now();
    let tracked = match &event {
        MemberEvent::Joined { external_id, channel_id } => {
            membership::on_member_joined(&state.db, &state.config, external_id, channel_id, now)?
                .is_some()
        }
        MemberEvent::Left { external_id, channel_id } => {
            membership::on_member_left(&state.db, external_id, channel_id, now)?
        }
    };

    Ok(Json(MemberEventResponse { tracked }))
}
