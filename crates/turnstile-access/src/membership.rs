use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use turnstile_channel::ChannelAdapter;
use turnstile_db::models::MembershipRow;
use turnstile_db::Database;
use turnstile_types::offer::Offer;
use turnstile_types::status::{MembershipStatus, NotificationKind};
use turnstile_types::time::{fmt_ts, parse_ts};

use crate::{invites, notify, AccessError, PipelineConfig};

/// status == active AND now < subscription end.
pub fn is_active(row: &MembershipRow, now: DateTime<Utc>) -> bool {
    matches!(row.status.parse(), Ok(MembershipStatus::Active))
        && matches!(parse_ts(&row.expires_at), Ok(deadline) if now < deadline)
}

/// Reconcile a provider join event into a membership.
///
/// Looks for the most recent `sent` invite for this identity/channel. A join
/// with no such invite is untracked (an admin added someone by hand, or the
/// invite expired first) — logged and ignored, never fatal. A tracked join
/// accepts the invite, copies the purchased duration off the originating
/// token, and upserts the one membership row for (user, channel).
pub fn on_member_joined(
    db: &Database,
    config: &PipelineConfig,
    external_id: &str,
    channel_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<MembershipRow>, AccessError> {
    let Some(invite) = db.latest_sent_invite(external_id, channel_id)? else {
        info!(
            "Untracked join in {} by {} (no matching invite)",
            channel_id, external_id
        );
        return Ok(None);
    };

    // The deadline is checked live: a join that races the invite sweep is
    // still rejected once the five-minute window has passed.
    let deadline = parse_ts(&invite.expires_at).map_err(|e| AccessError::Db(e.into()))?;
    if now >= deadline {
        db.mark_invite_expired(&invite.id)?;
        info!(
            "Untracked join in {} by {}: invite {} expired before the join arrived",
            channel_id, external_id, invite.id
        );
        return Ok(None);
    }

    if !invites::mark_accepted(db, &invite.id, now)? {
        // duplicate delivery of the same join event; the upsert below is
        // keyed on (user, channel) so replaying it is harmless
        warn!("Invite {} was already accepted", invite.id);
    }

    let token = db
        .get_token_by_id(&invite.token_id)?
        .ok_or_else(|| AccessError::Db(anyhow::anyhow!("invite {} has no token", invite.id)))?;
    let offer = Offer {
        days: token.offer_days,
        hours: token.offer_hours,
        minutes: token.offer_minutes,
    };
    let expires_at = now + offer.duration(config.default_offer);

    let membership_id = db.upsert_membership(
        &Uuid::new_v4().to_string(),
        &invite.user_id,
        Some(&invite.id),
        channel_id,
        external_id,
        &fmt_ts(now),
        &fmt_ts(expires_at),
    )?;

    notify::notify_event(
        db,
        &invite.user_id,
        NotificationKind::AccessGranted,
        "Channel access granted",
        "Welcome in! Your access is now active.",
        None,
        Some(&membership_id),
        Some(json!({ "channel_id": channel_id, "expires_at": fmt_ts(expires_at) })),
        now,
    )?;

    info!(
        "Membership {} opened for user {} in {} until {}",
        membership_id,
        invite.user_id,
        channel_id,
        fmt_ts(expires_at)
    );

    db.get_membership_by_id(&membership_id)
        .map_err(AccessError::Db)
}

/// Reconcile a provider leave event.
///
/// A voluntary departure is `left`, distinct from `expired` and `banned`.
/// If the user rejoins later there is no invite to reconcile against, so no
/// membership is reopened — that case stays with product.
pub fn on_member_left(
    db: &Database,
    external_id: &str,
    channel_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, AccessError> {
    let Some(row) = db.get_membership_by_identity(channel_id, external_id)? else {
        info!("Leave event in {} by {} matches no membership", channel_id, external_id);
        return Ok(false);
    };

    let moved = db.end_membership(&row.id, MembershipStatus::Left.as_str(), &fmt_ts(now))?;
    if moved {
        info!("Membership {} closed: user left {}", row.id, channel_id);
    }
    Ok(moved)
}

/// Operator revoke: kick the member out and close the membership as
/// `banned`. The provider call is best-effort — local state is what decides
/// "should have access", the provider side catches up on a later sweep if
/// this call fails.
pub async fn revoke(
    db: &Database,
    adapter: &dyn ChannelAdapter,
    external_id: &str,
    channel_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, AccessError> {
    let Some(row) = db.get_membership_by_identity(channel_id, external_id)? else {
        return Ok(false);
    };

    if let Err(e) = adapter.remove_member(channel_id, external_id).await {
        warn!(
            "Failed to remove {} from {} while revoking membership {}: {}",
            external_id, channel_id, row.id, e
        );
    }

    let moved = db.end_membership(&row.id, MembershipStatus::Banned.as_str(), &fmt_ts(now))?;
    if moved {
        notify::notify_event(
            db,
            &row.user_id,
            NotificationKind::AccessRevoked,
            "Channel access revoked",
            "Your access to the channel was revoked. Contact support if this is unexpected.",
            None,
            Some(&row.id),
            None,
            now,
        )?;
    }
    Ok(moved)
}
