use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use turnstile_channel::ChannelAdapter;
use turnstile_db::models::{InviteRow, TokenRow};
use turnstile_db::Database;
use turnstile_types::status::InviteStatus;
use turnstile_types::time::fmt_ts;

use crate::{AccessError, PipelineConfig};

/// Exchange a redeemed token for a one-time provider invite.
///
/// The provider call happens first: if it fails, no invite row exists and
/// the caller sees `ChannelUnavailable` with no partial state to clean up.
pub async fn create(
    db: &Database,
    adapter: &dyn ChannelAdapter,
    config: &PipelineConfig,
    token: &TokenRow,
    external_id: &str,
    now: DateTime<Utc>,
) -> Result<InviteRow, AccessError> {
    let invite_link = adapter
        .create_single_use_invite(&config.channel_id, config.invite_ttl)
        .await?;

    let row = InviteRow {
        id: Uuid::new_v4().to_string(),
        token_id: token.id.clone(),
        user_id: token.user_id.clone(),
        channel_id: config.channel_id.clone(),
        invite_link,
        status: InviteStatus::Pending.as_str().to_string(),
        external_id: external_id.to_string(),
        created_at: fmt_ts(now),
        sent_at: None,
        accepted_at: None,
        expires_at: fmt_ts(now + config.invite_ttl),
    };
    db.insert_invite(&row)?;

    info!(
        "Invite {} minted for user {} (token {})",
        row.id, row.user_id, row.token_id
    );
    Ok(row)
}

/// `pending → sent` once the link has been handed to the user.
pub fn mark_sent(db: &Database, invite_id: &str, now: DateTime<Utc>) -> Result<bool, AccessError> {
    Ok(db.mark_invite_sent(invite_id, &fmt_ts(now))?)
}

/// `sent → accepted`. Called by the membership tracker only — a join event
/// from the provider is the one authoritative signal that the user came in.
pub fn mark_accepted(
    db: &Database,
    invite_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, AccessError> {
    Ok(db.mark_invite_accepted(invite_id, &fmt_ts(now))?)
}
