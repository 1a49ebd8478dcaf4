pub mod invites;
pub mod membership;
pub mod notify;
pub mod sweep;
pub mod tokens;

use chrono::{DateTime, Duration, Utc};
use turnstile_channel::{ChannelAdapter, ChannelError};
use turnstile_db::models::InviteRow;
use turnstile_db::Database;

/// Failures surfaced to whoever is holding the token. The first four are
/// user-facing and deliberately distinct: "already used" means re-check the
/// link, "expired"/"revoked" mean ask support for a new one.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("no access token matches")]
    NotFound,

    #[error("this access token was already used")]
    AlreadyUsed,

    #[error("this access token has expired")]
    Expired,

    #[error("this access token was revoked")]
    Revoked,

    #[error("channel provider unavailable")]
    ChannelUnavailable(#[from] ChannelError),

    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// All tunables of the pipeline, passed explicitly — no process-wide
/// schedule or ambient settings anywhere below this point.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The one externally hosted channel this deployment gates.
    pub channel_id: String,
    /// How long an unredeemed activation token stays valid.
    pub token_ttl: Duration,
    /// How long a minted invite link stays usable. Short on purpose: the
    /// link is the only leakable artifact, so the exposure window is the
    /// bridge between "token redeemed" and "user joined" and nothing more.
    pub invite_ttl: Duration,
    /// Subscription length when the purchased offer carries no duration.
    pub default_offer: Duration,
    /// How long lifecycle notices are kept before the purge sweep deletes
    /// them.
    pub notification_retention: Duration,
}

impl PipelineConfig {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            token_ttl: Duration::hours(24),
            invite_ttl: Duration::minutes(5),
            default_offer: Duration::days(30),
            notification_retention: Duration::days(90),
        }
    }
}

/// The redemption entry point: token in, invite link out.
///
/// Redeems the token, exchanges it for a provider invite, marks the invite
/// sent (handing the link back to the bot is delivery) and files the
/// `invite_sent` notice. Each step reads the previous step's terminal state,
/// so a crash in the middle leaves nothing a sweep can't clean up.
pub async fn redeem_token(
    db: &Database,
    adapter: &dyn ChannelAdapter,
    config: &PipelineConfig,
    token_string: &str,
    external_id: &str,
    now: DateTime<Utc>,
) -> Result<InviteRow, AccessError> {
    let token = tokens::redeem(db, token_string, external_id, now)?;
    let mut invite = invites::create(db, adapter, config, &token, external_id, now).await?;
    if invites::mark_sent(db, &invite.id, now)? {
        invite.status = turnstile_types::status::InviteStatus::Sent.as_str().to_string();
        invite.sent_at = Some(turnstile_types::time::fmt_ts(now));
    }

    notify::notify_event(
        db,
        &token.user_id,
        turnstile_types::status::NotificationKind::InviteSent,
        "Your invite link is ready",
        "Follow the link within five minutes to join the channel.",
        Some(&invite.invite_link),
        None,
        None,
        now,
    )?;

    Ok(invite)
}
