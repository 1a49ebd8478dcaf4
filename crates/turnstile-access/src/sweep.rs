use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use turnstile_channel::ChannelAdapter;
use turnstile_db::Database;
use turnstile_types::status::{MembershipStatus, NotificationKind};
use turnstile_types::time::fmt_ts;

use crate::{notify, AccessError, PipelineConfig};

/// Expire every pending token past its deadline. One bulk UPDATE; running
/// it twice in a row leaves the second call with nothing to do.
pub fn expire_stale_tokens(db: &Database, now: DateTime<Utc>) -> Result<u64, AccessError> {
    let n = db.expire_tokens_past(&fmt_ts(now))?;
    Ok(n as u64)
}

/// Same pattern for invites still `pending` or `sent` past their window.
pub fn expire_stale_invites(db: &Database, now: DateTime<Utc>) -> Result<u64, AccessError> {
    let n = db.expire_invites_past(&fmt_ts(now))?;
    Ok(n as u64)
}

/// Close every membership whose paid period has elapsed.
///
/// Per row: ask the provider to remove the member, then compare-and-set the
/// row to `expired` and file the `access_expired` notice. A provider
/// failure is logged with enough context for manual remediation and does
/// not stop the batch — local state decides "should have access"; the
/// provider side catches up on a later sweep. Returns the number of rows
/// this call transitioned.
pub async fn revoke_expired_memberships(
    db: &Database,
    adapter: &dyn ChannelAdapter,
    now: DateTime<Utc>,
) -> Result<u64, AccessError> {
    let rows = db.expired_active_memberships(&fmt_ts(now))?;
    let mut revoked = 0u64;

    for row in rows {
        if let Err(e) = adapter.remove_member(&row.channel_id, &row.external_id).await {
            warn!(
                "Failed to remove {} (user {}) from {}: {}; membership expires locally anyway",
                row.external_id, row.user_id, row.channel_id, e
            );
        }

        // a concurrent sweep may have settled this row already
        if !db.end_membership(&row.id, MembershipStatus::Expired.as_str(), &fmt_ts(now))? {
            continue;
        }

        notify::notify_event(
            db,
            &row.user_id,
            NotificationKind::AccessExpired,
            "Channel access ended",
            "Your paid period is over and channel access has ended.",
            None,
            Some(&row.id),
            None,
            now,
        )?;
        revoked += 1;
    }

    Ok(revoked)
}

/// Hard-delete notices older than the retention window.
pub fn purge_old_notifications(
    db: &Database,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<u64, AccessError> {
    let cutoff = fmt_ts(now - config.notification_retention);
    let n = db.purge_notifications_before(&cutoff)?;
    Ok(n as u64)
}

// -- Background loops --
//
// Thin interval wrappers for deployments without an external scheduler.
// Each loop runs its sweep to completion, logs the aggregate count, and
// never aborts on a failed pass. `initial_delay_secs` staggers loops that
// share a cadence so they don't all hit the database at the same instant.

pub async fn run_token_sweep_loop(db: Arc<Database>, interval_secs: u64, initial_delay_secs: u64) {
    tokio::time::sleep(StdDuration::from_secs(initial_delay_secs)).await;
    let mut interval = tokio::time::interval(StdDuration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        match expire_stale_tokens(&db, Utc::now()) {
            Ok(n) if n > 0 => info!("Token sweep: expired {} stale tokens", n),
            Ok(_) => {}
            Err(e) => warn!("Token sweep error: {}", e),
        }
    }
}

pub async fn run_invite_sweep_loop(db: Arc<Database>, interval_secs: u64, initial_delay_secs: u64) {
    tokio::time::sleep(StdDuration::from_secs(initial_delay_secs)).await;
    let mut interval = tokio::time::interval(StdDuration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        match expire_stale_invites(&db, Utc::now()) {
            Ok(n) if n > 0 => info!("Invite sweep: expired {} stale invites", n),
            Ok(_) => {}
            Err(e) => warn!("Invite sweep error: {}", e),
        }
    }
}

pub async fn run_membership_sweep_loop(
    db: Arc<Database>,
    adapter: Arc<dyn ChannelAdapter>,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(StdDuration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        match revoke_expired_memberships(&db, adapter.as_ref(), Utc::now()).await {
            Ok(n) if n > 0 => info!("Membership sweep: revoked {} expired memberships", n),
            Ok(_) => {}
            Err(e) => warn!("Membership sweep error: {}", e),
        }
    }
}

pub async fn run_notification_sweep_loop(
    db: Arc<Database>,
    config: PipelineConfig,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(StdDuration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        let now = Utc::now();
        match notify::run_reminder_sweep(&db, now) {
            Ok(n) if n > 0 => info!("Reminder sweep: created {} notices", n),
            Ok(_) => {}
            Err(e) => warn!("Reminder sweep error: {}", e),
        }
        match purge_old_notifications(&db, &config, now) {
            Ok(n) if n > 0 => info!("Notification purge: deleted {} old notices", n),
            Ok(_) => {}
            Err(e) => warn!("Notification purge error: {}", e),
        }
    }
}
