use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use turnstile_db::models::NotificationRow;
use turnstile_db::Database;
use turnstile_types::status::{MembershipStatus, NotificationKind};
use turnstile_types::time::fmt_ts;

use crate::AccessError;

/// Day offsets relative to a subscription's end date. Negative offsets are
/// "expiring soon" warnings, positive ones are "expired, come back" nudges.
const REMINDER_OFFSETS: [i64; 7] = [-7, -3, -2, -1, 1, 2, 3];

/// File a lifecycle notice and mark it delivered to the site inbox. Returns
/// false when the (user, membership, kind, offset) slot was already taken.
#[allow(clippy::too_many_arguments)]
pub fn notify_event(
    db: &Database,
    user_id: &str,
    kind: NotificationKind,
    title: &str,
    body: &str,
    link: Option<&str>,
    membership_id: Option<&str>,
    metadata: Option<serde_json::Value>,
    now: DateTime<Utc>,
) -> Result<bool, AccessError> {
    let row = NotificationRow {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        membership_id: membership_id.map(str::to_string),
        kind: kind.as_str().to_string(),
        offset_days: None,
        title: title.to_string(),
        body: body.to_string(),
        link: link.map(str::to_string),
        site_delivery: true,
        email_delivery: false,
        channel_delivery: false,
        metadata: metadata.map(|m| m.to_string()),
        created_at: fmt_ts(now),
        sent_at: Some(fmt_ts(now)),
    };
    Ok(db.insert_notification(&row)?)
}

fn title_for(offset: i64) -> String {
    let n = offset.abs();
    let unit = if n == 1 { "day" } else { "days" };
    if offset < 0 {
        format!("warning_{n}_{unit}")
    } else {
        format!("expired_{n}_{unit}")
    }
}

fn body_for(offset: i64) -> String {
    let n = offset.abs();
    let unit = if n == 1 { "day" } else { "days" };
    if offset < 0 {
        format!("Your channel access expires in {n} {unit}. Renew to keep your spot.")
    } else {
        format!("Your channel access expired {n} {unit} ago. Come back any time.")
    }
}

/// One pass of the reminder composer for the calendar day of `now`.
///
/// For each offset, picks the memberships whose end date lands the right
/// number of days away and files the notice for that slot. The per-slot
/// UNIQUE constraint carries the dedup, so overlapping runs and re-runs on
/// the same day write each notice once. Returns how many were created.
pub fn run_reminder_sweep(db: &Database, now: DateTime<Utc>) -> Result<u64, AccessError> {
    let today = now.date_naive();
    let mut created = 0u64;

    for offset in REMINDER_OFFSETS {
        // end_date + offset == today, so the end date to look for is
        // today - offset
        let end_day = today - Duration::days(offset);
        let rows = db.memberships_ending_on(&end_day.format("%Y-%m-%d").to_string())?;

        for row in rows {
            if offset < 0 {
                // warnings only make sense while access still stands
                match row.status.parse::<MembershipStatus>() {
                    Ok(MembershipStatus::Active) => {}
                    _ => continue,
                }
            }

            let kind = if offset < 0 {
                NotificationKind::AccessExpiring
            } else {
                NotificationKind::AccessExpired
            };

            let notice = NotificationRow {
                id: Uuid::new_v4().to_string(),
                user_id: row.user_id.clone(),
                membership_id: Some(row.id.clone()),
                kind: kind.as_str().to_string(),
                offset_days: Some(offset),
                title: title_for(offset),
                body: body_for(offset),
                link: None,
                site_delivery: true,
                email_delivery: false,
                channel_delivery: false,
                metadata: None,
                created_at: fmt_ts(now),
                sent_at: Some(fmt_ts(now)),
            };
            if db.insert_notification(&notice)? {
                created += 1;
            }
        }
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_pluralize() {
        assert_eq!(title_for(-7), "warning_7_days");
        assert_eq!(title_for(-1), "warning_1_day");
        assert_eq!(title_for(1), "expired_1_day");
        assert_eq!(title_for(3), "expired_3_days");
    }
}
