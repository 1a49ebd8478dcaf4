use crate::models::{InviteRow, MembershipRow, NotificationRow, TokenRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{params, Row};

/// Status transitions are single `UPDATE ... WHERE status = <expected>`
/// statements; callers get back whether the row actually moved. A `false`
/// means another writer won the race (or the row was never in the expected
/// state) and the caller decides what that means.
impl Database {
    // -- Access tokens --

    pub fn insert_token(&self, row: &TokenRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO access_tokens
                 (id, token, user_id, payment_ref, offer_days, offer_hours, offer_minutes,
                  status, external_id, created_at, expires_at, used_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    row.id,
                    row.token,
                    row.user_id,
                    row.payment_ref,
                    row.offer_days,
                    row.offer_hours,
                    row.offer_minutes,
                    row.status,
                    row.external_id,
                    row.created_at,
                    row.expires_at,
                    row.used_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_token_by_string(&self, token: &str) -> Result<Option<TokenRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {TOKEN_COLS} FROM access_tokens WHERE token = ?1"),
                [token],
                map_token,
            )
            .optional()
        })
    }

    pub fn get_token_by_id(&self, id: &str) -> Result<Option<TokenRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {TOKEN_COLS} FROM access_tokens WHERE id = ?1"),
                [id],
                map_token,
            )
            .optional()
        })
    }

    /// `pending` → `used`, capturing the redeeming identity. Returns false
    /// when the token was no longer pending.
    pub fn mark_token_used(&self, id: &str, external_id: &str, used_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE access_tokens
                 SET status = 'used', external_id = ?2, used_at = ?3
                 WHERE id = ?1 AND status = 'pending'",
                params![id, external_id, used_at],
            )?;
            Ok(n > 0)
        })
    }

    /// `pending` → `expired` for one token (live expiry at redemption time).
    pub fn mark_token_expired(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE access_tokens SET status = 'expired'
                 WHERE id = ?1 AND status = 'pending'",
                [id],
            )?;
            Ok(n > 0)
        })
    }

    /// Operator action; same terminal class as expiry.
    pub fn mark_token_revoked(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE access_tokens SET status = 'revoked'
                 WHERE id = ?1 AND status = 'pending'",
                [id],
            )?;
            Ok(n > 0)
        })
    }

    /// Bulk sweep: every pending token past its deadline becomes expired.
    pub fn expire_tokens_past(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE access_tokens SET status = 'expired'
                 WHERE status = 'pending' AND expires_at < ?1",
                [now],
            )?;
            Ok(n)
        })
    }

    // -- Channel invites --

    pub fn insert_invite(&self, row: &InviteRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO channel_invites
                 (id, token_id, user_id, channel_id, invite_link, status, external_id,
                  created_at, sent_at, accepted_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    row.id,
                    row.token_id,
                    row.user_id,
                    row.channel_id,
                    row.invite_link,
                    row.status,
                    row.external_id,
                    row.created_at,
                    row.sent_at,
                    row.accepted_at,
                    row.expires_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_invite_by_id(&self, id: &str) -> Result<Option<InviteRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {INVITE_COLS} FROM channel_invites WHERE id = ?1"),
                [id],
                map_invite,
            )
            .optional()
        })
    }

    pub fn mark_invite_sent(&self, id: &str, sent_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE channel_invites SET status = 'sent', sent_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![id, sent_at],
            )?;
            Ok(n > 0)
        })
    }

    /// Only the membership tracker calls this — "accepted" is the signal
    /// that the user actually joined, and the broker must not fake it.
    pub fn mark_invite_accepted(&self, id: &str, accepted_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE channel_invites SET status = 'accepted', accepted_at = ?2
                 WHERE id = ?1 AND status = 'sent'",
                params![id, accepted_at],
            )?;
            Ok(n > 0)
        })
    }

    /// Most recent invite still in `sent` for this identity/channel pair.
    pub fn latest_sent_invite(
        &self,
        external_id: &str,
        channel_id: &str,
    ) -> Result<Option<InviteRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {INVITE_COLS} FROM channel_invites
                     WHERE external_id = ?1 AND channel_id = ?2 AND status = 'sent'
                     ORDER BY created_at DESC
                     LIMIT 1"
                ),
                params![external_id, channel_id],
                map_invite,
            )
            .optional()
        })
    }

    /// Live expiry of a single invite, for when a join arrives after the
    /// deadline but before the sweep has caught the row.
    pub fn mark_invite_expired(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE channel_invites SET status = 'expired'
                 WHERE id = ?1 AND status IN ('pending', 'sent')",
                [id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn expire_invites_past(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE channel_invites SET status = 'expired'
                 WHERE status IN ('pending', 'sent') AND expires_at < ?1",
                [now],
            )?;
            Ok(n)
        })
    }

    // -- Memberships --

    /// Open (or re-open) the one membership row for (user, channel).
    /// Returns the row id. The UNIQUE pair makes concurrent joins collapse
    /// onto a single row.
    pub fn upsert_membership(
        &self,
        id: &str,
        user_id: &str,
        invite_id: Option<&str>,
        channel_id: &str,
        external_id: &str,
        joined_at: &str,
        expires_at: &str,
    ) -> Result<String> {
        self.with_conn_mut(|conn| {
            let row_id = conn.query_row(
                "INSERT INTO memberships
                 (id, user_id, invite_id, channel_id, external_id, status, joined_at, expires_at, ended_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?7, NULL)
                 ON CONFLICT(user_id, channel_id) DO UPDATE SET
                     invite_id = excluded.invite_id,
                     external_id = excluded.external_id,
                     status = 'active',
                     joined_at = excluded.joined_at,
                     expires_at = excluded.expires_at,
                     ended_at = NULL
                 RETURNING id",
                params![id, user_id, invite_id, channel_id, external_id, joined_at, expires_at],
                |r| r.get(0),
            )?;
            Ok(row_id)
        })
    }

    pub fn get_membership_by_identity(
        &self,
        channel_id: &str,
        external_id: &str,
    ) -> Result<Option<MembershipRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {MEMBERSHIP_COLS} FROM memberships
                     WHERE channel_id = ?1 AND external_id = ?2"
                ),
                params![channel_id, external_id],
                map_membership,
            )
            .optional()
        })
    }

    pub fn get_membership_by_id(&self, id: &str) -> Result<Option<MembershipRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {MEMBERSHIP_COLS} FROM memberships WHERE id = ?1"),
                [id],
                map_membership,
            )
            .optional()
        })
    }

    /// `active` → `expired` | `left` | `banned`.
    pub fn end_membership(&self, id: &str, to_status: &str, ended_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE memberships SET status = ?2, ended_at = ?3
                 WHERE id = ?1 AND status = 'active'",
                params![id, to_status, ended_at],
            )?;
            Ok(n > 0)
        })
    }

    pub fn expired_active_memberships(&self, now: &str) -> Result<Vec<MembershipRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMBERSHIP_COLS} FROM memberships
                 WHERE status = 'active' AND expires_at < ?1"
            ))?;
            let rows = stmt
                .query_map([now], map_membership)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Memberships whose paid period ends on the given calendar day
    /// (`YYYY-MM-DD`), regardless of current status — the reminder sweep
    /// filters by status per offset family.
    pub fn memberships_ending_on(&self, day: &str) -> Result<Vec<MembershipRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMBERSHIP_COLS} FROM memberships
                 WHERE substr(expires_at, 1, 10) = ?1"
            ))?;
            let rows = stmt
                .query_map([day], map_membership)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Notifications --

    /// Insert unless the (user, membership, kind, offset) slot is already
    /// taken. The UNIQUE constraint is what makes the reminder sweep safe to
    /// re-run or overlap; the return value says whether a row was written.
    pub fn insert_notification(&self, row: &NotificationRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT INTO notifications
                 (id, user_id, membership_id, kind, offset_days, title, body, link,
                  site_delivery, email_delivery, channel_delivery, metadata, created_at, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(user_id, membership_id, kind, offset_days) DO NOTHING",
                params![
                    row.id,
                    row.user_id,
                    row.membership_id,
                    row.kind,
                    row.offset_days,
                    row.title,
                    row.body,
                    row.link,
                    row.site_delivery,
                    row.email_delivery,
                    row.channel_delivery,
                    row.metadata,
                    row.created_at,
                    row.sent_at,
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn notifications_for_user(&self, user_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLS} FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], map_notification)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn purge_notifications_before(&self, cutoff: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM notifications WHERE created_at < ?1",
                [cutoff],
            )?;
            Ok(n)
        })
    }
}

const TOKEN_COLS: &str = "id, token, user_id, payment_ref, offer_days, offer_hours, \
     offer_minutes, status, external_id, created_at, expires_at, used_at";

fn map_token(row: &Row<'_>) -> rusqlite::Result<TokenRow> {
    Ok(TokenRow {
        id: row.get(0)?,
        token: row.get(1)?,
        user_id: row.get(2)?,
        payment_ref: row.get(3)?,
        offer_days: row.get(4)?,
        offer_hours: row.get(5)?,
        offer_minutes: row.get(6)?,
        status: row.get(7)?,
        external_id: row.get(8)?,
        created_at: row.get(9)?,
        expires_at: row.get(10)?,
        used_at: row.get(11)?,
    })
}

const INVITE_COLS: &str = "id, token_id, user_id, channel_id, invite_link, status, \
     external_id, created_at, sent_at, accepted_at, expires_at";

fn map_invite(row: &Row<'_>) -> rusqlite::Result<InviteRow> {
    Ok(InviteRow {
        id: row.get(0)?,
        token_id: row.get(1)?,
        user_id: row.get(2)?,
        channel_id: row.get(3)?,
        invite_link: row.get(4)?,
        status: row.get(5)?,
        external_id: row.get(6)?,
        created_at: row.get(7)?,
        sent_at: row.get(8)?,
        accepted_at: row.get(9)?,
        expires_at: row.get(10)?,
    })
}

const MEMBERSHIP_COLS: &str =
    "id, user_id, invite_id, channel_id, external_id, status, joined_at, expires_at, ended_at";

fn map_membership(row: &Row<'_>) -> rusqlite::Result<MembershipRow> {
    Ok(MembershipRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        invite_id: row.get(2)?,
        channel_id: row.get(3)?,
        external_id: row.get(4)?,
        status: row.get(5)?,
        joined_at: row.get(6)?,
        expires_at: row.get(7)?,
        ended_at: row.get(8)?,
    })
}

const NOTIFICATION_COLS: &str = "id, user_id, membership_id, kind, offset_days, title, body, \
     link, site_delivery, email_delivery, channel_delivery, metadata, created_at, sent_at";

fn map_notification(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        membership_id: row.get(2)?,
        kind: row.get(3)?,
        offset_days: row.get(4)?,
        title: row.get(5)?,
        body: row.get(6)?,
        link: row.get(7)?,
        site_delivery: row.get(8)?,
        email_delivery: row.get(9)?,
        channel_delivery: row.get(10)?,
        metadata: row.get(11)?,
        created_at: row.get(12)?,
        sent_at: row.get(13)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use turnstile_types::time::fmt_ts;

    fn token_row(token: &str, status: &str, expires_at: &str) -> TokenRow {
        TokenRow {
            id: uuid::Uuid::new_v4().to_string(),
            token: token.to_string(),
            user_id: "u1".to_string(),
            payment_ref: None,
            offer_days: None,
            offer_hours: None,
            offer_minutes: Some(10),
            status: status.to_string(),
            external_id: None,
            created_at: fmt_ts(Utc::now()),
            expires_at: expires_at.to_string(),
            used_at: None,
        }
    }

    #[test]
    fn token_used_cas_fires_once() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let row = token_row("tok-1", "pending", &fmt_ts(now + Duration::hours(24)));
        db.insert_token(&row).unwrap();

        let used_at = fmt_ts(now);
        assert!(db.mark_token_used(&row.id, "tg:1", &used_at).unwrap());
        // second writer loses the race
        assert!(!db.mark_token_used(&row.id, "tg:2", &used_at).unwrap());

        let stored = db.get_token_by_string("tok-1").unwrap().unwrap();
        assert_eq!(stored.status, "used");
        assert_eq!(stored.external_id.as_deref(), Some("tg:1"));
    }

    #[test]
    fn terminal_tokens_never_return_to_pending() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let row = token_row("tok-2", "pending", &fmt_ts(now - Duration::hours(1)));
        db.insert_token(&row).unwrap();

        assert!(db.mark_token_expired(&row.id).unwrap());
        // no transition out of a terminal state
        assert!(!db.mark_token_used(&row.id, "tg:1", &fmt_ts(now)).unwrap());
        assert!(!db.mark_token_revoked(&row.id).unwrap());
        assert_eq!(db.get_token_by_string("tok-2").unwrap().unwrap().status, "expired");
    }

    #[test]
    fn bulk_expiry_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        for i in 0..3 {
            db.insert_token(&token_row(
                &format!("stale-{i}"),
                "pending",
                &fmt_ts(now - Duration::minutes(5)),
            ))
            .unwrap();
        }
        db.insert_token(&token_row("fresh", "pending", &fmt_ts(now + Duration::hours(1))))
            .unwrap();

        assert_eq!(db.expire_tokens_past(&fmt_ts(now)).unwrap(), 3);
        assert_eq!(db.expire_tokens_past(&fmt_ts(now)).unwrap(), 0);
        assert_eq!(db.get_token_by_string("fresh").unwrap().unwrap().status, "pending");
    }

    #[test]
    fn membership_upsert_keeps_one_row_per_user_channel() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let joined = fmt_ts(now);
        let ends = fmt_ts(now + Duration::days(30));

        let id1 = db
            .upsert_membership("m1", "u1", None, "chan", "tg:1", &joined, &ends)
            .unwrap();
        let later = fmt_ts(now + Duration::days(40));
        let id2 = db
            .upsert_membership("m2", "u1", None, "chan", "tg:1", &joined, &later)
            .unwrap();

        // the second join reused the existing row
        assert_eq!(id1, id2);
        let row = db.get_membership_by_identity("chan", "tg:1").unwrap().unwrap();
        assert_eq!(row.expires_at, later);
        assert_eq!(row.status, "active");
    }

    #[test]
    fn notification_slot_unique_under_reinsert() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.upsert_membership("m1", "u1", None, "chan", "tg:1", &fmt_ts(now), &fmt_ts(now))
            .unwrap();

        let row = NotificationRow {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "u1".to_string(),
            membership_id: Some("m1".to_string()),
            kind: "access_expiring".to_string(),
            offset_days: Some(-7),
            title: "warning_7_days".to_string(),
            body: "".to_string(),
            link: None,
            site_delivery: true,
            email_delivery: false,
            channel_delivery: false,
            metadata: None,
            created_at: fmt_ts(now),
            sent_at: Some(fmt_ts(now)),
        };
        assert!(db.insert_notification(&row).unwrap());

        let dup = NotificationRow { id: uuid::Uuid::new_v4().to_string(), ..row.clone() };
        assert!(!db.insert_notification(&dup).unwrap());

        // a different offset is a different slot
        let other = NotificationRow {
            id: uuid::Uuid::new_v4().to_string(),
            offset_days: Some(-3),
            title: "warning_3_days".to_string(),
            ..row
        };
        assert!(db.insert_notification(&other).unwrap());
    }
}
