use chrono::{Duration, Utc};
use uuid::Uuid;

use turnstile_access::{membership, notify, sweep, tokens};
use turnstile_access::{redeem_token, AccessError, PipelineConfig};
use turnstile_channel::fake::FakeChannel;
use turnstile_db::Database;
use turnstile_types::offer::Offer;
use turnstile_types::time::{fmt_ts, parse_ts};

const CHANNEL: &str = "chan-main";

fn setup() -> (Database, FakeChannel, PipelineConfig) {
    let db = Database::open_in_memory().unwrap();
    let adapter = FakeChannel::new();
    let config = PipelineConfig::new(CHANNEL);
    (db, adapter, config)
}

#[test]
fn scenario_a_token_expired_after_ttl() {
    let (db, _, config) = setup();
    let now = Utc::now();

    let token = tokens::issue(&db, &config, Uuid::new_v4(), Some("pay-1"), None, now).unwrap();

    // redemption attempted one hour past the 24h window
    let err = tokens::redeem(&db, &token.token, "tg:1", now + Duration::hours(25)).unwrap_err();
    assert!(matches!(err, AccessError::Expired));

    // the row settled to expired on the spot, without waiting for the sweep
    let stored = db.get_token_by_string(&token.token).unwrap().unwrap();
    assert_eq!(stored.status, "expired");
    assert!(db.get_membership_by_identity(CHANNEL, "tg:1").unwrap().is_none());
}

#[tokio::test]
async fn scenario_b_join_inside_invite_window() {
    let (db, adapter, config) = setup();
    let now = Utc::now();
    let user = Uuid::new_v4();

    let token = tokens::issue(&db, &config, user, None, Some(Offer::minutes(10)), now).unwrap();
    let invite = redeem_token(&db, &adapter, &config, &token.token, "tg:7", now)
        .await
        .unwrap();
    assert_eq!(invite.status, "sent");

    // invite window is five minutes
    let created = parse_ts(&invite.created_at).unwrap();
    let deadline = parse_ts(&invite.expires_at).unwrap();
    assert_eq!(deadline - created, Duration::minutes(5));

    // join lands with one second to spare
    let join_at = now + Duration::minutes(5) - Duration::seconds(1);
    let opened = membership::on_member_joined(&db, &config, "tg:7", CHANNEL, join_at)
        .unwrap()
        .expect("join should be tracked");

    assert_eq!(opened.status, "active");
    assert_eq!(opened.user_id, user.to_string());
    assert_eq!(
        parse_ts(&opened.expires_at).unwrap(),
        join_at + Duration::minutes(10)
    );
    assert!(membership::is_active(&opened, join_at));

    let stored_invite = db.get_invite_by_id(&invite.id).unwrap().unwrap();
    assert_eq!(stored_invite.status, "accepted");
}

#[tokio::test]
async fn scenario_b_join_after_invite_window_is_untracked() {
    let (db, adapter, config) = setup();
    let now = Utc::now();

    let token = tokens::issue(&db, &config, Uuid::new_v4(), None, None, now).unwrap();
    let invite = redeem_token(&db, &adapter, &config, &token.token, "tg:8", now)
        .await
        .unwrap();

    let join_at = now + Duration::minutes(5) + Duration::seconds(1);
    let opened = membership::on_member_joined(&db, &config, "tg:8", CHANNEL, join_at).unwrap();
    assert!(opened.is_none());

    // the stale invite was settled while rejecting the join
    let stored = db.get_invite_by_id(&invite.id).unwrap().unwrap();
    assert_eq!(stored.status, "expired");
    assert!(db.get_membership_by_identity(CHANNEL, "tg:8").unwrap().is_none());
}

#[tokio::test]
async fn scenario_c_membership_sweep_revokes_once() {
    let (db, adapter, config) = setup();
    let now = Utc::now();
    let user = Uuid::new_v4();

    let token = tokens::issue(&db, &config, user, None, Some(Offer::minutes(10)), now).unwrap();
    redeem_token(&db, &adapter, &config, &token.token, "tg:9", now)
        .await
        .unwrap();
    membership::on_member_joined(&db, &config, "tg:9", CHANNEL, now).unwrap();

    // one minute past the paid period
    let sweep_at = now + Duration::minutes(11);
    let n = sweep::revoke_expired_memberships(&db, &adapter, sweep_at).await.unwrap();
    assert_eq!(n, 1);

    let row = db.get_membership_by_identity(CHANNEL, "tg:9").unwrap().unwrap();
    assert_eq!(row.status, "expired");
    assert_eq!(adapter.removal_calls(), vec![(CHANNEL.to_string(), "tg:9".to_string())]);

    let notices = db.notifications_for_user(&user.to_string()).unwrap();
    assert!(notices.iter().any(|n| n.kind == "access_expired"));

    // second run is a no-op: no extra removal, no extra transition
    let n = sweep::revoke_expired_memberships(&db, &adapter, sweep_at).await.unwrap();
    assert_eq!(n, 0);
    assert_eq!(adapter.removal_calls().len(), 1);
}

#[tokio::test]
async fn membership_sweep_survives_provider_outage() {
    let (db, adapter, config) = setup();
    let now = Utc::now();

    let token = tokens::issue(&db, &config, Uuid::new_v4(), None, Some(Offer::minutes(1)), now)
        .unwrap();
    redeem_token(&db, &adapter, &config, &token.token, "tg:10", now)
        .await
        .unwrap();
    membership::on_member_joined(&db, &config, "tg:10", CHANNEL, now).unwrap();

    adapter.fail_removals(true);
    let n = sweep::revoke_expired_memberships(&db, &adapter, now + Duration::minutes(2))
        .await
        .unwrap();

    // removal failed, but local state still says access is over
    assert_eq!(n, 1);
    let row = db.get_membership_by_identity(CHANNEL, "tg:10").unwrap().unwrap();
    assert_eq!(row.status, "expired");
}

#[test]
fn scenario_d_reminder_offsets_dedup() {
    let (db, _, _) = setup();
    let now = Utc::now();
    let end = now + Duration::days(7);

    db.upsert_membership(
        "m-1",
        "user-1",
        None,
        CHANNEL,
        "tg:11",
        &fmt_ts(now),
        &fmt_ts(end),
    )
    .unwrap();

    // day D-7
    assert_eq!(notify::run_reminder_sweep(&db, now).unwrap(), 1);
    let notices = db.notifications_for_user("user-1").unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "warning_7_days");
    assert_eq!(notices[0].kind, "access_expiring");

    // same day again: nothing new
    assert_eq!(notify::run_reminder_sweep(&db, now + Duration::hours(2)).unwrap(), 0);

    // day D-3 files a distinct notice
    assert_eq!(notify::run_reminder_sweep(&db, now + Duration::days(4)).unwrap(), 1);
    let notices = db.notifications_for_user("user-1").unwrap();
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().any(|n| n.title == "warning_3_days"));

    // day D+1: the membership is no longer active, the nudge still lands
    db.end_membership("m-1", "expired", &fmt_ts(end)).unwrap();
    assert_eq!(notify::run_reminder_sweep(&db, end + Duration::days(1)).unwrap(), 1);
    let notices = db.notifications_for_user("user-1").unwrap();
    assert!(notices.iter().any(|n| n.title == "expired_1_day" && n.kind == "access_expired"));
}

#[test]
fn redemption_errors_are_distinct() {
    let (db, _, config) = setup();
    let now = Utc::now();

    assert!(matches!(
        tokens::redeem(&db, "no-such-token", "tg:1", now),
        Err(AccessError::NotFound)
    ));

    let token = tokens::issue(&db, &config, Uuid::new_v4(), None, None, now).unwrap();
    tokens::redeem(&db, &token.token, "tg:1", now).unwrap();
    assert!(matches!(
        tokens::redeem(&db, &token.token, "tg:2", now),
        Err(AccessError::AlreadyUsed)
    ));

    let token = tokens::issue(&db, &config, Uuid::new_v4(), None, None, now).unwrap();
    assert!(tokens::revoke(&db, &token.token).unwrap());
    assert!(matches!(
        tokens::redeem(&db, &token.token, "tg:3", now),
        Err(AccessError::Revoked)
    ));
}

#[tokio::test]
async fn adapter_failure_leaves_no_invite() {
    let (db, adapter, config) = setup();
    let now = Utc::now();

    let token = tokens::issue(&db, &config, Uuid::new_v4(), None, None, now).unwrap();
    adapter.fail_invites(true);

    let err = redeem_token(&db, &adapter, &config, &token.token, "tg:12", now)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::ChannelUnavailable(_)));

    // no partial invite row; the token itself was consumed and the caller
    // escalates to support
    assert!(db.latest_sent_invite("tg:12", CHANNEL).unwrap().is_none());
    let stored = db.get_token_by_string(&token.token).unwrap().unwrap();
    assert_eq!(stored.status, "used");
}

#[tokio::test]
async fn repeat_joins_keep_one_membership_row() {
    let (db, adapter, config) = setup();
    let now = Utc::now();
    let user = Uuid::new_v4();

    let token = tokens::issue(&db, &config, user, None, Some(Offer::days(30)), now).unwrap();
    redeem_token(&db, &adapter, &config, &token.token, "tg:13", now)
        .await
        .unwrap();
    let first = membership::on_member_joined(&db, &config, "tg:13", CHANNEL, now)
        .unwrap()
        .unwrap();

    // user leaves, buys again, joins again
    membership::on_member_left(&db, "tg:13", CHANNEL, now + Duration::days(1)).unwrap();
    let again = now + Duration::days(2);
    let token = tokens::issue(&db, &config, user, None, Some(Offer::days(10)), again).unwrap();
    redeem_token(&db, &adapter, &config, &token.token, "tg:13", again)
        .await
        .unwrap();
    let second = membership::on_member_joined(&db, &config, "tg:13", CHANNEL, again)
        .unwrap()
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.status, "active");
    assert_eq!(parse_ts(&second.expires_at).unwrap(), again + Duration::days(10));
}

#[test]
fn voluntary_leave_is_left_not_expired() {
    let (db, _, _) = setup();
    let now = Utc::now();

    db.upsert_membership(
        "m-2",
        "user-2",
        None,
        CHANNEL,
        "tg:14",
        &fmt_ts(now),
        &fmt_ts(now + Duration::days(30)),
    )
    .unwrap();

    assert!(membership::on_member_left(&db, "tg:14", CHANNEL, now).unwrap());
    let row = db.get_membership_by_identity(CHANNEL, "tg:14").unwrap().unwrap();
    assert_eq!(row.status, "left");
    assert!(row.ended_at.is_some());
    assert!(!membership::is_active(&row, now));

    // a rejoin without a fresh invite stays untracked — no row is reopened
    let config = PipelineConfig::new(CHANNEL);
    let opened = membership::on_member_joined(&db, &config, "tg:14", CHANNEL, now).unwrap();
    assert!(opened.is_none());
    assert_eq!(
        db.get_membership_by_identity(CHANNEL, "tg:14").unwrap().unwrap().status,
        "left"
    );
}

#[tokio::test]
async fn operator_revoke_bans_and_notifies() {
    let (db, adapter, config) = setup();
    let now = Utc::now();
    let user = Uuid::new_v4();

    let token = tokens::issue(&db, &config, user, None, None, now).unwrap();
    redeem_token(&db, &adapter, &config, &token.token, "tg:15", now)
        .await
        .unwrap();
    membership::on_member_joined(&db, &config, "tg:15", CHANNEL, now).unwrap();

    assert!(membership::revoke(&db, &adapter, "tg:15", CHANNEL, now).await.unwrap());

    let row = db.get_membership_by_identity(CHANNEL, "tg:15").unwrap().unwrap();
    assert_eq!(row.status, "banned");
    assert!(adapter.removal_calls().contains(&(CHANNEL.to_string(), "tg:15".to_string())));

    let notices = db.notifications_for_user(&user.to_string()).unwrap();
    assert!(notices.iter().any(|n| n.kind == "access_revoked"));
}

#[test]
fn token_and_invite_sweeps_are_idempotent() {
    let (db, _, config) = setup();
    let past = Utc::now() - Duration::hours(30);

    // issued 30 hours ago with a 24h ttl: already past deadline
    tokens::issue(&db, &config, Uuid::new_v4(), None, None, past).unwrap();
    tokens::issue(&db, &config, Uuid::new_v4(), None, None, past).unwrap();

    let now = Utc::now();
    assert_eq!(sweep::expire_stale_tokens(&db, now).unwrap(), 2);
    assert_eq!(sweep::expire_stale_tokens(&db, now).unwrap(), 0);
    assert_eq!(sweep::expire_stale_invites(&db, now).unwrap(), 0);
}

#[test]
fn notification_purge_honors_retention() {
    let (db, _, config) = setup();
    let now = Utc::now();

    notify::notify_event(
        &db,
        "user-3",
        turnstile_types::status::NotificationKind::PaymentVerified,
        "Payment confirmed",
        "",
        None,
        None,
        None,
        now - Duration::days(120),
    )
    .unwrap();
    notify::notify_event(
        &db,
        "user-3",
        turnstile_types::status::NotificationKind::AccessGranted,
        "Channel access granted",
        "",
        None,
        None,
        None,
        now - Duration::days(5),
    )
    .unwrap();

    assert_eq!(sweep::purge_old_notifications(&db, &config, now).unwrap(), 1);
    let left = db.notifications_for_user("user-3").unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].kind, "access_granted");
}
