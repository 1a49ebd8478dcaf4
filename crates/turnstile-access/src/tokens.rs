use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use turnstile_db::models::TokenRow;
use turnstile_db::Database;
use turnstile_types::offer::Offer;
use turnstile_types::status::{NotificationKind, TokenStatus};
use turnstile_types::time::{fmt_ts, parse_ts};

use crate::notify;
use crate::{AccessError, PipelineConfig};

/// 48 random bytes → 64 url-safe characters. Unguessable; the string itself
/// is the credential.
fn generate_token() -> String {
    let mut bytes = [0u8; 48];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Mint a pending activation token for a validated payment.
///
/// The purchased offer's duration travels with the token so the membership
/// tracker can compute the subscription end without calling back out.
pub fn issue(
    db: &Database,
    config: &PipelineConfig,
    user_id: Uuid,
    payment_ref: Option<&str>,
    offer: Option<Offer>,
    now: DateTime<Utc>,
) -> Result<TokenRow, AccessError> {
    let offer = offer.unwrap_or_default();
    let row = TokenRow {
        id: Uuid::new_v4().to_string(),
        token: generate_token(),
        user_id: user_id.to_string(),
        payment_ref: payment_ref.map(str::to_string),
        offer_days: offer.days,
        offer_hours: offer.hours,
        offer_minutes: offer.minutes,
        status: TokenStatus::Pending.as_str().to_string(),
        external_id: None,
        created_at: fmt_ts(now),
        expires_at: fmt_ts(now + config.token_ttl),
        used_at: None,
    };
    db.insert_token(&row)?;

    notify::notify_event(
        db,
        &row.user_id,
        NotificationKind::PaymentVerified,
        "Payment confirmed",
        "Your payment went through. Use your activation link within 24 hours.",
        None,
        None,
        Some(json!({ "token_id": row.id, "payment_ref": row.payment_ref })),
        now,
    )?;

    info!("Issued access token {} for user {}", row.id, row.user_id);
    Ok(row)
}

/// True iff the token could still be redeemed at `now`. Evaluated live at
/// redemption so a stale `pending` row past its deadline fails even when the
/// sweeper hasn't visited it yet.
pub fn is_valid(row: &TokenRow, now: DateTime<Utc>) -> bool {
    match row.status.parse::<TokenStatus>() {
        Ok(TokenStatus::Pending) => match parse_ts(&row.expires_at) {
            Ok(deadline) => now < deadline,
            Err(_) => false,
        },
        _ => false,
    }
}

/// Redeem a token, capturing the redeeming provider identity.
///
/// The `pending → used` move is a compare-and-set; the loser of a concurrent
/// redemption of the same string gets `AlreadyUsed`, not a crash.
pub fn redeem(
    db: &Database,
    token_string: &str,
    external_id: &str,
    now: DateTime<Utc>,
) -> Result<TokenRow, AccessError> {
    let mut row = db
        .get_token_by_string(token_string)?
        .ok_or(AccessError::NotFound)?;

    let status = row
        .status
        .parse::<TokenStatus>()
        .map_err(|e| AccessError::Db(e.into()))?;

    match status {
        TokenStatus::Used => return Err(AccessError::AlreadyUsed),
        TokenStatus::Expired => return Err(AccessError::Expired),
        TokenStatus::Revoked => return Err(AccessError::Revoked),
        TokenStatus::Pending => {}
    }

    if !is_valid(&row, now) {
        // deadline passed before the sweep got here; settle the row now
        db.mark_token_expired(&row.id)?;
        return Err(AccessError::Expired);
    }

    let used_at = fmt_ts(now);
    if !db.mark_token_used(&row.id, external_id, &used_at)? {
        return Err(AccessError::AlreadyUsed);
    }

    row.status = TokenStatus::Used.as_str().to_string();
    row.external_id = Some(external_id.to_string());
    row.used_at = Some(used_at);

    info!("Token {} redeemed by {}", row.id, external_id);
    Ok(row)
}

/// Operator force-revoke. Same terminal class as expiry; only a pending
/// token can be revoked.
pub fn revoke(db: &Database, token_string: &str) -> Result<bool, AccessError> {
    let row = db
        .get_token_by_string(token_string)?
        .ok_or(AccessError::NotFound)?;
    Ok(db.mark_token_revoked(&row.id)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
