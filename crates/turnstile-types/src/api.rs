use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::offer::Offer;
use crate::status::MembershipStatus;

// -- Token issuance (payment validator → turnstile) --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueTokenRequest {
    pub user_id: Uuid,
    pub payment_ref: Option<String>,
    /// Purchased offer duration, as resolved by the payment validator.
    /// Absent means the configured default applies at join time.
    pub offer: Option<Offer>,
}

#[derive(Debug, Serialize)]
pub struct IssueTokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// -- Token redemption (bot front-end → turnstile) --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedeemTokenRequest {
    pub token: String,
    /// Provider-side identity of the redeeming user.
    pub external_id: String,
}

#[derive(Debug, Serialize)]
pub struct RedeemTokenResponse {
    pub invite_link: String,
    pub expires_at: DateTime<Utc>,
}

// -- Membership lookup (bot front-end → turnstile) --

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub user_id: Uuid,
    pub channel_id: String,
    pub external_id: String,
    pub status: MembershipStatus,
    pub joined_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// status == active AND now < expires_at
    pub is_active: bool,
}

// -- Member event webhook (provider → turnstile) --

#[derive(Debug, Serialize)]
pub struct MemberEventResponse {
    /// Whether the event was reconciled against an invite/membership.
    /// Untracked events (e.g. an admin adding someone by hand) are accepted
    /// but answered with `false`.
    pub tracked: bool,
}

// -- Sweep triggers (scheduler → turnstile) --

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResponse {
    pub swept: u64,
}

// -- Errors --

/// Machine-readable error body. The four redemption failures each carry a
/// distinct code because the remediation differs for the person reading it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
