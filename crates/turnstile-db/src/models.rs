/// Row structs mirror the schema one to one. Timestamps are the stored
/// RFC 3339 text (see `turnstile_types::time`); status columns are parsed on
/// demand with the enums in `turnstile_types::status`.

#[derive(Debug, Clone)]
pub struct TokenRow {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub payment_ref: Option<String>,
    pub offer_days: Option<i64>,
    pub offer_hours: Option<i64>,
    pub offer_minutes: Option<i64>,
    pub status: String,
    pub external_id: Option<String>,
    pub created_at: String,
    pub expires_at: String,
    pub used_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InviteRow {
    pub id: String,
    pub token_id: String,
    pub user_id: String,
    pub channel_id: String,
    pub invite_link: String,
    pub status: String,
    pub external_id: String,
    pub created_at: String,
    pub sent_at: Option<String>,
    pub accepted_at: Option<String>,
    pub expires_at: String,
}

#[derive(Debug, Clone)]
pub struct MembershipRow {
    pub id: String,
    pub user_id: String,
    pub invite_id: Option<String>,
    pub channel_id: String,
    pub external_id: String,
    pub status: String,
    pub joined_at: String,
    pub expires_at: String,
    pub ended_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub membership_id: Option<String>,
    pub kind: String,
    pub offset_days: Option<i64>,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub site_delivery: bool,
    pub email_delivery: bool,
    pub channel_delivery: bool,
    pub metadata: Option<String>,
    pub created_at: String,
    pub sent_at: Option<String>,
}
