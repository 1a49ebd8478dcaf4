use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A status string read back from storage that none of the enums recognize.
#[derive(Debug, thiserror::Error)]
#[error("unknown status value: {0}")]
pub struct UnknownStatus(pub String);

/// Lifecycle of a single-use activation token.
///
/// `Pending` is the only non-terminal state. Once a token leaves it, it can
/// never come back — transitions are enforced in SQL with a
/// `WHERE status = 'pending'` guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Pending,
    Used,
    Expired,
    Revoked,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Used => "used",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl FromStr for TokenStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "used" => Ok(Self::Used),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a provider-issued one-time invite link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Sent,
    Accepted,
    Expired,
    Revoked,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl FromStr for InviteStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "accepted" => Ok(Self::Accepted),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current access state of a user in the external channel.
///
/// `Left` (voluntary departure) is distinct from `Expired` and `Banned` so
/// re-subscription eligibility checks can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Expired,
    Banned,
    Left,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Banned => "banned",
            Self::Left => "left",
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "banned" => Ok(Self::Banned),
            "left" => Ok(Self::Left),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of lifecycle notices this subsystem emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PaymentVerified,
    InviteSent,
    AccessGranted,
    AccessExpiring,
    AccessExpired,
    AccessRevoked,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentVerified => "payment_verified",
            Self::InviteSent => "invite_sent",
            Self::AccessGranted => "access_granted",
            Self::AccessExpiring => "access_expiring",
            Self::AccessExpired => "access_expired",
            Self::AccessRevoked => "access_revoked",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_verified" => Ok(Self::PaymentVerified),
            "invite_sent" => Ok(Self::InviteSent),
            "access_granted" => Ok(Self::AccessGranted),
            "access_expiring" => Ok(Self::AccessExpiring),
            "access_expired" => Ok(Self::AccessExpired),
            "access_revoked" => Ok(Self::AccessRevoked),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for s in [
            TokenStatus::Pending,
            TokenStatus::Used,
            TokenStatus::Expired,
            TokenStatus::Revoked,
        ] {
            assert_eq!(s.as_str().parse::<TokenStatus>().unwrap(), s);
        }
        for s in [
            MembershipStatus::Active,
            MembershipStatus::Expired,
            MembershipStatus::Banned,
            MembershipStatus::Left,
        ] {
            assert_eq!(s.as_str().parse::<MembershipStatus>().unwrap(), s);
        }
    }

    #[test]
    fn unknown_status_is_an_error() {
        assert!("archived".parse::<TokenStatus>().is_err());
        assert!("".parse::<InviteStatus>().is_err());
    }
}
