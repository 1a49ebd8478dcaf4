use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Duration of a purchased offer as supplied by the payment validator.
///
/// Exactly one of the three units is expected to be set; when several are,
/// precedence is days > hours > minutes. When none is set the caller falls
/// back to its configured default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<i64>,
}

impl Offer {
    pub fn days(n: i64) -> Self {
        Self { days: Some(n), ..Self::default() }
    }

    pub fn hours(n: i64) -> Self {
        Self { hours: Some(n), ..Self::default() }
    }

    pub fn minutes(n: i64) -> Self {
        Self { minutes: Some(n), ..Self::default() }
    }

    /// Resolve to a concrete duration, falling back to `default` when no
    /// unit is set.
    pub fn duration(&self, default: Duration) -> Duration {
        if let Some(d) = self.days {
            Duration::days(d)
        } else if let Some(h) = self.hours {
            Duration::hours(h)
        } else if let Some(m) = self.minutes {
            Duration::minutes(m)
        } else {
            default
        }
    }
}
