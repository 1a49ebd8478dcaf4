pub mod fake;
pub mod http;

use async_trait::async_trait;
use chrono::Duration;

pub use http::HttpChannelAdapter;

/// Why a provider call did not go through. Transient by assumption: callers
/// log and retry on their own schedule rather than giving up on the record.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel provider unavailable: {0}")]
    Unavailable(String),

    #[error("channel provider timed out")]
    Timeout,
}

/// Capability boundary to the externally hosted messaging channel.
///
/// The two calls here are the only places this system blocks on the
/// provider's network; both are expected to finish within the adapter's
/// configured timeout and neither is retried inline.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Mint a one-time invite link: member limit 1, absolute expiry now + ttl.
    async fn create_single_use_invite(
        &self,
        channel_id: &str,
        ttl: Duration,
    ) -> Result<String, ChannelError>;

    /// Remove a member from the channel.
    async fn remove_member(
        &self,
        channel_id: &str,
        external_id: &str,
    ) -> Result<(), ChannelError>;
}
