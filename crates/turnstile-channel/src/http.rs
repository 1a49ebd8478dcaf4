use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::{ChannelAdapter, ChannelError};

/// JSON client for the provider gateway that fronts the messaging platform.
///
/// Every request carries the client-wide timeout; a slow provider surfaces
/// as `ChannelError::Timeout` instead of stalling the caller's batch.
pub struct HttpChannelAdapter {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct InviteLinkBody {
    invite_link: String,
}

impl HttpChannelAdapter {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChannelAdapter for HttpChannelAdapter {
    async fn create_single_use_invite(
        &self,
        channel_id: &str,
        ttl: Duration,
    ) -> Result<String, ChannelError> {
        let url = format!("{}/channels/{}/invites", self.base_url, channel_id);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "member_limit": 1,
                "expires_in_secs": ttl.num_seconds(),
            }))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !resp.status().is_success() {
            warn!("invite creation rejected by provider: {}", resp.status());
            return Err(ChannelError::Unavailable(format!(
                "invite creation returned {}",
                resp.status()
            )));
        }

        let body: InviteLinkBody = resp
            .json()
            .await
            .map_err(|e| ChannelError::Unavailable(format!("malformed invite response: {e}")))?;

        Ok(body.invite_link)
    }

    async fn remove_member(
        &self,
        channel_id: &str,
        external_id: &str,
    ) -> Result<(), ChannelError> {
        let url = format!(
            "{}/channels/{}/members/{}",
            self.base_url, channel_id, external_id
        );
        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !resp.status().is_success() {
            return Err(ChannelError::Unavailable(format!(
                "member removal returned {}",
                resp.status()
            )));
        }

        Ok(())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ChannelError {
    if e.is_timeout() {
        ChannelError::Timeout
    } else {
        ChannelError::Unavailable(e.to_string())
    }
}
