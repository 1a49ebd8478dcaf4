use serde::{Deserialize, Serialize};

/// Join/leave events pushed by the messaging provider.
///
/// The provider keys events by (external identity, channel); this subsystem
/// never sees the provider's own user records beyond that pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum MemberEvent {
    /// Someone entered the channel.
    Joined {
        external_id: String,
        channel_id: String,
    },

    /// Someone left or was removed from the channel.
    Left {
        external_id: String,
        channel_id: String,
    },
}

impl MemberEvent {
    pub fn external_id(&self) -> &str {
        match self {
            Self::Joined { external_id, .. } | Self::Left { external_id, .. } => external_id,
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            Self::Joined { channel_id, .. } | Self::Left { channel_id, .. } => channel_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_payload_shape() {
        let event: MemberEvent = serde_json::from_str(
            r#"{"event":"joined","external_id":"tg:4211","channel_id":"-100500"}"#,
        )
        .unwrap();
        match event {
            MemberEvent::Joined { ref external_id, ref channel_id } => {
                assert_eq!(external_id, "tg:4211");
                assert_eq!(channel_id, "-100500");
            }
            _ => panic!("expected joined"),
        }
    }
}
