//! In-memory adapter for tests: records every call, serves deterministic
//! invite links, and can be told to fail either operation.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Duration;

use crate::{ChannelAdapter, ChannelError};

#[derive(Default)]
pub struct FakeChannel {
    counter: AtomicU64,
    fail_invites: AtomicBool,
    fail_removals: AtomicBool,
    invites: Mutex<Vec<(String, i64)>>,
    removals: Mutex<Vec<(String, String)>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_invites(&self, fail: bool) {
        self.fail_invites.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    /// (channel_id, ttl_secs) per successful invite call.
    pub fn invite_calls(&self) -> Vec<(String, i64)> {
        self.invites.lock().unwrap().clone()
    }

    /// (channel_id, external_id) per removal attempt, including failed ones.
    pub fn removal_calls(&self) -> Vec<(String, String)> {
        self.removals.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelAdapter for FakeChannel {
    async fn create_single_use_invite(
        &self,
        channel_id: &str,
        ttl: Duration,
    ) -> Result<String, ChannelError> {
        if self.fail_invites.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("scripted failure".to_string()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.invites
            .lock()
            .unwrap()
            .push((channel_id.to_string(), ttl.num_seconds()));
        Ok(format!("https://chan.example/join/{n}"))
    }

    async fn remove_member(
        &self,
        channel_id: &str,
        external_id: &str,
    ) -> Result<(), ChannelError> {
        self.removals
            .lock()
            .unwrap()
            .push((channel_id.to_string(), external_id.to_string()));

        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("scripted failure".to_string()));
        }
        Ok(())
    }
}
