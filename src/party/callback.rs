//! Party close callbacks
//!
//! A party may name a callback that is invoked once the party is gone,
//! whether it started a game, was closed, or emptied out. The result is
//! handed back to whoever closed the party; a failure is only logged.

use crate::error::{MatchmakingError, Result};
use crate::types::Party;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The last member of an auto-close party left
    Leave,
    GameStarted,
    Close,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Leave => "leave",
            CloseReason::GameStarted => "game_started",
            CloseReason::Close => "close",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseInvocation {
    pub gamespace: String,
    pub game_name: String,
    pub game_version: String,
    pub callback: String,
    pub party: Value,
    pub message: Option<Value>,
    pub reason: CloseReason,
}

impl CloseInvocation {
    /// None when the party has no callback configured
    pub fn for_party(party: &Party, message: Option<Value>, reason: CloseReason) -> Option<Self> {
        let callback = party.close_callback.clone()?;
        Some(Self {
            gamespace: party.gamespace.clone(),
            game_name: party.game_name.clone(),
            game_version: party.game_version.clone(),
            callback,
            party: party.dump(),
            message,
            reason,
        })
    }
}

#[async_trait]
pub trait PartyCloseCallback: Send + Sync {
    async fn call(&self, invocation: &CloseInvocation) -> Result<Option<Value>>;
}

/// Invoke a party's close callback, swallowing failures
pub async fn notify_close(
    callbacks: &dyn PartyCloseCallback,
    party: &Party,
    message: Option<Value>,
    reason: CloseReason,
) -> Option<Value> {
    let invocation = CloseInvocation::for_party(party, message, reason)?;
    match callbacks.call(&invocation).await {
        Ok(result) => result,
        Err(e) => {
            warn!(
                "Failed to call close callback - party_id: {}, callback: '{}', reason: {}, error: {}",
                party.id,
                invocation.callback,
                reason.as_str(),
                e
            );
            None
        }
    }
}

/// Callback sink for deployments without a function service
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCloseCallback;

#[async_trait]
impl PartyCloseCallback for LoggingCloseCallback {
    async fn call(&self, invocation: &CloseInvocation) -> Result<Option<Value>> {
        info!(
            "Party close callback - callback: '{}', game: '{}', version: '{}', reason: {}",
            invocation.callback,
            invocation.game_name,
            invocation.game_version,
            invocation.reason.as_str()
        );
        Ok(None)
    }
}

/// Mock close callback for testing
#[derive(Debug, Default)]
pub struct MockCloseCallback {
    invocations: Mutex<Vec<CloseInvocation>>,
    result: Mutex<Option<Value>>,
    failing: Mutex<bool>,
}

impl MockCloseCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, result: Value) {
        if let Ok(mut current) = self.result.lock() {
            *current = Some(result);
        }
    }

    pub fn fail(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            *failing = true;
        }
    }

    pub fn invocations(&self) -> Vec<CloseInvocation> {
        self.invocations.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PartyCloseCallback for MockCloseCallback {
    async fn call(&self, invocation: &CloseInvocation) -> Result<Option<Value>> {
        if let Ok(mut invocations) = self.invocations.lock() {
            invocations.push(invocation.clone());
        }
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err(MatchmakingError::CloseCallbackFailed {
                callback: invocation.callback.clone(),
                message: "function raised".to_string(),
            }
            .into());
        }
        Ok(self.result.lock().ok().and_then(|r| r.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PartyFlags, PartyStatus, Settings};
    use serde_json::json;

    fn party(callback: Option<&str>) -> Party {
        Party {
            id: 5,
            gamespace: "gs".to_string(),
            game_name: "arena".to_string(),
            game_version: "1.0".to_string(),
            game_server_id: 1,
            region_id: 1,
            num_members: 0,
            max_members: 4,
            settings: Settings::new(),
            room_settings: Settings::new(),
            room_filters: None,
            flags: PartyFlags::default(),
            close_callback: callback.map(str::to_string),
            status: PartyStatus::Created,
        }
    }

    #[tokio::test]
    async fn test_no_callback_configured() {
        let callbacks = MockCloseCallback::new();
        let result = notify_close(&callbacks, &party(None), None, CloseReason::Close).await;
        assert!(result.is_none());
        assert!(callbacks.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let callbacks = MockCloseCallback::new();
        callbacks.fail();
        let result = notify_close(&callbacks, &party(Some("on_close")), None, CloseReason::Leave).await;
        assert!(result.is_none());

        let invocations = callbacks.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].reason, CloseReason::Leave);
        assert_eq!(invocations[0].party["id"], json!("5"));
    }

    #[tokio::test]
    async fn test_result_is_returned() {
        let callbacks = MockCloseCallback::new();
        callbacks.respond_with(json!({"ok": true}));
        let result = notify_close(
            &callbacks,
            &party(Some("on_close")),
            Some(json!({"bye": 1})),
            CloseReason::Close,
        )
        .await;
        assert_eq!(result, Some(json!({"ok": true})));
    }
}
