//! Per-account rate limiting with refundable leases
//!
//! `acquire` consumes one unit of an account's quota for an action and hands
//! back a `Lease`. When the guarded work fails for reasons that are not the
//! caller's fault, `Lease::rollback` returns the unit.

use crate::config::{RateLimitRule, RateLimitSettings};
use crate::error::{MatchmakingError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Action name guarding room creation
pub const CREATE_ROOM: &str = "create_room";

/// Returns a consumed unit to its window
#[async_trait]
pub trait LeaseRefund: Send + Sync {
    async fn refund(&self, action: &str, account_id: &str, window: u64);
}

/// One consumed unit of quota
pub struct Lease {
    action: String,
    account_id: String,
    window: u64,
    refund: Option<Arc<dyn LeaseRefund>>,
}

impl Lease {
    pub fn new(
        action: &str,
        account_id: &str,
        window: u64,
        refund: Arc<dyn LeaseRefund>,
    ) -> Self {
        Self {
            action: action.to_string(),
            account_id: account_id.to_string(),
            window,
            refund: Some(refund),
        }
    }

    /// A lease for an action without a configured limit
    pub fn unlimited(action: &str, account_id: &str) -> Self {
        Self {
            action: action.to_string(),
            account_id: account_id.to_string(),
            window: 0,
            refund: None,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Give the consumed unit back
    pub async fn rollback(self) {
        if let Some(refund) = self.refund {
            refund
                .refund(&self.action, &self.account_id, self.window)
                .await;
            debug!(
                "Rate limit refunded - action: '{}', account_id: '{}'",
                self.action, self.account_id
            );
        }
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("action", &self.action)
            .field("account_id", &self.account_id)
            .field("window", &self.window)
            .field("refundable", &self.refund.is_some())
            .finish()
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Consume one unit, RateLimitExceeded when the window is exhausted
    async fn acquire(&self, action: &str, account_id: &str) -> Result<Lease>;
}

#[derive(Debug)]
struct Window {
    epoch: u64,
    started: Instant,
    used: u32,
}

#[derive(Debug, Default)]
struct LimiterState {
    rules: HashMap<String, RateLimitRule>,
    windows: Mutex<HashMap<(String, String), Window>>,
}

#[async_trait]
impl LeaseRefund for LimiterState {
    async fn refund(&self, action: &str, account_id: &str, window: u64) {
        let Ok(mut windows) = self.windows.lock() else {
            warn!("Failed to acquire rate limit lock, refund dropped - action: '{}'", action);
            return;
        };
        if let Some(current) = windows.get_mut(&(action.to_string(), account_id.to_string())) {
            // A refund for an expired window has nothing left to return
            if current.epoch == window {
                current.used = current.used.saturating_sub(1);
            }
        }
    }
}

/// Fixed-window limiter keyed by action and account
#[derive(Debug, Clone)]
pub struct InMemoryRateLimiter {
    state: Arc<LimiterState>,
}

impl InMemoryRateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            state: Arc::new(LimiterState {
                rules: settings.rules.clone(),
                windows: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Units consumed in the account's current window
    pub fn used(&self, action: &str, account_id: &str) -> u32 {
        self.state
            .windows
            .lock()
            .ok()
            .and_then(|windows| {
                windows
                    .get(&(action.to_string(), account_id.to_string()))
                    .map(|w| w.used)
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn acquire(&self, action: &str, account_id: &str) -> Result<Lease> {
        let Some(rule) = self.state.rules.get(action).copied() else {
            return Ok(Lease::unlimited(action, account_id));
        };

        let epoch = {
            let mut windows = self.state.windows.lock().map_err(|_| {
                MatchmakingError::InternalError {
                    message: "Failed to acquire rate limit lock".to_string(),
                }
            })?;
            let now = Instant::now();
            let window = windows
                .entry((action.to_string(), account_id.to_string()))
                .or_insert(Window {
                    epoch: 0,
                    started: now,
                    used: 0,
                });

            if now.duration_since(window.started) >= rule.period() {
                window.epoch += 1;
                window.started = now;
                window.used = 0;
            }

            if window.used >= rule.amount {
                return Err(MatchmakingError::RateLimitExceeded {
                    action: action.to_string(),
                    account_id: account_id.to_string(),
                }
                .into());
            }
            window.used += 1;
            window.epoch
        };

        Ok(Lease::new(action, account_id, epoch, self.state.clone()))
    }
}
