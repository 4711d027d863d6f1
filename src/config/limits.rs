//! Rate limit rules
//!
//! Rules are written as `amount,period` (for example `10,60` means ten
//! actions per sixty seconds) and keyed by the action they guard.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Limit of `amount` actions per `period_seconds` window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub amount: u32,
    pub period_seconds: u64,
}

impl RateLimitRule {
    pub fn new(amount: u32, period_seconds: u64) -> Self {
        Self {
            amount,
            period_seconds,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds)
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.amount, self.period_seconds)
    }
}

impl FromStr for RateLimitRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, period) = s
            .split_once(',')
            .ok_or_else(|| format!("expected 'amount,period', got '{}'", s))?;
        let amount = amount
            .trim()
            .parse()
            .map_err(|_| format!("bad amount '{}'", amount))?;
        let period_seconds = period
            .trim()
            .parse()
            .map_err(|_| format!("bad period '{}'", period))?;
        Ok(Self {
            amount,
            period_seconds,
        })
    }
}

/// Rules per guarded action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub rules: HashMap<String, RateLimitRule>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let mut rules = HashMap::new();
        rules.insert("create_room".to_string(), RateLimitRule::new(10, 60));
        Self { rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule() {
        let rule: RateLimitRule = "5, 30".parse().unwrap();
        assert_eq!(rule, RateLimitRule::new(5, 30));
        assert_eq!(rule.to_string(), "5,30");
        assert!("five".parse::<RateLimitRule>().is_err());
        assert!("5,x".parse::<RateLimitRule>().is_err());
    }
}
