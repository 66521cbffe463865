// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluggable per-account rate-limit policies for non-forced syncs.
//!
//! Policies are consulted after the single-run slot is claimed and only
//! for non-forced syncs; `force` bypasses the policy but never the
//! slot. All policies take the current instant as a parameter so tests
//! can drive the clock.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use perch_config::model::{RateLimitKind, SchedulerConfig};

/// Outcome of a rate-limit check. A denial always carries a concrete
/// future retry instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied { retry_after: DateTime<Utc> },
}

pub trait RateLimitPolicy: Send + Sync {
    /// Check whether `account_id` may sync at `now`. An allowed check
    /// counts the sync against the account's budget.
    fn check(&self, account_id: &str, now: DateTime<Utc>) -> RateDecision;

    /// Observe the outcome of a run. Only the adaptive policy reacts.
    fn observe(&self, _account_id: &str, _success: bool, _now: DateTime<Utc>) {}
}

/// Build the configured policy.
pub fn policy_from_config(config: &SchedulerConfig) -> Arc<dyn RateLimitPolicy> {
    match config.rate_limit {
        RateLimitKind::TokenBucket => Arc::new(TokenBucket::new(
            config.burst,
            config.per_window,
            config.window_secs,
        )),
        RateLimitKind::SlidingWindow => {
            Arc::new(SlidingWindow::new(config.per_window, config.window_secs))
        }
        RateLimitKind::AdaptiveBackoff => Arc::new(AdaptiveBackoff::new(
            config.backoff_base_secs,
            config.backoff_max_secs,
        )),
    }
}

// --- Token bucket ---

struct BucketState {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

/// Classic token bucket: capacity `burst`, refilled at `per_window`
/// tokens per `window_secs`.
pub struct TokenBucket {
    burst: f64,
    tokens_per_sec: f64,
    buckets: DashMap<String, BucketState>,
}

impl TokenBucket {
    pub fn new(burst: u32, per_window: u32, window_secs: u64) -> Self {
        Self {
            burst: f64::from(burst),
            tokens_per_sec: f64::from(per_window) / window_secs.max(1) as f64,
            buckets: DashMap::new(),
        }
    }
}

impl RateLimitPolicy for TokenBucket {
    fn check(&self, account_id: &str, now: DateTime<Utc>) -> RateDecision {
        let mut bucket = self
            .buckets
            .entry(account_id.to_string())
            .or_insert_with(|| BucketState {
                tokens: self.burst,
                last_refill: now,
            });

        let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        bucket.tokens = (bucket.tokens + elapsed * self.tokens_per_sec).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateDecision::Allowed
        } else {
            let deficit_secs = (1.0 - bucket.tokens) / self.tokens_per_sec;
            RateDecision::Denied {
                retry_after: now + Duration::milliseconds((deficit_secs * 1000.0).ceil() as i64),
            }
        }
    }
}

// --- Sliding window ---

/// At most `per_window` syncs within any rolling `window_secs` span.
pub struct SlidingWindow {
    per_window: usize,
    window: Duration,
    history: DashMap<String, VecDeque<DateTime<Utc>>>,
}

impl SlidingWindow {
    pub fn new(per_window: u32, window_secs: u64) -> Self {
        Self {
            per_window: per_window.max(1) as usize,
            window: Duration::seconds(window_secs as i64),
            history: DashMap::new(),
        }
    }
}

impl RateLimitPolicy for SlidingWindow {
    fn check(&self, account_id: &str, now: DateTime<Utc>) -> RateDecision {
        let mut entries = self.history.entry(account_id.to_string()).or_default();

        let cutoff = now - self.window;
        while entries.front().is_some_and(|t| *t <= cutoff) {
            entries.pop_front();
        }

        if entries.len() < self.per_window {
            entries.push_back(now);
            RateDecision::Allowed
        } else {
            // The oldest entry aging out frees the next slot.
            let oldest = *entries.front().unwrap_or(&now);
            RateDecision::Denied {
                retry_after: oldest + self.window,
            }
        }
    }
}

// --- Adaptive backoff ---

struct Penalty {
    until: DateTime<Utc>,
    current_secs: u64,
}

/// No steady-state limit; consecutive run failures impose an
/// exponentially growing cool-down, cleared by the next success.
pub struct AdaptiveBackoff {
    base_secs: u64,
    max_secs: u64,
    penalties: DashMap<String, Penalty>,
}

impl AdaptiveBackoff {
    pub fn new(base_secs: u64, max_secs: u64) -> Self {
        Self {
            base_secs: base_secs.max(1),
            max_secs: max_secs.max(1),
            penalties: DashMap::new(),
        }
    }
}

impl RateLimitPolicy for AdaptiveBackoff {
    fn check(&self, account_id: &str, now: DateTime<Utc>) -> RateDecision {
        match self.penalties.get(account_id) {
            Some(penalty) if penalty.until > now => RateDecision::Denied {
                retry_after: penalty.until,
            },
            _ => RateDecision::Allowed,
        }
    }

    fn observe(&self, account_id: &str, success: bool, now: DateTime<Utc>) {
        if success {
            self.penalties.remove(account_id);
            return;
        }
        let mut entry = self
            .penalties
            .entry(account_id.to_string())
            .or_insert_with(|| Penalty {
                until: now,
                current_secs: 0,
            });
        entry.current_secs = match entry.current_secs {
            0 => self.base_secs,
            prev => (prev * 2).min(self.max_secs),
        };
        entry.until = now + Duration::seconds(entry.current_secs as i64);
    }
}
