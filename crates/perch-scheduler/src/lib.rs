// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync scheduling for the Perch service.
//!
//! Enforces one in-flight run per account, applies a configurable
//! rate-limit policy to non-forced syncs, and drives background syncs
//! from per-account schedules.

pub mod driver;
pub mod ratelimit;
pub mod runner;
pub mod slots;
pub mod stub;

pub use driver::SyncDriver;
pub use ratelimit::{
    policy_from_config, AdaptiveBackoff, RateDecision, RateLimitPolicy, SlidingWindow, TokenBucket,
};
pub use runner::{SyncRunner, SyncTicket};
pub use slots::{SlotGuard, SyncSlots};
pub use stub::StubPlatform;
