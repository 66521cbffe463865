// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Watch lifecycle registry.
//!
//! Tracks which accounts are being monitored. Watch is idempotent,
//! unwatch soft-removes with a retention window, and a later re-watch
//! starts a fresh lifecycle.

pub mod registry;

pub use registry::{UnwatchReceipt, WatchOptions, WatchOutcome, WatchRegistry};
