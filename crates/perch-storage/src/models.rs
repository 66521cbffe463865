// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `perch-core::types` for use across
//! adapter trait boundaries. This module re-exports them for convenience
//! within the storage crate.

pub use perch_core::types::{
    Account, ContentItem, ContentSummary, Job, JobFilter, SyncJobRun, WatchRegistration,
};
