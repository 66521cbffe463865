// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Perch monitoring service.
//!
//! This crate provides the error type, domain entities, the typed
//! metadata model, and the adapter traits (storage, platform) used
//! throughout the Perch workspace.

pub mod error;
pub mod metadata;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::PerchError;
pub use metadata::{merge_metadata, MetadataMap, MetadataValue};
pub use traits::{PlatformClient, StorageAdapter};
pub use types::{
    Account, AccountId, BackfillStatus, ContentItem, ContentSummary, Job, JobFilter,
    JobStatus, PlanTier, SummaryPeriod, SyncJobRun, SyncRunStatus, WatchRegistration,
    WatchState,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _config = PerchError::Config("test".into());
        let _storage = PerchError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _auth = PerchError::AuthenticationFailed {
            reason: "test".into(),
        };
        let _conflict = PerchError::SyncInProgress;
        let _quota = PerchError::InsufficientCredits {
            required: 5,
            available: 3,
        };
        let _platform = PerchError::Platform {
            message: "test".into(),
            source: None,
        };
        let _internal = PerchError::Internal("test".into());
    }

    #[test]
    fn adapter_traits_are_object_safe() {
        fn _storage(_: &dyn StorageAdapter) {}
        fn _platform(_: &dyn PlatformClient) {}
    }
}
