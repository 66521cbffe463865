// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform client trait for content collection backends.

use async_trait::async_trait;

use crate::error::PerchError;
use crate::types::ContentItem;

/// Adapter for the monitored content platform's API.
///
/// Implementations perform the actual network collection and must carry
/// their own request timeouts; the sync scheduler wraps calls in retry
/// with backoff and surfaces persistent failures as `platform_error`.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Collect items for an account.
    ///
    /// `types` narrows collection to specific data types (empty = all).
    /// `backfill_days` bounds historical collection on an initial
    /// backfill run; None means an incremental sync.
    async fn collect(
        &self,
        account_id: &str,
        types: &[String],
        backfill_days: Option<u32>,
    ) -> Result<Vec<ContentItem>, PerchError>;

    /// Data type slugs this platform can collect, advertised via
    /// /capabilities.
    fn data_types(&self) -> Vec<String>;
}
