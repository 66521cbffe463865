// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Simulated platform client.
//!
//! Stands in for a real content platform integration: produces a small
//! batch of synthetic items per collection, scaled up for backfills.

use async_trait::async_trait;
use uuid::Uuid;

use perch_core::types::{now_iso, ContentItem};
use perch_core::{PerchError, PlatformClient};

const DATA_TYPES: &[&str] = &["posts", "comments", "reactions"];

/// Items per data type on an incremental sync.
const ITEMS_PER_TYPE: usize = 3;

#[derive(Default)]
pub struct StubPlatform;

#[async_trait]
impl PlatformClient for StubPlatform {
    async fn collect(
        &self,
        account_id: &str,
        types: &[String],
        backfill_days: Option<u32>,
    ) -> Result<Vec<ContentItem>, PerchError> {
        let selected: Vec<&str> = if types.is_empty() {
            DATA_TYPES.to_vec()
        } else {
            DATA_TYPES
                .iter()
                .filter(|t| types.iter().any(|q| q == *t))
                .copied()
                .collect()
        };

        // Backfills pretend to reach further into history.
        let per_type = match backfill_days {
            Some(days) => ITEMS_PER_TYPE + (days as usize / 10).min(20),
            None => ITEMS_PER_TYPE,
        };

        let mut items = Vec::with_capacity(selected.len() * per_type);
        for data_type in selected {
            for n in 0..per_type {
                items.push(ContentItem {
                    id: Uuid::new_v4().to_string(),
                    account_id: account_id.to_string(),
                    data_type: data_type.to_string(),
                    text: format!("simulated {data_type} #{n}"),
                    raw: Some(serde_json::json!({
                        "source": "stub",
                        "sequence": n,
                    })),
                    collected_at: now_iso(),
                });
            }
        }
        Ok(items)
    }

    fn data_types(&self) -> Vec<String> {
        DATA_TYPES.iter().map(|s| s.to_string()).collect()
    }
}
