// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared state for axum request handlers.

use std::sync::Arc;
use std::time::Instant;

use perch_auth::{AuthGate, DeviceFlow};
use perch_config::model::SchedulerConfig;
use perch_core::{PlatformClient, StorageAdapter};
use perch_ledger::{JobLedger, Wallet};
use perch_registry::WatchRegistry;
use perch_scheduler::SyncRunner;

#[derive(Clone)]
pub struct GatewayState {
    pub gate: Arc<AuthGate>,
    pub device: Arc<DeviceFlow>,
    pub registry: Arc<WatchRegistry>,
    pub runner: Arc<SyncRunner>,
    pub ledger: Arc<JobLedger>,
    pub wallet: Arc<Wallet>,
    pub storage: Arc<dyn StorageAdapter>,
    pub platform: Arc<dyn PlatformClient>,
    /// Display name reported by the discovery surface.
    pub service_name: String,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
    /// Scheduler settings summarized by the discovery surface.
    pub scheduler: SchedulerConfig,
}
