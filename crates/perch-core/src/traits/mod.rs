// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! These traits are the seams between the protocol logic (registry,
//! scheduler, ledger) and deployment-specific backends (storage engine,
//! content platform).

pub mod platform;
pub mod storage;

pub use platform::PlatformClient;
pub use storage::StorageAdapter;
