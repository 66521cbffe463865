// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit-reservation job ledger.
//!
//! Billable work reserves its estimated cost at creation, settles the
//! difference to the actual cost on completion, and refunds on failure.
//! Balance mutations go through a compare-and-swap retry loop so each
//! account's ledger history is linearizable.

pub mod ledger;
pub mod wallet;

pub use ledger::JobLedger;
pub use wallet::{Wallet, WalletView};
