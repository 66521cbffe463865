// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers, grouped by surface.

pub mod content;
pub mod device;
pub mod discovery;
pub mod jobs;
pub mod lifecycle;
