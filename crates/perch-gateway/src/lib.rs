// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Perch service.
//!
//! Routes, handlers, auth middleware, and the uniform error envelope.
//! Domain errors map to HTTP here and nowhere else.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod state;

pub use error::{ApiError, ErrorEnvelope};
pub use server::{build_router, start_server};
pub use state::GatewayState;
