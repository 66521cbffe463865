// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration error types and terminal rendering.

use thiserror::Error;

/// A configuration error surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment failed to parse or merge configuration sources.
    #[error("config parse error: {message}")]
    Parse { message: String },

    /// A semantic constraint failed after deserialization.
    #[error("config validation error: {message}")]
    Validation { message: String },
}

/// Convert a figment error (which may aggregate several failures) into
/// individual [`ConfigError::Parse`] entries.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    err.into_iter()
        .map(|e| ConfigError::Parse {
            message: e.to_string(),
        })
        .collect()
}

/// Render config errors to stderr, one per line.
pub fn render_errors(errors: &[ConfigError]) {
    eprintln!("perch: configuration invalid ({} error(s))", errors.len());
    for err in errors {
        eprintln!("  - {err}");
    }
}
