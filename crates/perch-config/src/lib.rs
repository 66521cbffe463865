// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Perch monitoring service.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, and environment
//! variable overrides.
//!
//! # Usage
//!
//! ```no_run
//! use perch_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("service: {}", config.service.name);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::PerchConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// Returns either a valid `PerchConfig` or the full list of config errors.
pub fn load_and_validate() -> Result<PerchConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<PerchConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_and_validate_str_accepts_valid_config() {
        let config = load_and_validate_str(
            r#"
[service]
name = "perch-test"

[scheduler]
rate_limit = "token_bucket"
burst = 5
"#,
        )
        .unwrap();
        assert_eq!(config.service.name, "perch-test");
        assert_eq!(config.scheduler.burst, 5);
    }

    #[test]
    fn load_and_validate_str_rejects_semantic_errors() {
        let errors = load_and_validate_str(
            r#"
[scheduler]
tick_secs = 0
"#,
        )
        .unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn load_and_validate_str_rejects_unknown_keys() {
        let result = load_and_validate_str(
            r#"
[server]
hosst = "0.0.0.0"
"#,
        );
        assert!(result.is_err());
    }
}
