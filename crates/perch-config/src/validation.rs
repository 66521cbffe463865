// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes. Collects all errors instead of failing fast.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::PerchConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &PerchConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.scheduler.tick_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.tick_secs must be at least 1".to_string(),
        });
    }

    if config.scheduler.default_sync_frequency_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.default_sync_frequency_secs must be at least 1".to_string(),
        });
    }

    if config.scheduler.default_backfill_days > config.scheduler.max_backfill_days {
        errors.push(ConfigError::Validation {
            message: format!(
                "scheduler.default_backfill_days ({}) exceeds max_backfill_days ({})",
                config.scheduler.default_backfill_days, config.scheduler.max_backfill_days
            ),
        });
    }

    if config.scheduler.per_window == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.per_window must be at least 1".to_string(),
        });
    }

    if config.scheduler.backoff_base_secs > config.scheduler.backoff_max_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "scheduler.backoff_base_secs ({}) exceeds backoff_max_secs ({})",
                config.scheduler.backoff_base_secs, config.scheduler.backoff_max_secs
            ),
        });
    }

    if config.ledger.starting_balance < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "ledger.starting_balance must be non-negative, got {}",
                config.ledger.starting_balance
            ),
        });
    }

    if config.ledger.starter_credits < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "ledger.starter_credits must be non-negative, got {}",
                config.ledger.starter_credits
            ),
        });
    }

    // Issuer keys must have unique, non-empty kids.
    let mut seen_kids = HashSet::new();
    for (i, key) in config.auth.keys.iter().enumerate() {
        if key.kid.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("auth.keys[{i}].kid must not be empty"),
            });
        } else if !seen_kids.insert(&key.kid) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate kid `{}` in auth.keys", key.kid),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IssuerKey;

    #[test]
    fn default_config_validates() {
        let config = PerchConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = PerchConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))
        ));
    }

    #[test]
    fn backfill_beyond_max_fails_validation() {
        let mut config = PerchConfig::default();
        config.scheduler.default_backfill_days = 500;
        config.scheduler.max_backfill_days = 365;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("backfill_days"))
        ));
    }

    #[test]
    fn duplicate_kid_fails_validation() {
        let mut config = PerchConfig::default();
        config.auth.keys = vec![
            IssuerKey {
                kid: "k1".to_string(),
                public_key_pem: "pem-a".to_string(),
            },
            IssuerKey {
                kid: "k1".to_string(),
                public_key_pem: "pem-b".to_string(),
            },
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("duplicate kid"))
        ));
    }

    #[test]
    fn negative_starter_credits_fails_validation() {
        let mut config = PerchConfig::default();
        config.ledger.starter_credits = -10;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("starter_credits"))
        ));
    }
}
