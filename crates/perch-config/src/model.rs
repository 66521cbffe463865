// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Perch monitoring service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject
//! unrecognized config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Perch configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to
/// sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PerchConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP server bind settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Auth gate settings (issuer keys, PATs, device flow).
    #[serde(default)]
    pub auth: AuthConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sync scheduler and rate limiting settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Credit ledger settings.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name reported by the discovery surface.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "perch".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// A single issuer verification key, keyed by `kid`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IssuerKey {
    /// Key id matched against the JWT header `kid`.
    pub kid: String,

    /// PEM-encoded RSA public key.
    pub public_key_pem: String,
}

/// Auth gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Expected token issuer (`iss` claim). Empty disables the check.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Expected audience (`aud` claim). Empty disables the check.
    #[serde(default)]
    pub audience: Option<String>,

    /// Issuer public keys for RS256 session token verification.
    #[serde(default)]
    pub keys: Vec<IssuerKey>,

    /// Clock skew tolerance for exp/iat validation, in seconds.
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,

    /// Whether long-lived personal-access tokens are accepted.
    #[serde(default = "default_true")]
    pub pat_enabled: bool,

    /// URL callers are sent to when authentication fails.
    #[serde(default = "default_action_url")]
    pub action_url: String,

    /// Device authorization code lifetime, in seconds.
    #[serde(default = "default_device_code_ttl_secs")]
    pub device_code_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            keys: Vec::new(),
            leeway_secs: default_leeway_secs(),
            pat_enabled: default_true(),
            action_url: default_action_url(),
            device_code_ttl_secs: default_device_code_ttl_secs(),
        }
    }
}

fn default_leeway_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_action_url() -> String {
    "https://perch.example/login".to_string()
}

fn default_device_code_ttl_secs() -> u64 {
    600
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "perch.db".to_string()
}

/// Rate-limit policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKind {
    /// Steady per-second refill with a burst allowance.
    TokenBucket,
    /// Requests per rolling window.
    SlidingWindow,
    /// Aggressive start, exponential backoff on observed platform errors.
    AdaptiveBackoff,
}

/// Sync scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Background driver tick interval, in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Default seconds between background syncs per account.
    #[serde(default = "default_sync_frequency_secs")]
    pub default_sync_frequency_secs: u32,

    /// Default days of history collected by an initial backfill.
    #[serde(default = "default_backfill_days")]
    pub default_backfill_days: u32,

    /// Upper bound on caller-requested backfill_days.
    #[serde(default = "default_max_backfill_days")]
    pub max_backfill_days: u32,

    /// Data-retention window after unwatch, in days.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Which rate-limit policy to apply to non-forced syncs.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: RateLimitKind,

    /// Token bucket: bucket capacity (burst).
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Token bucket / sliding window: allowed syncs per window.
    #[serde(default = "default_per_window")]
    pub per_window: u32,

    /// Sliding window length, in seconds. Also the token bucket refill window.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Adaptive backoff: initial penalty after a platform error, in seconds.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Adaptive backoff: penalty ceiling, in seconds.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Per-attempt timeout for platform collection calls, in seconds.
    #[serde(default = "default_platform_timeout_secs")]
    pub platform_timeout_secs: u64,

    /// Transient platform failures retried inside a run before the run fails.
    #[serde(default = "default_platform_retries")]
    pub platform_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            default_sync_frequency_secs: default_sync_frequency_secs(),
            default_backfill_days: default_backfill_days(),
            max_backfill_days: default_max_backfill_days(),
            retention_days: default_retention_days(),
            rate_limit: default_rate_limit(),
            burst: default_burst(),
            per_window: default_per_window(),
            window_secs: default_window_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
            platform_timeout_secs: default_platform_timeout_secs(),
            platform_retries: default_platform_retries(),
        }
    }
}

fn default_tick_secs() -> u64 {
    30
}

fn default_sync_frequency_secs() -> u32 {
    900
}

fn default_backfill_days() -> u32 {
    30
}

fn default_max_backfill_days() -> u32 {
    365
}

fn default_retention_days() -> u32 {
    30
}

fn default_rate_limit() -> RateLimitKind {
    RateLimitKind::SlidingWindow
}

fn default_burst() -> u32 {
    3
}

fn default_per_window() -> u32 {
    6
}

fn default_window_secs() -> u64 {
    3600
}

fn default_backoff_base_secs() -> u64 {
    60
}

fn default_backoff_max_secs() -> u64 {
    3600
}

fn default_platform_timeout_secs() -> u64 {
    30
}

fn default_platform_retries() -> u32 {
    2
}

/// Credit ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Balance given to a newly provisioned account.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: i64,

    /// One-time starter grant per (account, app) on first wallet query.
    #[serde(default = "default_starter_credits")]
    pub starter_credits: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            starter_credits: default_starter_credits(),
        }
    }
}

fn default_starting_balance() -> i64 {
    0
}

fn default_starter_credits() -> i64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = PerchConfig::default();
        assert_eq!(config.service.name, "perch");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.scheduler.rate_limit, RateLimitKind::SlidingWindow);
        assert_eq!(config.scheduler.default_backfill_days, 30);
        assert_eq!(config.ledger.starter_credits, 100);
        assert!(config.auth.pat_enabled);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml_str = r#"
[server]
host = "0.0.0.0"
prot = 9000
"#;
        let result = toml::from_str::<PerchConfig>(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn rate_limit_kind_parses_snake_case() {
        let toml_str = r#"
[scheduler]
rate_limit = "adaptive_backoff"
"#;
        let config: PerchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.rate_limit, RateLimitKind::AdaptiveBackoff);
    }

    #[test]
    fn issuer_keys_deserialize() {
        let toml_str = r#"
[auth]
issuer = "https://issuer.example"

[[auth.keys]]
kid = "k1"
public_key_pem = "-----BEGIN PUBLIC KEY-----..."
"#;
        let config: PerchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.auth.issuer.as_deref(), Some("https://issuer.example"));
        assert_eq!(config.auth.keys.len(), 1);
        assert_eq!(config.auth.keys[0].kid, "k1");
    }
}
