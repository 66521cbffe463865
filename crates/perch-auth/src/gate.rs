// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The auth gate: bearer credential verification.
//!
//! Two credential forms are accepted (checked in order):
//! 1. Personal-access token (`pat_` prefix) -- sha256 lookup against storage.
//! 2. Issuer-signed RS256 session token -- verified against the
//!    configured key set, matched by `kid`.
//!
//! On success the gate produces a [`CallerContext`] and provisions the
//! account row on first contact. Public discovery and health paths
//! never reach the gate.

use std::collections::HashMap;
use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use sha2::{Digest, Sha256};
use tracing::debug;

use perch_config::model::IssuerKey;
use perch_core::{PerchError, StorageAdapter};

use crate::claims::{CallerContext, SessionClaims};

/// Gate behavior configuration (mirrors `AuthConfig` plus the ledger's
/// starting balance for first-contact provisioning).
#[derive(Debug, Clone)]
pub struct AuthGateConfig {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_secs: u64,
    pub pat_enabled: bool,
    /// Remediation URL attached to authentication failures.
    pub action_url: String,
    /// Balance given to accounts provisioned on first request.
    pub starting_balance: i64,
}

/// Prefix distinguishing long-lived personal-access tokens from JWTs.
pub const PAT_PREFIX: &str = "pat_";

/// sha256 hex digest of a raw token. The digest, never the raw token,
/// is what storage holds.
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Generate a fresh personal-access token.
pub fn generate_pat() -> String {
    let bytes: [u8; 24] = rand::random();
    format!("{PAT_PREFIX}{}", hex::encode(bytes))
}

/// Verifies bearer credentials and produces caller contexts.
pub struct AuthGate {
    config: AuthGateConfig,
    keys: HashMap<String, DecodingKey>,
    storage: Arc<dyn StorageAdapter>,
}

impl AuthGate {
    /// Build a gate from configured issuer keys.
    ///
    /// Fails if any configured PEM does not parse as an RSA public key.
    pub fn new(
        config: AuthGateConfig,
        issuer_keys: &[IssuerKey],
        storage: Arc<dyn StorageAdapter>,
    ) -> Result<Self, PerchError> {
        let mut keys = HashMap::new();
        for key in issuer_keys {
            let decoding = DecodingKey::from_rsa_pem(key.public_key_pem.as_bytes())
                .map_err(|e| {
                    PerchError::Config(format!("auth.keys[{}]: invalid public key: {e}", key.kid))
                })?;
            keys.insert(key.kid.clone(), decoding);
        }
        Ok(Self {
            config,
            keys,
            storage,
        })
    }

    /// Remediation URL for authentication failures.
    pub fn action_url(&self) -> &str {
        &self.config.action_url
    }

    /// Verify a bearer credential and return the caller context,
    /// provisioning the account on first contact.
    pub async fn authenticate(&self, token: &str) -> Result<CallerContext, PerchError> {
        if token.starts_with(PAT_PREFIX) {
            if !self.config.pat_enabled {
                return Err(PerchError::AuthenticationFailed {
                    reason: "personal-access tokens are disabled".to_string(),
                });
            }
            return self.authenticate_pat(token).await;
        }

        let claims = self.verify_session_token(token)?;
        let entitled = claims.entitled.ok_or_else(|| PerchError::AuthenticationFailed {
            reason: "missing entitlement claim".to_string(),
        })?;
        let email = claims.email.unwrap_or_default();

        let account = self
            .storage
            .get_or_create_account(&claims.sub, &email, self.config.starting_balance)
            .await?;

        debug!(user_id = %account.id, "session token verified");
        Ok(CallerContext {
            user_id: account.id,
            email: account.email,
            entitled,
        })
    }

    async fn authenticate_pat(&self, token: &str) -> Result<CallerContext, PerchError> {
        let digest = hash_token(token);
        let account_id = self
            .storage
            .account_for_pat(&digest)
            .await?
            .ok_or_else(|| PerchError::AuthenticationFailed {
                reason: "unknown personal-access token".to_string(),
            })?;

        let account = self
            .storage
            .get_account(&account_id)
            .await?
            .ok_or_else(|| PerchError::AuthenticationFailed {
                reason: "token owner no longer exists".to_string(),
            })?;

        debug!(user_id = %account.id, "personal-access token verified");
        // PATs are only ever issued to entitled callers.
        Ok(CallerContext {
            user_id: account.id,
            email: account.email,
            entitled: true,
        })
    }

    /// Verify an RS256 session token against the key set.
    fn verify_session_token(&self, token: &str) -> Result<SessionClaims, PerchError> {
        let header = decode_header(token).map_err(|e| PerchError::AuthenticationFailed {
            reason: format!("malformed token: {e}"),
        })?;

        let key = match header.kid.as_deref() {
            Some(kid) => self.keys.get(kid).ok_or_else(|| {
                PerchError::AuthenticationFailed {
                    reason: format!("unknown key id `{kid}`"),
                }
            })?,
            // Tokens without a kid are accepted only when exactly one
            // key is configured.
            None if self.keys.len() == 1 => self.keys.values().next().ok_or_else(|| {
                PerchError::Internal("key set unexpectedly empty".to_string())
            })?,
            None => {
                return Err(PerchError::AuthenticationFailed {
                    reason: "token has no key id and multiple keys are configured".to_string(),
                })
            }
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.config.leeway_secs;
        if let Some(ref iss) = self.config.issuer {
            validation.set_issuer(&[iss]);
        }
        match self.config.audience {
            Some(ref aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let data = decode::<SessionClaims>(token, key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => PerchError::TokenExpired,
                _ => PerchError::AuthenticationFailed {
                    reason: format!("token rejected: {e}"),
                },
            }
        })?;

        Ok(data.claims)
    }
}
