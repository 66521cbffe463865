// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session token claims and the verified caller context.

use serde::{Deserialize, Serialize};

/// Claims carried by an issuer-signed session token.
///
/// `sub` and the entitlement flag are required by the gate; `email` is
/// carried through to the caller context when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the opaque user id assigned by the issuer.
    pub sub: String,

    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,

    /// Audience.
    #[serde(default)]
    pub aud: Option<String>,

    /// Expiration time as Unix timestamp.
    pub exp: i64,

    /// Issued at as Unix timestamp.
    #[serde(default)]
    pub iat: Option<i64>,

    /// User email address.
    #[serde(default)]
    pub email: Option<String>,

    /// Entitlement flag: whether the subject may use protected
    /// operations. Absence is a rejection, not a default.
    #[serde(default)]
    pub entitled: Option<bool>,
}

/// The verified identity attached to a request after the auth gate.
#[derive(Debug, Clone, Serialize)]
pub struct CallerContext {
    pub user_id: String,
    pub email: String,
    pub entitled: bool,
}
