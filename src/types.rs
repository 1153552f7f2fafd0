//! Core data types: token bundles and the caller-facing session view

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::detect::decode_jwt_payload;
use crate::error::AuthError;
use crate::policy::{self, unix_now, RefreshPolicy};

/// Normalized result of a successful login or refresh response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    /// The short-lived access token
    pub access_token: String,

    /// The longer-lived refresh token
    pub refresh_token: String,

    /// Absolute access token expiry in Unix seconds
    pub access_expires_at: u64,

    /// Token type, e.g. "Bearer"
    pub token_type: String,

    /// Absolute refresh token expiry, when the server reports one
    pub refresh_expires_at: Option<u64>,

    /// Informational payload returned alongside the tokens
    pub session_payload: Option<Value>,
}

impl TokenBundle {
    /// Reject incomplete bundles before they reach persistence
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_token.is_empty() {
            return Err(AuthError::InvalidBundle("empty access token".to_string()));
        }
        if self.refresh_token.is_empty() {
            return Err(AuthError::InvalidBundle("empty refresh token".to_string()));
        }
        if self.access_expires_at == 0 {
            return Err(AuthError::InvalidBundle(
                "missing access token expiry".to_string(),
            ));
        }
        Ok(())
    }
}

/// The caller-facing view of the current authentication state.
///
/// Ephemeral: reconstructed from the stored tokens (or a fresh bundle) on
/// every `ensure`/`get_session` call, never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The currently valid access token
    pub access_token: String,

    /// Absolute expiry of the access token in Unix seconds
    pub expires_at: u64,

    /// Token type, e.g. "Bearer"
    pub token_type: String,

    /// Informational payload: the bundle's explicit session payload, else a
    /// best-effort JWT payload decode of the access token
    pub payload: Option<Value>,
}

impl Session {
    /// Build a session from a freshly detected bundle
    pub(crate) fn from_bundle(bundle: &TokenBundle) -> Self {
        let payload = bundle
            .session_payload
            .clone()
            .or_else(|| decode_jwt_payload(&bundle.access_token));

        Self {
            access_token: bundle.access_token.clone(),
            expires_at: bundle.access_expires_at,
            token_type: bundle.token_type.clone(),
            payload,
        }
    }

    /// Whether the session is past its effective expiry under the policy
    pub fn is_expired(&self, policy: &RefreshPolicy) -> bool {
        policy::is_expired(self.expires_at, unix_now(), policy)
    }
}

/// Response envelope returned by a successful login
#[derive(Debug, Clone)]
pub struct LoginResponse {
    /// The normalized token bundle
    pub data: TokenBundle,

    /// HTTP status returned by the login endpoint
    pub status: u16,
}

/// Per-call overrides for login/refresh requests
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    /// Extra body fields, overriding configured defaults on collision
    pub data: Option<Map<String, Value>>,

    /// Extra headers for this call only
    pub headers: Option<HashMap<String, String>>,
}
