//! Field detection: turning an arbitrary login/refresh response into a
//! normalized token bundle

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::AuthError;
use crate::policy::unix_now;
use crate::types::TokenBundle;

/// Conventional field names probed for the access token, in order
pub const ACCESS_TOKEN_ALIASES: &[&str] = &[
    "access_token",
    "accessToken",
    "token",
    "jwt",
    "id_token",
    "idToken",
];

/// Conventional field names probed for the refresh token, in order
pub const REFRESH_TOKEN_ALIASES: &[&str] = &["refresh_token", "refreshToken", "refresh"];

const EXPIRES_AT_ALIASES: &[&str] = &["expires_at", "expiresAt", "exp", "expiry", "expiration"];
const EXPIRES_IN_ALIASES: &[&str] = &["expires_in", "expiresIn", "expires", "ttl"];
const REFRESH_EXPIRES_AT_ALIASES: &[&str] = &["refresh_expires_at", "refreshExpiresAt"];
const REFRESH_EXPIRES_IN_ALIASES: &[&str] = &["refresh_expires_in", "refreshExpiresIn"];
const TOKEN_TYPE_ALIASES: &[&str] = &["token_type", "tokenType", "type"];
const SESSION_PAYLOAD_ALIASES: &[&str] = &["user", "session", "payload", "account", "profile"];

/// Caller-supplied field names, taking priority over the alias lists.
///
/// A mapped name that is absent from the body falls back to the aliases,
/// so a mapping only needs to name the fields that actually deviate.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    /// Field holding the access token
    pub access_token: Option<String>,

    /// Field holding the refresh token
    pub refresh_token: Option<String>,

    /// Field holding the absolute expiry (Unix seconds)
    pub expires_at: Option<String>,

    /// Field holding the relative expiry ("expires in N seconds")
    pub expires_in: Option<String>,

    /// Field holding the token type
    pub token_type: Option<String>,

    /// Field holding an informational session payload
    pub session_payload: Option<String>,
}

/// Normalize a login/refresh response body into a [`TokenBundle`].
///
/// Access and refresh tokens are mandatory; expiry is resolved from an
/// absolute timestamp field first, else computed from a relative
/// "expires in" field plus the current wall clock. Token type and session
/// payload are optional.
pub fn detect(body: &Value, mapping: Option<&FieldMapping>) -> Result<TokenBundle, AuthError> {
    let object = body
        .as_object()
        .ok_or_else(|| AuthError::Detection("response body is not a JSON object".to_string()))?;

    let access_token = required_string(
        object,
        mapping.and_then(|m| m.access_token.as_deref()),
        ACCESS_TOKEN_ALIASES,
        "access token",
    )?;
    let refresh_token = required_string(
        object,
        mapping.and_then(|m| m.refresh_token.as_deref()),
        REFRESH_TOKEN_ALIASES,
        "refresh token",
    )?;

    let access_expires_at = resolve_expiry(
        object,
        mapping.and_then(|m| m.expires_at.as_deref()),
        mapping.and_then(|m| m.expires_in.as_deref()),
    )?;

    let token_type = probe(object, mapping.and_then(|m| m.token_type.as_deref()), TOKEN_TYPE_ALIASES)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| "Bearer".to_string());

    let refresh_expires_at = probe(object, None, REFRESH_EXPIRES_AT_ALIASES)
        .and_then(as_seconds)
        .or_else(|| {
            probe(object, None, REFRESH_EXPIRES_IN_ALIASES)
                .and_then(as_seconds)
                .map(|relative| unix_now().saturating_add(relative))
        });

    let session_payload = probe(
        object,
        mapping.and_then(|m| m.session_payload.as_deref()),
        SESSION_PAYLOAD_ALIASES,
    )
    .cloned();

    Ok(TokenBundle {
        access_token,
        refresh_token,
        access_expires_at,
        token_type,
        refresh_expires_at,
        session_payload,
    })
}

/// Decode the payload segment of a JWT without verifying the signature.
///
/// Advisory only: returns `None` on any malformed input and must never gate
/// authentication decisions.
pub fn decode_jwt_payload(token: &str) -> Option<Value> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let decoded = URL_SAFE_NO_PAD.decode(segments[1]).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    serde_json::from_str(&text).ok()
}

/// First match wins: the mapped name (when present in the body), then the
/// alias list in order
fn probe<'a>(
    object: &'a Map<String, Value>,
    mapped: Option<&str>,
    aliases: &[&str],
) -> Option<&'a Value> {
    if let Some(name) = mapped {
        if let Some(value) = object.get(name) {
            return Some(value);
        }
    }
    aliases.iter().find_map(|alias| object.get(*alias))
}

fn required_string(
    object: &Map<String, Value>,
    mapped: Option<&str>,
    aliases: &[&str],
    what: &str,
) -> Result<String, AuthError> {
    match probe(object, mapped, aliases).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(AuthError::Detection(format!(
            "no {} field found (tried: {})",
            what,
            attempted(mapped, aliases)
        ))),
    }
}

fn resolve_expiry(
    object: &Map<String, Value>,
    mapped_at: Option<&str>,
    mapped_in: Option<&str>,
) -> Result<u64, AuthError> {
    if let Some(absolute) = probe(object, mapped_at, EXPIRES_AT_ALIASES).and_then(as_seconds) {
        return Ok(absolute);
    }

    if let Some(relative) = probe(object, mapped_in, EXPIRES_IN_ALIASES).and_then(as_seconds) {
        return Ok(unix_now().saturating_add(relative));
    }

    Err(AuthError::Detection(format!(
        "no expiry field found (tried absolute: {}; relative: {})",
        attempted(mapped_at, EXPIRES_AT_ALIASES),
        attempted(mapped_in, EXPIRES_IN_ALIASES)
    )))
}

/// Interpret a JSON value as a seconds count; numeric strings are accepted
fn as_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn attempted(mapped: Option<&str>, aliases: &[&str]) -> String {
    match mapped {
        Some(name) => format!("custom `{}`, {}", name, aliases.join(", ")),
        None => aliases.join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mapping_overrides_default_aliases() {
        let body = json!({"token": "a", "refresh": "b", "exp": 5, "type": "JWT"});
        let mapping = FieldMapping {
            access_token: Some("token".to_string()),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some("exp".to_string()),
            token_type: Some("type".to_string()),
            ..Default::default()
        };

        let bundle = detect(&body, Some(&mapping)).unwrap();
        assert_eq!(bundle.access_token, "a");
        assert_eq!(bundle.refresh_token, "b");
        assert_eq!(bundle.access_expires_at, 5);
        assert_eq!(bundle.token_type, "JWT");
        assert!(bundle.session_payload.is_none());
    }

    #[test]
    fn probes_conventional_aliases_in_order() {
        let body = json!({
            "jwt": "from-jwt",
            "access_token": "from-access-token",
            "refresh_token": "r",
            "expires_at": 99,
        });

        // access_token precedes jwt in the alias order
        let bundle = detect(&body, None).unwrap();
        assert_eq!(bundle.access_token, "from-access-token");
    }

    #[test]
    fn relative_expiry_is_added_to_current_time() {
        let body = json!({"access_token": "a", "refresh_token": "b", "expires_in": 1799});
        let before = unix_now();
        let bundle = detect(&body, None).unwrap();
        let after = unix_now();

        assert!(bundle.access_expires_at >= before + 1799);
        assert!(bundle.access_expires_at <= after + 1799 + 1);
    }

    #[test]
    fn huge_relative_expiry_saturates_instead_of_panicking() {
        let body = json!({
            "access_token": "a",
            "refresh_token": "b",
            "expires_in": u64::MAX,
            "refresh_expires_in": u64::MAX,
        });
        let bundle = detect(&body, None).unwrap();
        assert_eq!(bundle.access_expires_at, u64::MAX);
        assert_eq!(bundle.refresh_expires_at, Some(u64::MAX));
    }

    #[test]
    fn absolute_expiry_wins_over_relative() {
        let body = json!({
            "access_token": "a",
            "refresh_token": "b",
            "expires_at": 12345,
            "expires_in": 3600,
        });
        assert_eq!(detect(&body, None).unwrap().access_expires_at, 12345);
    }

    #[test]
    fn numeric_string_expiry_is_accepted() {
        let body = json!({"access_token": "a", "refresh_token": "b", "expires_at": "12345"});
        assert_eq!(detect(&body, None).unwrap().access_expires_at, 12345);
    }

    #[test]
    fn missing_access_token_names_attempted_aliases() {
        let body = json!({"refresh_token": "b", "expires_in": 60});
        let err = detect(&body, None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("access token"));
        assert!(message.contains("access_token"));
        assert!(message.contains("idToken"));
    }

    #[test]
    fn missing_expiry_is_an_error() {
        let body = json!({"access_token": "a", "refresh_token": "b"});
        assert!(detect(&body, None).is_err());
    }

    #[test]
    fn empty_token_is_rejected() {
        let body = json!({"access_token": "", "refresh_token": "b", "expires_in": 60});
        assert!(detect(&body, None).is_err());
    }

    #[test]
    fn token_type_defaults_to_bearer() {
        let body = json!({"access_token": "a", "refresh_token": "b", "expires_in": 60});
        assert_eq!(detect(&body, None).unwrap().token_type, "Bearer");
    }

    #[test]
    fn session_payload_is_picked_up_from_user_field() {
        let body = json!({
            "access_token": "a",
            "refresh_token": "b",
            "expires_in": 60,
            "user": {"id": 7},
        });
        let bundle = detect(&body, None).unwrap();
        assert_eq!(bundle.session_payload, Some(json!({"id": 7})));
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(detect(&json!("nope"), None).is_err());
        assert!(detect(&json!([1, 2]), None).is_err());
    }

    #[test]
    fn jwt_decode_returns_payload() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"42","role":"admin"}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{}.signature", payload);

        let decoded = decode_jwt_payload(&token).unwrap();
        assert_eq!(decoded["sub"], "42");
        assert_eq!(decoded["role"], "admin");
    }

    #[test]
    fn jwt_decode_never_errors_on_garbage() {
        assert!(decode_jwt_payload("not-a-jwt").is_none());
        assert!(decode_jwt_payload("a.b").is_none());
        assert!(decode_jwt_payload("a.b.c.d").is_none());
        assert!(decode_jwt_payload("x.!!!.y").is_none());
        assert!(decode_jwt_payload("").is_none());

        // Valid base64 but not JSON
        let not_json = URL_SAFE_NO_PAD.encode(b"plain text");
        assert!(decode_jwt_payload(&format!("h.{}.s", not_json)).is_none());
    }
}
