//! Cookie-backed persistence of the token record

use crate::context::{CookieOptions, RequestContext, SameSite};
use crate::types::TokenBundle;

/// Suffix of the access token cookie
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// Suffix of the refresh token cookie
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
/// Suffix of the absolute expiry cookie
pub const EXPIRES_AT_COOKIE: &str = "expires_at";
/// Suffix of the last-refresh timestamp cookie
pub const LAST_REFRESH_COOKIE: &str = "last_refresh";

/// Refresh token cookie lifetime when the server reports no refresh expiry
const DEFAULT_REFRESH_TTL: u64 = 7 * 24 * 60 * 60;

/// Naming and security attributes for the persisted token cookies.
///
/// The prefix lets multiple independent token managers share one context
/// namespace without clobbering each other.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Prefix applied to all four cookie names
    pub prefix: String,

    /// Cookie domain
    pub domain: Option<String>,

    /// Cookie path
    pub path: String,

    /// Whether cookies are marked Secure
    pub secure: bool,

    /// SameSite attribute
    pub same_site: SameSite,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            prefix: "tg_".to_string(),
            domain: None,
            path: "/".to_string(),
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}

impl CookieConfig {
    /// Set the cookie name prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Set the cookie domain
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    /// Set whether cookies are marked Secure
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the SameSite attribute
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Full cookie name for the given suffix
    pub fn name(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    fn options(&self, max_age: u64) -> CookieOptions {
        CookieOptions {
            max_age: Some(max_age),
            path: self.path.clone(),
            domain: self.domain.clone(),
            secure: self.secure,
            http_only: true,
            same_site: self.same_site,
        }
    }
}

/// The persisted token record as read back from the context.
///
/// `retrieve_tokens` only returns a record when access token, refresh token
/// and expiry are all present and well-formed; anything less is "no session."
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    /// The stored access token
    pub access_token: String,

    /// The stored refresh token
    pub refresh_token: String,

    /// Absolute access token expiry in Unix seconds
    pub expires_at: u64,

    /// When the tokens were last refreshed, if known
    pub last_refresh_at: Option<u64>,
}

/// Persist all four values of a validated bundle.
///
/// Access cookie lifetime is the remaining validity floored at zero; the
/// refresh cookie falls back to a 7 day lifetime when the server reports no
/// refresh expiry.
pub fn store_tokens(
    ctx: &dyn RequestContext,
    cookie: &CookieConfig,
    bundle: &TokenBundle,
    now: u64,
) {
    let access_ttl = bundle.access_expires_at.saturating_sub(now);
    let refresh_ttl = bundle
        .refresh_expires_at
        .map(|at| at.saturating_sub(now))
        .unwrap_or(DEFAULT_REFRESH_TTL);

    ctx.set(
        &cookie.name(ACCESS_TOKEN_COOKIE),
        &bundle.access_token,
        &cookie.options(access_ttl),
    );
    ctx.set(
        &cookie.name(REFRESH_TOKEN_COOKIE),
        &bundle.refresh_token,
        &cookie.options(refresh_ttl),
    );
    ctx.set(
        &cookie.name(EXPIRES_AT_COOKIE),
        &bundle.access_expires_at.to_string(),
        &cookie.options(refresh_ttl),
    );
    ctx.set(
        &cookie.name(LAST_REFRESH_COOKIE),
        &now.to_string(),
        &cookie.options(refresh_ttl),
    );
}

/// Read the persisted record, or `None` when any required value is missing
/// or unparseable
pub fn retrieve_tokens(ctx: &dyn RequestContext, cookie: &CookieConfig) -> Option<TokenRecord> {
    let access_token = ctx.get(&cookie.name(ACCESS_TOKEN_COOKIE))?;
    let refresh_token = ctx.get(&cookie.name(REFRESH_TOKEN_COOKIE))?;
    let expires_at = ctx
        .get(&cookie.name(EXPIRES_AT_COOKIE))?
        .parse::<u64>()
        .ok()?;
    let last_refresh_at = ctx
        .get(&cookie.name(LAST_REFRESH_COOKIE))
        .and_then(|v| v.parse::<u64>().ok());

    Some(TokenRecord {
        access_token,
        refresh_token,
        expires_at,
        last_refresh_at,
    })
}

/// Delete all four persisted values
pub fn clear_tokens(ctx: &dyn RequestContext, cookie: &CookieConfig) {
    let options = cookie.options(0);
    ctx.delete(&cookie.name(ACCESS_TOKEN_COOKIE), &options);
    ctx.delete(&cookie.name(REFRESH_TOKEN_COOKIE), &options);
    ctx.delete(&cookie.name(EXPIRES_AT_COOKIE), &options);
    ctx.delete(&cookie.name(LAST_REFRESH_COOKIE), &options);
}
