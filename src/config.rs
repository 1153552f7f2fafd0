//! Configuration for the token manager

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::detect::FieldMapping;
use crate::error::AuthError;
use crate::policy::RefreshPolicy;
use crate::store::CookieConfig;
use crate::types::TokenBundle;

/// How request bodies are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// `application/json`
    Json,
    /// `application/x-www-form-urlencoded`
    Form,
}

/// Custom parser turning a raw response body into a token bundle
pub type ResponseParser = Arc<dyn Fn(&Value) -> Result<TokenBundle, AuthError> + Send + Sync>;

/// Hook invoked after a successful login; errors propagate to the caller
pub type LoginHook =
    Arc<dyn Fn(&TokenBundle, &Value, &dyn RequestContext) -> Result<(), AuthError> + Send + Sync>;

/// Observer invoked when a login attempt fails
pub type ErrorHook = Arc<dyn Fn(&AuthError, &dyn RequestContext) + Send + Sync>;

/// Custom formatter building the Authorization header value from
/// `(token_type, access_token)`
pub type TokenFormatter = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

/// Configuration for a [`TokenManager`](crate::manager::TokenManager).
///
/// Constructed once and passed into the manager; there is no ambient global
/// configuration. Build with [`ManagerConfig::new`] and chain `with_*`
/// setters.
#[derive(Clone)]
pub struct ManagerConfig {
    /// Base URL of the API, e.g. `https://api.example.com`
    pub base_url: String,

    /// Path of the login endpoint
    pub login_path: String,

    /// Path of the refresh endpoint
    pub refresh_path: String,

    /// Path of the logout endpoint; logout is local-only when absent
    pub logout_path: Option<String>,

    /// Body encoding for login/refresh requests
    pub content_type: ContentType,

    /// Static body fields merged into every login request (lowest priority)
    pub login_data: Map<String, Value>,

    /// Static body fields merged into every refresh request (lowest priority)
    pub refresh_data: Map<String, Value>,

    /// Static headers sent with every login/refresh/logout request
    pub headers: HashMap<String, String>,

    /// Custom field names for response detection
    pub field_mapping: Option<FieldMapping>,

    /// Custom parser for login responses, replacing field detection
    pub login_parser: Option<ResponseParser>,

    /// Custom parser for refresh responses, replacing field detection
    pub refresh_parser: Option<ResponseParser>,

    /// Custom Authorization header formatter
    pub token_formatter: Option<TokenFormatter>,

    /// Body field carrying the refresh token on refresh requests
    pub refresh_field: String,

    /// Refresh policy thresholds
    pub policy: RefreshPolicy,

    /// Cookie naming and security attributes
    pub cookie: CookieConfig,

    /// Per-call timeout for the HTTP requests issued by this engine
    pub timeout: Option<Duration>,

    /// Hook invoked after a successful login
    pub on_login: Option<LoginHook>,

    /// Observer invoked when a login attempt fails
    pub on_error: Option<ErrorHook>,
}

impl ManagerConfig {
    /// Create a configuration with defaults for the given base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            login_path: "/auth/login".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            logout_path: None,
            content_type: ContentType::Json,
            login_data: Map::new(),
            refresh_data: Map::new(),
            headers: HashMap::new(),
            field_mapping: None,
            login_parser: None,
            refresh_parser: None,
            token_formatter: None,
            refresh_field: "refresh_token".to_string(),
            policy: RefreshPolicy::default(),
            cookie: CookieConfig::default(),
            timeout: Some(Duration::from_secs(30)),
            on_login: None,
            on_error: None,
        }
    }

    /// Set the login endpoint path
    pub fn with_login_path(mut self, path: &str) -> Self {
        self.login_path = normalize_path(path);
        self
    }

    /// Set the refresh endpoint path
    pub fn with_refresh_path(mut self, path: &str) -> Self {
        self.refresh_path = normalize_path(path);
        self
    }

    /// Set the logout endpoint path
    pub fn with_logout_path(mut self, path: &str) -> Self {
        self.logout_path = Some(normalize_path(path));
        self
    }

    /// Set the request body encoding
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Set static body fields for login requests
    pub fn with_login_data(mut self, data: Map<String, Value>) -> Self {
        self.login_data = data;
        self
    }

    /// Set static body fields for refresh requests
    pub fn with_refresh_data(mut self, data: Map<String, Value>) -> Self {
        self.refresh_data = data;
        self
    }

    /// Add a static header sent with every request
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Set custom field names for response detection
    pub fn with_field_mapping(mut self, mapping: FieldMapping) -> Self {
        self.field_mapping = Some(mapping);
        self
    }

    /// Replace field detection for login responses with a custom parser
    pub fn with_login_parser(mut self, parser: ResponseParser) -> Self {
        self.login_parser = Some(parser);
        self
    }

    /// Replace field detection for refresh responses with a custom parser
    pub fn with_refresh_parser(mut self, parser: ResponseParser) -> Self {
        self.refresh_parser = Some(parser);
        self
    }

    /// Set a custom Authorization header formatter
    pub fn with_token_formatter(mut self, formatter: TokenFormatter) -> Self {
        self.token_formatter = Some(formatter);
        self
    }

    /// Set the body field carrying the refresh token
    pub fn with_refresh_field(mut self, field: &str) -> Self {
        self.refresh_field = field.to_string();
        self
    }

    /// Set the refresh policy
    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set cookie naming and security attributes
    pub fn with_cookie(mut self, cookie: CookieConfig) -> Self {
        self.cookie = cookie;
        self
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the post-login hook
    pub fn with_on_login(mut self, hook: LoginHook) -> Self {
        self.on_login = Some(hook);
        self
    }

    /// Set the login failure observer
    pub fn with_on_error(mut self, hook: ErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }
}

/// Endpoint paths are joined onto the base URL by concatenation, so they
/// must carry a leading slash
fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("base_url", &self.base_url)
            .field("login_path", &self.login_path)
            .field("refresh_path", &self.refresh_path)
            .field("logout_path", &self.logout_path)
            .field("content_type", &self.content_type)
            .field("refresh_field", &self.refresh_field)
            .field("policy", &self.policy)
            .field("cookie", &self.cookie)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
