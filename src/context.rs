//! Per-request context: the cookie-like key-value store the engine
//! persists tokens into

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// SameSite attribute for stored cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// Sent on same-site requests and top-level navigations
    Lax,
    /// Sent on same-site requests only
    Strict,
    /// Sent on all requests (requires Secure)
    None,
}

impl SameSite {
    /// The attribute value as it appears in a Set-Cookie header
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        }
    }
}

/// Attributes applied when writing or deleting a stored value
#[derive(Debug, Clone)]
pub struct CookieOptions {
    /// Lifetime in seconds; `None` means session-scoped
    pub max_age: Option<u64>,

    /// Cookie path
    pub path: String,

    /// Cookie domain
    pub domain: Option<String>,

    /// Whether the value is only sent over HTTPS
    pub secure: bool,

    /// Whether the value is hidden from client-side scripts
    pub http_only: bool,

    /// SameSite attribute
    pub same_site: SameSite,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            max_age: None,
            path: "/".to_string(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

/// The per-request storage collaborator.
///
/// One implementation per host framework: an HTTP server adapter maps this
/// onto request/response cookies, while [`MemoryContext`] backs tests and
/// non-HTTP embeddings. A context is scoped to one logical request;
/// concurrent requests for different end users must use different context
/// instances.
pub trait RequestContext: Send + Sync {
    /// Read a named value
    fn get(&self, name: &str) -> Option<String>;

    /// Write a named value with the given attributes
    fn set(&self, name: &str, value: &str, options: &CookieOptions);

    /// Delete a named value
    fn delete(&self, name: &str, options: &CookieOptions);
}

/// In-memory [`RequestContext`] backed by a shared map.
///
/// Clones share the same underlying storage, so a cloned context models
/// concurrent operations within one logical request.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestContext for MemoryContext {
    fn get(&self, name: &str) -> Option<String> {
        self.values.lock().unwrap().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str, options: &CookieOptions) {
        if options.max_age == Some(0) {
            self.values.lock().unwrap().remove(name);
            return;
        }
        self.values
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    fn delete(&self, name: &str, _options: &CookieOptions) {
        self.values.lock().unwrap().remove(name);
    }
}
