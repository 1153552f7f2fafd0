//! tokengate — client-side session and token lifecycle management
//!
//! Given an HTTP API protected by short-lived access tokens and longer-lived
//! refresh tokens, this crate keeps a caller's access token valid, persists
//! tokens in a per-request cookie-like store, and serializes concurrent
//! refresh attempts so that many simultaneous requests under an expired
//! token trigger exactly one upstream refresh call.
//!
//! The entry point is [`TokenManager`]: call [`TokenManager::ensure`] before
//! dispatching a protected request and it returns a valid [`Session`]
//! (refreshing if due), or `None` when the caller is not authenticated.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::{json, Map};
//! use tokengate::{ManagerConfig, MemoryContext, TokenManager};
//!
//! # async fn run() -> Result<(), tokengate::AuthError> {
//! let config = ManagerConfig::new("https://api.example.com")
//!     .with_login_path("/auth/login")
//!     .with_refresh_path("/auth/refresh");
//! let manager = TokenManager::new(config)?;
//!
//! let ctx = MemoryContext::new();
//! let mut credentials = Map::new();
//! credentials.insert("username".to_string(), json!("admin"));
//! credentials.insert("password".to_string(), json!("secret"));
//! manager.login(&ctx, credentials, None).await?;
//!
//! if let Some(session) = manager.ensure(&ctx, None, false).await? {
//!     println!("authorized as {}", session.access_token);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod detect;
pub mod error;
pub mod manager;
pub mod policy;
pub mod single_flight;
pub mod store;
pub mod types;

pub use config::{ContentType, ManagerConfig};
pub use context::{CookieOptions, MemoryContext, RequestContext, SameSite};
pub use detect::{decode_jwt_payload, detect, FieldMapping};
pub use error::AuthError;
pub use manager::TokenManager;
pub use policy::{parse_duration, RefreshPolicy};
pub use single_flight::SingleFlight;
pub use store::{CookieConfig, TokenRecord};
pub use types::{LoginResponse, RequestOverrides, Session, TokenBundle};

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::ManagerConfig;
    pub use crate::context::{MemoryContext, RequestContext};
    pub use crate::error::AuthError;
    pub use crate::manager::TokenManager;
    pub use crate::policy::RefreshPolicy;
    pub use crate::types::{Session, TokenBundle};
}
