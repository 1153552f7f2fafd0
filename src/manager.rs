//! The token manager: login, refresh, logout and the `ensure` entry point

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use reqwest::Client;
use serde_json::{Map, Value};
use url::Url;

use crate::config::{ContentType, ManagerConfig};
use crate::context::RequestContext;
use crate::detect::{decode_jwt_payload, detect};
use crate::error::AuthError;
use crate::policy::{self, unix_now};
use crate::single_flight::SingleFlight;
use crate::store::{self, TokenRecord, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::types::{LoginResponse, RequestOverrides, Session, TokenBundle};

/// Orchestrates the token lifecycle against a configured API.
///
/// The manager holds no session state of its own: all tokens live in the
/// per-request [`RequestContext`], and the only cross-call shared structure
/// is the single-flight map keyed by refresh token value, so unrelated
/// sessions never contend. The manager is cheap to clone; clones share the
/// configuration, HTTP client and single-flight map.
#[derive(Clone)]
pub struct TokenManager {
    config: Arc<ManagerConfig>,
    client: Client,
    flights: Arc<SingleFlight<Option<TokenBundle>>>,
}

impl TokenManager {
    /// Create a manager from a configuration.
    ///
    /// Fails immediately on an unparseable base URL rather than deferring to
    /// request time.
    pub fn new(config: ManagerConfig) -> Result<Self, AuthError> {
        Self::with_client(config, Client::new())
    }

    /// Create a manager reusing an existing HTTP client
    pub fn with_client(config: ManagerConfig, client: Client) -> Result<Self, AuthError> {
        Url::parse(&config.base_url)
            .map_err(|e| AuthError::Config(format!("invalid base URL `{}`: {}", config.base_url, e)))?;

        Ok(Self {
            config: Arc::new(config),
            client,
            flights: Arc::new(SingleFlight::new()),
        })
    }

    /// The configuration this manager was built from
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Authenticate with the configured login endpoint and persist the
    /// resulting tokens.
    ///
    /// The request body merges, in increasing priority: configured login
    /// data, per-call override data, then the credentials themselves.
    pub async fn login(
        &self,
        ctx: &dyn RequestContext,
        credentials: Map<String, Value>,
        overrides: Option<RequestOverrides>,
    ) -> Result<LoginResponse, AuthError> {
        let overrides = overrides.unwrap_or_default();

        let mut body = self.config.login_data.clone();
        if let Some(data) = &overrides.data {
            for (key, value) in data {
                body.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in credentials {
            body.insert(key, value);
        }

        let result = self
            .perform_login(ctx, &body, overrides.headers.as_ref())
            .await;

        if let Err(err) = &result {
            if let Some(hook) = &self.config.on_error {
                hook(err, ctx);
            }
        }

        result
    }

    async fn perform_login(
        &self,
        ctx: &dyn RequestContext,
        body: &Map<String, Value>,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<LoginResponse, AuthError> {
        let response = self
            .post("login", &self.config.login_path, body, headers)
            .await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Server {
                status: status.as_u16(),
                body: text,
            });
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| AuthError::transport("login", e))?;

        let bundle = match &self.config.login_parser {
            Some(parser) => parser(&raw)?,
            None => detect(&raw, self.config.field_mapping.as_ref())?,
        };
        bundle.validate()?;

        store::store_tokens(ctx, &self.config.cookie, &bundle, unix_now());
        debug!(
            "login succeeded, access token valid until {}",
            bundle.access_expires_at
        );

        if let Some(hook) = &self.config.on_login {
            hook(&bundle, &raw, ctx)?;
        }

        Ok(LoginResponse {
            data: bundle,
            status: status.as_u16(),
        })
    }

    /// Exchange a refresh token for a new bundle and persist it.
    ///
    /// Returns `Ok(None)` when the server authoritatively rejects the
    /// refresh token (401/403) — the session is over, not an error. Any
    /// other failure is surfaced as an error. Either way the persisted
    /// tokens are cleared: a failed refresh never leaves a half-valid
    /// session behind.
    pub async fn refresh(
        &self,
        ctx: &dyn RequestContext,
        refresh_token: &str,
        overrides: Option<RequestOverrides>,
    ) -> Result<Option<TokenBundle>, AuthError> {
        let outcome = self
            .refresh_request(refresh_token.to_string(), overrides)
            .await;
        self.apply_refresh_outcome(ctx, outcome)
    }

    /// Make sure the caller has a currently valid access token.
    ///
    /// Reads the persisted record and either returns it as-is, refreshes it
    /// (gated by the single-flight map so concurrent calls sharing a refresh
    /// token collapse into one upstream request), or reports `None` for an
    /// unauthenticated or ended session. `force` skips the policy check and
    /// always refreshes.
    pub async fn ensure(
        &self,
        ctx: &dyn RequestContext,
        overrides: Option<RequestOverrides>,
        force: bool,
    ) -> Result<Option<Session>, AuthError> {
        let record = match store::retrieve_tokens(ctx, &self.config.cookie) {
            Some(record) => record,
            None => return Ok(None),
        };

        let now = unix_now();
        let policy = &self.config.policy;

        if force || policy::is_expired(record.expires_at, now, policy) {
            return match self
                .refresh_via_flight(ctx, &record.refresh_token, overrides)
                .await?
            {
                Some(bundle) => Ok(Some(Session::from_bundle(&bundle))),
                None => Ok(None),
            };
        }

        if policy::should_refresh(record.expires_at, now, record.last_refresh_at, policy) {
            match self
                .refresh_via_flight(ctx, &record.refresh_token, overrides)
                .await?
            {
                Some(bundle) => return Ok(Some(Session::from_bundle(&bundle))),
                None => {
                    // A concurrent request may have rotated the tokens while
                    // this one was waiting; trust the freshest read before
                    // declaring the session gone.
                    return match store::retrieve_tokens(ctx, &self.config.cookie) {
                        Some(fresh) => Ok(Some(session_from_record(&fresh))),
                        None => Ok(None),
                    };
                }
            }
        }

        Ok(Some(session_from_record(&record)))
    }

    /// End the session: best-effort call to the configured logout endpoint,
    /// then unconditionally clear the persisted tokens.
    ///
    /// Endpoint failures are logged and swallowed; logout always succeeds
    /// locally.
    pub async fn logout(&self, ctx: &dyn RequestContext) {
        if let Some(path) = &self.config.logout_path {
            if let Some(session) = self.get_session(ctx) {
                let authorization = match &self.config.token_formatter {
                    Some(formatter) => formatter(&session.token_type, &session.access_token),
                    None => format!("{} {}", session.token_type, session.access_token),
                };

                let mut request = self
                    .client
                    .post(self.endpoint(path))
                    .header("Authorization", authorization);
                for (name, value) in &self.config.headers {
                    request = request.header(name, value);
                }
                if let Some(timeout) = self.config.timeout {
                    request = request.timeout(timeout);
                }

                match request.send().await {
                    Ok(response) if !response.status().is_success() => {
                        warn!("logout endpoint returned status {}", response.status());
                    }
                    Err(err) => warn!("logout endpoint call failed: {}", err),
                    Ok(_) => {}
                }
            }
        }

        store::clear_tokens(ctx, &self.config.cookie);
    }

    /// Pure read of the current session; no refresh, no network
    pub fn get_session(&self, ctx: &dyn RequestContext) -> Option<Session> {
        store::retrieve_tokens(ctx, &self.config.cookie).map(|record| session_from_record(&record))
    }

    /// Whether both token values are present in storage (expiry not checked)
    pub fn is_authenticated(&self, ctx: &dyn RequestContext) -> bool {
        let cookie = &self.config.cookie;
        ctx.get(&cookie.name(ACCESS_TOKEN_COOKIE)).is_some()
            && ctx.get(&cookie.name(REFRESH_TOKEN_COOKIE)).is_some()
    }

    /// Run the network refresh through the single-flight map, then apply the
    /// shared outcome to this caller's context.
    ///
    /// Leader and joiners each persist (or clear) in their own context, so
    /// the flight itself stays context-free.
    async fn refresh_via_flight(
        &self,
        ctx: &dyn RequestContext,
        refresh_token: &str,
        overrides: Option<RequestOverrides>,
    ) -> Result<Option<TokenBundle>, AuthError> {
        let key = format!("refresh_{}", refresh_token);
        let this = self.clone();
        let token = refresh_token.to_string();

        let outcome = self
            .flights
            .execute(&key, async move { this.refresh_request(token, overrides).await })
            .await;

        self.apply_refresh_outcome(ctx, outcome)
    }

    /// The context-free network portion of a refresh.
    ///
    /// The request body merges configured refresh data, per-call overrides,
    /// then the refresh token field itself, which always wins.
    async fn refresh_request(
        &self,
        refresh_token: String,
        overrides: Option<RequestOverrides>,
    ) -> Result<Option<TokenBundle>, AuthError> {
        let overrides = overrides.unwrap_or_default();

        let mut body = self.config.refresh_data.clone();
        if let Some(data) = &overrides.data {
            for (key, value) in data {
                body.insert(key.clone(), value.clone());
            }
        }
        body.insert(
            self.config.refresh_field.clone(),
            Value::String(refresh_token),
        );

        let response = self
            .post(
                "refresh",
                &self.config.refresh_path,
                &body,
                overrides.headers.as_ref(),
            )
            .await?;
        let status = response.status();

        if status.as_u16() == 401 || status.as_u16() == 403 {
            debug!("refresh token rejected with status {}", status);
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Server {
                status: status.as_u16(),
                body: text,
            });
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| AuthError::transport("refresh", e))?;

        let bundle = match &self.config.refresh_parser {
            Some(parser) => parser(&raw)?,
            None => detect(&raw, self.config.field_mapping.as_ref())?,
        };
        bundle.validate()?;

        debug!(
            "refresh succeeded, access token valid until {}",
            bundle.access_expires_at
        );
        Ok(Some(bundle))
    }

    /// Persist a successful refresh in this caller's context, or clear the
    /// tokens on invalidation and failure alike
    fn apply_refresh_outcome(
        &self,
        ctx: &dyn RequestContext,
        outcome: Result<Option<TokenBundle>, AuthError>,
    ) -> Result<Option<TokenBundle>, AuthError> {
        match outcome {
            Ok(Some(bundle)) => {
                store::store_tokens(ctx, &self.config.cookie, &bundle, unix_now());
                Ok(Some(bundle))
            }
            Ok(None) => {
                store::clear_tokens(ctx, &self.config.cookie);
                Ok(None)
            }
            Err(err) => {
                store::clear_tokens(ctx, &self.config.cookie);
                Err(err)
            }
        }
    }

    async fn post(
        &self,
        operation: &'static str,
        path: &str,
        body: &Map<String, Value>,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<reqwest::Response, AuthError> {
        let mut request = self.client.post(self.endpoint(path));

        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }
        if let Some(extra) = headers {
            for (name, value) in extra {
                request = request.header(name, value);
            }
        }
        if let Some(timeout) = self.config.timeout {
            request = request.timeout(timeout);
        }

        request = match self.config.content_type {
            ContentType::Json => request.json(body),
            ContentType::Form => request.form(&form_fields(body)),
        };

        request
            .send()
            .await
            .map_err(|e| AuthError::transport(operation, e))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

/// Build the caller-facing session from the persisted record.
///
/// The record does not persist a token type, so this defaults to "Bearer";
/// the payload is a best-effort JWT decode of the stored access token.
fn session_from_record(record: &TokenRecord) -> Session {
    Session {
        access_token: record.access_token.clone(),
        expires_at: record.expires_at,
        token_type: "Bearer".to_string(),
        payload: decode_jwt_payload(&record.access_token),
    }
}

/// Flatten a JSON body into form fields; string values are sent verbatim,
/// everything else as its JSON representation
fn form_fields(body: &Map<String, Value>) -> HashMap<String, String> {
    body.iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}
