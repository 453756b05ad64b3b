use std::{fmt, sync::Arc};

use axum::{body::Body, middleware::Next, response::Response};
use futures::{future::BoxFuture, FutureExt};
use hyper::Request;
use thiserror::Error;

use crate::{
    credentials::{self, Credentials},
    directory::{Connector, Ldap3Connector},
    error::{Error, Rejection},
    request::AuthRequest,
};

/// Literal replaced by the escaped username in [`Config::search_filter`].
pub const USERNAME_PLACEHOLDER: &str = "{{username}}";

/// Default cap on the request body read while looking for credentials.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

pub type SkipPredicate = Arc<dyn Fn(&Request<Body>) -> bool + Send + Sync>;
pub type CredentialsLookup =
    Arc<dyn Fn(&AuthRequest, &str, &str) -> Result<Credentials, Error> + Send + Sync>;
pub type SuccessCallback =
    Arc<dyn Fn(Request<Body>, Next<Body>) -> BoxFuture<'static, Response> + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&AuthRequest, Rejection) -> Response + Send + Sync>;

#[derive(Clone, Debug, Default)]
pub struct TlsOptions {
    /// Accept any certificate presented by the directory server.
    pub no_verify: bool,
}

/// Middleware settings, built once and shared read-only by every request.
#[derive(Clone)]
pub struct Config {
    /// Directory server URL, e.g. `ldap://localhost:389` or `ldaps://localhost:636`.
    pub url: String,
    /// Upgrade the connection with StartTLS before binding.
    pub tls: Option<TlsOptions>,
    /// Service account DN. May be empty for an anonymous bind when the server allows it.
    pub bind_dn: String,
    /// Service account password. An empty string performs an unauthenticated bind.
    pub bind_credentials: String,
    /// Base DN of the user search. Leaving both this and `search_filter` empty
    /// limits the check to the service bind.
    pub search_base: String,
    /// Search filter template, e.g. `(uid={{username}})`.
    pub search_filter: String,
    pub search_attributes: Vec<String>,
    pub username_field: String,
    pub password_field: String,
    /// Largest request body buffered for the credential lookup. Bodies are only
    /// read when a user search is configured, larger ones are rejected.
    pub body_limit: usize,
    /// Bypasses authentication entirely for the requests it matches.
    pub skip: Option<SkipPredicate>,
    /// Locates the credentials in a request. Defaults to [`credentials::lookup`].
    pub credentials_lookup: CredentialsLookup,
    /// Called once a request is authenticated. Defaults to running the next handler.
    /// Must not be `None`.
    pub on_success: Option<SuccessCallback>,
    /// Called with every rejection. Defaults to an error response negotiated on `Accept`.
    pub on_error: Option<ErrorCallback>,
    pub connector: Arc<dyn Connector>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            tls: None,
            bind_dn: String::new(),
            bind_credentials: String::new(),
            search_base: String::new(),
            search_filter: String::new(),
            search_attributes: vec!["dn".to_owned(), "dc".to_owned()],
            username_field: "username".to_owned(),
            password_field: "password".to_owned(),
            body_limit: DEFAULT_BODY_LIMIT,
            skip: None,
            credentials_lookup: Arc::new(credentials::lookup),
            on_success: Some(Arc::new(|req: Request<Body>, next: Next<Body>| {
                next.run(req).boxed()
            })),
            on_error: None,
            connector: Arc::new(Ldap3Connector::new()),
        }
    }
}

impl Config {
    pub fn skip_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Request<Body>) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(predicate));
        self
    }

    pub fn credentials_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&AuthRequest, &str, &str) -> Result<Credentials, Error> + Send + Sync + 'static,
    {
        self.credentials_lookup = Arc::new(lookup);
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(Request<Body>, Next<Body>) -> BoxFuture<'static, Response> + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AuthRequest, Rejection) -> Response + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn connector<C: Connector + 'static>(mut self, connector: C) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Whether the user search and user bind follow the service bind.
    pub fn searches(&self) -> bool {
        !self.search_base.is_empty() || !self.search_filter.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        if self.on_success.is_none() {
            return Err(ConfigError::MissingSuccessCallback);
        }
        if self.search_base.is_empty() != self.search_filter.is_empty() {
            return Err(ConfigError::IncompleteSearch);
        }
        if self.searches() && !self.search_filter.contains(USERNAME_PLACEHOLDER) {
            log::warn!(
                "Search filter {} does not contain {}, every user will match the same entries",
                self.search_filter,
                USERNAME_PLACEHOLDER
            );
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("tls", &self.tls)
            .field("bind_dn", &self.bind_dn)
            .field("bind_credentials", &"<redacted>")
            .field("search_base", &self.search_base)
            .field("search_filter", &self.search_filter)
            .field("search_attributes", &self.search_attributes)
            .field("username_field", &self.username_field)
            .field("password_field", &self.password_field)
            .field("body_limit", &self.body_limit)
            .field("skip", &self.skip.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing directory url")]
    MissingUrl,
    #[error("missing success callback")]
    MissingSuccessCallback,
    #[error("search base and search filter must be set together")]
    IncompleteSearch,
}
