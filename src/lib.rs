//! LDAP bind authentication middleware for axum.
//!
//! Every request is checked against a directory server: the service account binds
//! first, then, when a search base and filter are configured, the user is looked up
//! by username and must bind with their own password.
//!
//! ```no_run
//! use axum::{middleware::from_fn, routing::get, Router};
//! use ldapauth::Config;
//!
//! # fn app() -> Result<Router, ldapauth::ConfigError> {
//! let auth = ldapauth::middleware(Config {
//!     url: "ldap://ldap.forumsys.com:389".to_owned(),
//!     bind_dn: "cn=read-only-admin,dc=example,dc=com".to_owned(),
//!     bind_credentials: "password".to_owned(),
//!     search_base: "dc=example,dc=com".to_owned(),
//!     search_filter: "(&(objectClass=organizationalPerson)(uid={{username}}))".to_owned(),
//!     ..Default::default()
//! })?;
//!
//! Ok(Router::new()
//!     .route("/", get(|| async { "Hello, World!" }))
//!     .layer(from_fn(auth)))
//! # }
//! ```

pub use config::{
    Config, ConfigError, CredentialsLookup, ErrorCallback, SkipPredicate, SuccessCallback,
    TlsOptions, DEFAULT_BODY_LIMIT, USERNAME_PLACEHOLDER,
};
pub use credentials::{lookup as default_credentials_lookup, Credentials};
pub use error::{Error, Rejection};
pub use middleware::{middleware, Identity, LdapAuth, Verdict};
pub use request::AuthRequest;
pub use response::{error_response, ResponseType};

mod config;
mod credentials;
pub mod directory;
mod error;
mod middleware;
mod request;
mod response;
