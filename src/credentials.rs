//! Default credential lookup.
//!
//! Sources are tried in order, the first complete pair wins:
//!
//! 1. query string parameters named after the configured fields,
//! 2. a form or JSON body, always read from the `username` and `password` keys
//!    whatever the configured field names are,
//! 3. request headers named after the configured fields,
//! 4. the `Authorization` header.

use std::fmt;

use hyper::header;
use serde::Deserialize;

use crate::{error::Error, request::AuthRequest};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn complete(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some(Self::new(u, p)),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub fn lookup(
    req: &AuthRequest,
    username_field: &str,
    password_field: &str,
) -> Result<Credentials, Error> {
    from_query(req, username_field, password_field)
        .or_else(|| from_body(req))
        .or_else(|| from_headers(req, username_field, password_field))
        .or_else(|| from_authorization(req))
        .ok_or(Error::MissingCredentials)
}

fn from_query(req: &AuthRequest, username_field: &str, password_field: &str) -> Option<Credentials> {
    let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(req.uri().query()?).ok()?;
    let field = |name: &str| {
        pairs
            .iter()
            .find_map(|(k, v)| (k == name).then(|| v.as_str()))
    };
    Credentials::complete(field(username_field), field(password_field))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct BodyCredentials {
    username: String,
    password: String,
}

fn from_body(req: &AuthRequest) -> Option<Credentials> {
    if req.body().is_empty() {
        return None;
    }

    let content_type = req.header_str(header::CONTENT_TYPE)?;
    let mime = content_type.split(';').next()?.trim();
    let parsed = if mime.eq_ignore_ascii_case("application/json") {
        serde_json::from_slice::<BodyCredentials>(req.body()).map_err(|e| e.to_string())
    } else if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        serde_urlencoded::from_bytes::<BodyCredentials>(req.body()).map_err(|e| e.to_string())
    } else {
        return None;
    };

    match parsed {
        Ok(body) => Credentials::complete(Some(&body.username), Some(&body.password)),
        Err(err) => {
            log::debug!("Ignoring unparsable request body: {}", err);
            None
        }
    }
}

fn from_headers(
    req: &AuthRequest,
    username_field: &str,
    password_field: &str,
) -> Option<Credentials> {
    Credentials::complete(req.header_str(username_field), req.header_str(password_field))
}

fn from_authorization(req: &AuthRequest) -> Option<Credentials> {
    let header = req.header_str(header::AUTHORIZATION)?;
    encoded_scheme(header).or_else(|| basic(header))
}

// Whole header value is the base64 encoding of "Basic username:password".
fn encoded_scheme(header: &str) -> Option<Credentials> {
    let decoded = decode(header)?;
    let (_, rest) = decoded.split_once("Basic")?;
    split_pair(rest.strip_prefix(' ').unwrap_or(rest))
}

// RFC 7617: "Basic " followed by the base64 encoding of "username:password".
fn basic(header: &str) -> Option<Credentials> {
    let encoded = header.strip_prefix("Basic ")?;
    split_pair(&decode(encoded.trim())?)
}

fn decode(encoded: &str) -> Option<String> {
    base64::decode(encoded)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
}

fn split_pair(decoded: &str) -> Option<Credentials> {
    let [username, password]: [&str; 2] = decoded.split(':').collect::<Vec<_>>().try_into().ok()?;
    Some(Credentials::new(username, password))
}
