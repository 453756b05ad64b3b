use std::{collections::HashMap, sync::Arc};

use axum::{
    body::{Body, Bytes},
    middleware::Next,
    response::Response,
};
use futures::{future::BoxFuture, FutureExt};
use http_body::{LengthLimitError, Limited};
use hyper::{header, http::request::Parts, Request};

use crate::{
    config::{Config, ConfigError, SuccessCallback, USERNAME_PLACEHOLDER},
    directory::{escape_filter, Entry, SearchRequest, Session},
    error::{Error, Rejection},
    request::AuthRequest,
    response::error_response,
};

/// Directory identity of an authenticated request, available as a request extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl From<Entry> for Identity {
    fn from(entry: Entry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attributes,
        }
    }
}

#[derive(Debug)]
pub enum Verdict {
    Authenticated(Identity),
    Rejected(Error),
}

/// LDAP bind authentication, cheap to clone and shared by every request.
#[derive(Clone)]
pub struct LdapAuth {
    config: Arc<Config>,
    on_success: SuccessCallback,
}

impl LdapAuth {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let on_success = config
            .on_success
            .clone()
            .ok_or(ConfigError::MissingSuccessCallback)?;
        Ok(Self {
            config: Arc::new(config),
            on_success,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn handle(&self, req: Request<Body>, next: Next<Body>) -> Response {
        if let Some(skip) = &self.config.skip {
            if skip(&req) {
                log::debug!("Skipping authentication for {}", req.uri().path());
                return next.run(req).await;
            }
        }

        // Only the user search reads credentials, the body streams through otherwise.
        let (parts, body) = req.into_parts();
        let (req, body) = if self.config.searches() {
            match self.read_body(&parts, body).await {
                Ok(bytes) => (AuthRequest::from_parts(parts, bytes.clone()), Body::from(bytes)),
                Err(err) => return self.fail(&AuthRequest::from_parts(parts, Bytes::new()), err),
            }
        } else {
            (AuthRequest::from_parts(parts, Bytes::new()), body)
        };

        match self.verify(&req).await {
            Verdict::Authenticated(identity) => {
                let mut req = req.into_request(body);
                req.extensions_mut().insert(identity);
                (self.on_success)(req, next).await
            }
            Verdict::Rejected(err) => self.fail(&req, err),
        }
    }

    async fn read_body(&self, parts: &Parts, body: Body) -> Result<Bytes, Error> {
        let limit = self.config.body_limit;
        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if matches!(declared, Some(length) if length > limit as u64) {
            return Err(Error::BodyTooLarge(limit));
        }

        hyper::body::to_bytes(Limited::new(body, limit))
            .await
            .map_err(|err| match err.downcast_ref::<LengthLimitError>() {
                Some(_) => Error::BodyTooLarge(limit),
                None => Error::Body(err.to_string()),
            })
    }

    fn fail(&self, req: &AuthRequest, err: Error) -> Response {
        let rejection = err.classify();
        match rejection {
            Rejection::Unauthorized(_) | Rejection::PayloadTooLarge => {
                log::info!("Authentication rejected: {}", err)
            }
            Rejection::Internal => log::error!("Authentication failure: {}", err),
        }
        self.reject(req, rejection)
    }

    /// Runs the bind/search/bind sequence for a request.
    ///
    /// Exactly one directory session is opened, and it is closed before returning
    /// whatever the outcome.
    pub async fn verify(&self, req: &AuthRequest) -> Verdict {
        log::debug!("Connecting to directory {}", self.config.url);
        let mut session = match self.config.connector.dial(&self.config.url).await {
            Ok(session) => session,
            Err(err) => return Verdict::Rejected(Error::Connection(err)),
        };

        let result = self.authenticate(session.as_mut(), req).await;
        session.close().await;

        match result {
            Ok(identity) => Verdict::Authenticated(identity),
            Err(err) => Verdict::Rejected(err),
        }
    }

    async fn authenticate(
        &self,
        session: &mut dyn Session,
        req: &AuthRequest,
    ) -> Result<Identity, Error> {
        let config = &*self.config;

        if let Some(tls) = &config.tls {
            log::debug!("Upgrading directory connection to TLS");
            session.start_tls(tls).await.map_err(Error::Tls)?;
        }

        log::debug!("Binding as service account {}", config.bind_dn);
        let bound = if config.bind_credentials.is_empty() {
            session.unauthenticated_bind(&config.bind_dn).await
        } else {
            session.bind(&config.bind_dn, &config.bind_credentials).await
        };
        bound.map_err(Error::Bind)?;

        if !config.searches() {
            return Ok(Identity {
                dn: config.bind_dn.clone(),
                attributes: HashMap::new(),
            });
        }

        let credentials =
            (config.credentials_lookup)(req, &config.username_field, &config.password_field)?;
        // An empty password would turn the user bind into an unauthenticated one.
        if credentials.password.is_empty() {
            return Err(Error::EmptyPassword);
        }
        let filter = config
            .search_filter
            .replace(USERNAME_PLACEHOLDER, &escape_filter(&credentials.username));

        log::debug!("Searching user in {}", config.search_base);
        let mut entries = session
            .search(&SearchRequest {
                base: &config.search_base,
                filter: &filter,
                attributes: &config.search_attributes,
            })
            .await
            .map_err(Error::Search)?;
        let entry = match entries.pop() {
            Some(entry) if entries.is_empty() => entry,
            _ => return Err(Error::UserNotFoundOrAmbiguous),
        };

        log::debug!("Binding as located user");
        session
            .bind(&entry.dn, &credentials.password)
            .await
            .map_err(Error::InvalidCredentials)?;

        Ok(Identity::from(entry))
    }
}

/// Builds the per-request handler, to be wrapped with `axum::middleware::from_fn`.
pub fn middleware(
    config: Config,
) -> Result<
    impl Fn(Request<Body>, Next<Body>) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static,
    ConfigError,
> {
    let auth = LdapAuth::new(config)?;
    Ok(move |req: Request<Body>, next: Next<Body>| {
        let auth = auth.clone();
        async move { auth.handle(req, next).await }.boxed()
    })
}
