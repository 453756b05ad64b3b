use axum::body::{Body, Bytes};
use hyper::{
    header::AsHeaderName,
    http::{request::Parts, HeaderMap},
    Method, Request, Uri,
};

/// An inbound request as seen by the credential lookup and the error callback.
///
/// The body holds the buffered request body, or is empty when the body was left
/// streaming because no user search is configured.
#[derive(Debug)]
pub struct AuthRequest {
    parts: Parts,
    body: Bytes,
}

impl AuthRequest {
    pub fn new(req: Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self { parts, body }
    }

    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self { parts, body }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn header_str<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.parts.headers.get(name)?.to_str().ok()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Rebuilds the request around `body` so it can continue down the pipeline.
    pub fn into_request(self, body: Body) -> Request<Body> {
        Request::from_parts(self.parts, body)
    }
}
