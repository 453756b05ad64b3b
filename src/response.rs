use axum::{
    response::{IntoResponse, Response},
    Json,
};
use hyper::{
    header::{self, HeaderValue},
    StatusCode,
};
use serde_json::json;

use crate::error::Rejection;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResponseType {
    Json,
    Text,
}

impl Default for ResponseType {
    fn default() -> Self {
        Self::Json
    }
}

impl ResponseType {
    /// Picks the format from the first media range of the header, parameters ignored.
    pub fn from_accept(accept_header: Option<&HeaderValue>) -> Self {
        let media_type = accept_header
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split(',').next())
            .and_then(|range| range.split(';').next())
            .map(str::trim);
        match media_type {
            Some(t) if t.eq_ignore_ascii_case("text/plain") => ResponseType::Text,
            _ => ResponseType::Json,
        }
    }
}

/// Default rejection response, in the format asked by the `Accept` header.
pub fn error_response(accept_header: Option<&HeaderValue>, rejection: Rejection) -> Response {
    let code = rejection.status_code();
    let mut response = match ResponseType::from_accept(accept_header) {
        ResponseType::Text => (code, rejection.to_string()).into_response(),
        ResponseType::Json => (
            code,
            Json(json!({
                "success": false,
                "error": rejection.to_string(),
            })),
        )
            .into_response(),
    };
    if code == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
    }
    response
}
