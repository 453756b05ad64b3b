use axum::response::{IntoResponse, Response};
use hyper::StatusCode;
use serde::{ser::SerializeStruct, Serialize, Serializer};
use thiserror::Error;

use crate::{
    directory::{result_code, DirectoryError},
    response::error_response,
};

/// Reasons an authentication attempt fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("request body larger than {0} bytes")]
    BodyTooLarge(usize),
    #[error("cannot read request body: {0}")]
    Body(String),
    #[error("cannot connect to directory: {0}")]
    Connection(DirectoryError),
    #[error("cannot start TLS with directory: {0}")]
    Tls(DirectoryError),
    #[error("service bind failure: {0}")]
    Bind(DirectoryError),
    #[error("user search failure: {0}")]
    Search(DirectoryError),
    #[error("user does not exist or too many entries returned")]
    UserNotFoundOrAmbiguous,
    #[error("empty password not allowed")]
    EmptyPassword,
    #[error("invalid user credentials: {0}")]
    InvalidCredentials(DirectoryError),
}

impl Error {
    pub fn directory_error(&self) -> Option<&DirectoryError> {
        use Error::*;
        match self {
            Connection(err) | Tls(err) | Bind(err) | Search(err) | InvalidCredentials(err) => {
                Some(err)
            }
            MissingCredentials | BodyTooLarge(_) | Body(_) | UserNotFoundOrAmbiguous
            | EmptyPassword => None,
        }
    }

    /// Maps the failure to what the client is told.
    pub fn classify(&self) -> Rejection {
        if let Some(code) = self.directory_error().and_then(DirectoryError::result_code) {
            return Rejection::from_result_code(code);
        }

        use Error::*;
        match self {
            MissingCredentials | UserNotFoundOrAmbiguous | EmptyPassword => {
                Rejection::Unauthorized(self.to_string())
            }
            BodyTooLarge(_) => Rejection::PayloadTooLarge,
            Body(_) | Connection(_) | Tls(_) | Bind(_) | Search(_) | InvalidCredentials(_) => {
                Rejection::Internal
            }
        }
    }
}

/// Request facing outcome of a failed authentication.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("{0}")]
    Unauthorized(String),
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("internal server error")]
    Internal,
}

impl Rejection {
    /// Known non-zero codes are authentication rejections, anything else is a fault.
    /// A zero code means success and never becomes an unauthorized rejection.
    pub fn from_result_code(code: u32) -> Self {
        match result_code::describe(code) {
            Some(description) if code != result_code::SUCCESS => {
                Rejection::Unauthorized(description.to_owned())
            }
            _ => Rejection::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Rejection::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Rejection::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Serialize for Rejection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Rejection", 1)?;
        state.serialize_field("error", &self.to_string())?;
        state.end()
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        error_response(None, self)
    }
}
