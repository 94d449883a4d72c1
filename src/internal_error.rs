use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::{self, Json};
use rocket_multipart_form_data::MultipartFormDataError;
use serde_json::json;
use thiserror::Error;

use std::io;
use std::sync::PoisonError;

#[derive(Error, Debug)]
pub enum InternalError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generic internal error: {0}")]
    Internal(String),
}

impl InternalError {
    pub fn bad_request(what: impl Into<String>) -> InternalError {
        InternalError::BadRequest(what.into())
    }

    pub fn unauthorized(what: impl Into<String>) -> InternalError {
        InternalError::Unauthorized(what.into())
    }

    pub fn not_found(what: impl Into<String>) -> InternalError {
        InternalError::NotFound(what.into())
    }

    pub fn status(&self) -> Status {
        match self {
            InternalError::BadRequest(_) => Status::BadRequest,
            InternalError::Unauthorized(_) => Status::Unauthorized,
            InternalError::NotFound(_) => Status::NotFound,
            _ => Status::InternalServerError,
        }
    }

    /// Message shown to the client. Server-side failures are not leaked.
    pub fn public_message(&self) -> String {
        if self.status() == Status::InternalServerError {
            String::from("Server error")
        } else {
            self.to_string()
        }
    }
}

impl<T> From<PoisonError<T>> for InternalError {
    fn from(e: PoisonError<T>) -> InternalError {
        InternalError::Internal(e.to_string())
    }
}

impl From<MultipartFormDataError> for InternalError {
    fn from(e: MultipartFormDataError) -> InternalError {
        InternalError::BadRequest(format!("Invalid upload: {}", e))
    }
}

impl<'a> From<json::Error<'a>> for InternalError {
    fn from(e: json::Error<'a>) -> InternalError {
        match e {
            json::Error::Io(e) => InternalError::BadRequest(format!("Invalid request body: {}", e)),
            json::Error::Parse(_, e) => {
                InternalError::BadRequest(format!("Invalid request body: {}", e))
            }
        }
    }
}

impl From<&str> for InternalError {
    fn from(s: &str) -> InternalError {
        InternalError::Internal(s.to_string())
    }
}

impl<'r> Responder<'r, 'static> for InternalError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();

        if status == Status::InternalServerError {
            tracing::error!("{} {}: {}", request.method(), request.uri(), self);
        } else {
            tracing::debug!("{} {} -> {}: {}", request.method(), request.uri(), status, self);
        }

        let body = Json(json!({ "message": self.public_message() }));

        Response::build_from(body.respond_to(request)?)
            .status(status)
            .ok()
    }
}

pub type InternalResult<T> = Result<T, InternalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let e = InternalError::bad_request("Invalid index");
        assert_eq!(e.status(), Status::BadRequest);
        assert_eq!(e.public_message(), "Invalid index");

        let e = InternalError::not_found("Task not found");
        assert_eq!(e.status(), Status::NotFound);
        assert_eq!(e.public_message(), "Task not found");
    }

    #[test]
    fn undecodable_bodies_are_bad_requests() {
        let parse_error = serde_json::from_str::<i64>("\"3\"").unwrap_err();
        let e = InternalError::from(json::Error::Parse("\"3\"", parse_error));
        assert_eq!(e.status(), Status::BadRequest);
        assert!(e.public_message().starts_with("Invalid request body"));
    }

    #[test]
    fn server_errors_are_masked() {
        let e = InternalError::from(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert_eq!(e.status(), Status::InternalServerError);
        assert_eq!(e.public_message(), "Server error");
    }
}
