// Closed set of error kinds for the data engine and HTTP pipeline.
//
// Every error that can reach a client is represented here rather than as
// an open hierarchy of exception types; `ResponseError` maps each variant
// to the HTTP status fixed by the spec.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    SeaORMError(String),
    #[error("connection pool error: {0}")]
    ConnectionError(String),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("token not scoped to this pod")]
    PodMismatch,

    #[error("forbidden")]
    Forbidden,

    #[error("pod not found: {0}")]
    PodNotFound(String),

    #[error("stream not found: {0}")]
    StreamNotFound(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("pod already exists: {0}")]
    PodExists(String),

    #[error("name conflict: {0}")]
    NameConflict(String),

    #[error("validation error")]
    Validation(Value),

    #[error("rate limit exceeded")]
    RateLimited { reset_at: i64 },

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for Error {
    fn from(e: sea_orm::DbErr) -> Self {
        Error::Database(DbError::SeaORMError(e.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_at: Option<i64>,
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Unauthorized => "UNAUTHORIZED",
            Error::PodMismatch => "POD_MISMATCH",
            Error::Forbidden => "FORBIDDEN",
            Error::PodNotFound(_) => "POD_NOT_FOUND",
            Error::StreamNotFound(_) => "STREAM_NOT_FOUND",
            Error::RecordNotFound(_) => "RECORD_NOT_FOUND",
            Error::PodExists(_) => "POD_EXISTS",
            Error::NameConflict(_) => "NAME_CONFLICT",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::PodMismatch | Error::Forbidden => StatusCode::FORBIDDEN,
            Error::PodNotFound(_) | Error::StreamNotFound(_) | Error::RecordNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Error::PodExists(_) | Error::NameConflict(_) => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Database(_) | Error::Storage(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Error::Database(_) | Error::Storage(_) | Error::Internal(_) = self {
            log::error!("{self}");
        }
        let details = match self {
            Error::Validation(v) => Some(v),
            _ => None,
        };
        let reset_at = match self {
            Error::RateLimited { reset_at } => Some(*reset_at),
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            code: self.code(),
            message: self.to_string(),
            details,
            reset_at,
        })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
