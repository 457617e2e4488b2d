use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;

/// Broad category of a failure, used by the web layer to pick a response.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected before any backend call was made.
    #[display(fmt = "validation")]
    Validation,
    /// The action requires a signed-in identity.
    #[display(fmt = "unauthenticated")]
    Unauthenticated,
    /// The identity is known but does not own the target.
    #[display(fmt = "forbidden")]
    Forbidden,
    #[display(fmt = "not found")]
    NotFound,
    /// The backend (database, auth or object storage) failed.
    /// The message is whatever the backend reported.
    #[display(fmt = "remote")]
    Remote,
}

/// Structured result error handed back by every controller.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display(fmt = "{}", message)]
pub struct BlogError {
    pub kind: ErrorKind,
    pub message: String,
}

impl std::error::Error for BlogError {}

impl BlogError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Remote, message)
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<sea_orm::DbErr> for BlogError {
    fn from(e: sea_orm::DbErr) -> Self {
        log::error!("DbErr: {}", e);
        Self::remote(e.to_string())
    }
}

impl From<argon2::password_hash::Error> for BlogError {
    fn from(e: argon2::password_hash::Error) -> Self {
        log::error!("password_hash: {}", e);
        Self::remote(e.to_string())
    }
}

impl ResponseError for BlogError {
    fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Unauthenticated => StatusCode::FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Remote => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Anonymous visitors are sent to the login form instead of an error page.
        if self.kind == ErrorKind::Unauthenticated {
            return HttpResponse::Found()
                .append_header((header::LOCATION, "/login"))
                .finish();
        }

        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.message.to_owned())
    }
}
