use http::StatusCode;
use thiserror::Error;

#[derive(Debug)]
pub struct DBError {
    not_found: bool,
}

impl DBError {
    pub fn new() -> Self {
        DBError { not_found: false }
    }

    pub fn not_found() -> Self {
        DBError { not_found: true }
    }
}

impl Default for DBError {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DBError> for StatusCode {
    fn from(e: DBError) -> Self {
        if e.not_found {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug)]
pub struct TemplateError;

impl From<TemplateError> for StatusCode {
    fn from(_e: TemplateError) -> Self {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Debug, Error)]
#[error("password hashing failed")]
pub struct PasswordHashError;

impl From<PasswordHashError> for StatusCode {
    fn from(_e: PasswordHashError) -> Self {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Debug)]
pub struct MediaStoreError;

impl From<MediaStoreError> for StatusCode {
    fn from(_e: MediaStoreError) -> Self {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Debug)]
pub struct MultipartError;

impl From<MultipartError> for StatusCode {
    fn from(_e: MultipartError) -> Self {
        StatusCode::BAD_REQUEST
    }
}
