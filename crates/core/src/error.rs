use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Machine-readable error codes carried in the `{status: "error"}` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ContentReleaseDoesNotExist,
    NoContentReleaseLive,
    NoContentReleaseStaged,
    ReleaseDocumentDoesNotExist,
    IllegalState,
    ValidationError,
    DependencyError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ContentReleaseDoesNotExist => "content_release_does_not_exist",
            ErrorCode::NoContentReleaseLive => "no_content_release_live",
            ErrorCode::NoContentReleaseStaged => "no_content_release_staged",
            ErrorCode::ReleaseDocumentDoesNotExist => "release_document_does_not_exist",
            ErrorCode::IllegalState => "illegal_state",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::DependencyError => "dependency_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PublisherError {
    /// A release, document or live release does not exist.
    #[error("{message}")]
    NotFound { code: ErrorCode, message: String },

    /// The requested transition is forbidden from the current state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// The storage backend failed. Aborts the current operation only.
    #[error("dependency error: {0}")]
    Dependency(String),
}

impl PublisherError {
    pub fn release_not_found(release: impl fmt::Display) -> Self {
        PublisherError::NotFound {
            code: ErrorCode::ContentReleaseDoesNotExist,
            message: format!("content release {release} does not exist"),
        }
    }

    pub fn no_live_release(site_code: &str) -> Self {
        PublisherError::NotFound {
            code: ErrorCode::NoContentReleaseLive,
            message: format!("no live content release for site {site_code}"),
        }
    }

    pub fn no_stage_release(site_code: &str) -> Self {
        PublisherError::NotFound {
            code: ErrorCode::NoContentReleaseStaged,
            message: format!("no staged content release for site {site_code}"),
        }
    }

    pub fn document_not_found(content_type: &str, document_key: &str) -> Self {
        PublisherError::NotFound {
            code: ErrorCode::ReleaseDocumentDoesNotExist,
            message: format!("release document {content_type}/{document_key} does not exist"),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PublisherError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PublisherError::NotFound { code, .. } => *code,
            PublisherError::IllegalState(_) => ErrorCode::IllegalState,
            PublisherError::Validation { .. } => ErrorCode::ValidationError,
            PublisherError::Dependency(_) => ErrorCode::DependencyError,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PublisherError::NotFound { .. })
    }
}

impl From<sqlx::Error> for PublisherError {
    fn from(err: sqlx::Error) -> Self {
        PublisherError::Dependency(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for PublisherError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        PublisherError::Dependency(err.to_string())
    }
}

pub type PublisherResult<T> = Result<T, PublisherError>;
