//! Error types for timerec.
//!
//! Every failure maps onto one [`ErrorKind`], which is what callers branch on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("template parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse failure classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    ValidationFailed,
    BackendError,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Validation(_) => ErrorKind::ValidationFailed,
            Error::Backend(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Database(_)
            | Error::Http(_)
            | Error::Serialization(_)
            | Error::Toml(_) => ErrorKind::BackendError,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::ValidationFailed => "VALIDATION_FAILED",
            ErrorKind::BackendError => "BACKEND_ERROR",
        };
        write!(f, "{s}")
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_errors_are_backend_kind() {
        let io = Error::from(std::io::Error::other("disk gone"));
        assert_eq!(io.kind(), ErrorKind::BackendError);
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::BackendError);
    }

    #[test]
    fn domain_errors_keep_their_kind() {
        assert!(Error::NotFound("job a".into()).is_not_found());
        assert_eq!(Error::Conflict("a".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            Error::Validation("title".into()).kind(),
            ErrorKind::ValidationFailed
        );
        assert_eq!(ErrorKind::InvalidState.to_string(), "INVALID_STATE");
    }
}
