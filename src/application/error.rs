use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::infra::error::InfraError;

/// Error chain attached to a response so the logging middleware can report
/// what the client never sees.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Coarse classification shared by every service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; never retried.
    Validation,
    /// The addressed comment or post does not exist.
    NotFound,
    /// The referenced parent comment does not exist.
    Conflict,
    /// Store transport failure that outlived the retry budget.
    Transient,
    Internal,
}

impl ErrorKind {
    pub fn from_repo(err: &RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound,
            err if err.is_transient() => Self::Transient,
            err if err.is_constraint_violation() => Self::Validation,
            _ => Self::Internal,
        }
    }
}

/// Process-level failure raised while starting up or running a command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn report_collects_error_chain() {
        let err = Outer(std::io::Error::other("inner"));
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &err);
        assert_eq!(report.messages, vec!["outer".to_string(), "inner".to_string()]);
    }
}
