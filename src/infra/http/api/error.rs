use std::error::Error as StdError;
use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::comments::CommentServiceError;
use crate::application::error::{ErrorKind, ErrorReport};
use crate::application::posts::PostServiceError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INVALID_PARENT: &str = "invalid_parent";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const TIMEOUT: &str = "timeout";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    hint: Option<String>,
    /// Error chain for the response log; never sent to the client.
    chain: Vec<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint,
            chain: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::UNAVAILABLE,
            message,
            None,
        )
    }

    /// 500 whose `detail` reaches only the response log.
    pub fn internal(detail: impl Into<String>) -> Self {
        let mut error = Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Internal server error",
            None,
        );
        error.chain.push(detail.into());
        error
    }

    pub fn deadline_exceeded(deadline: Duration) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::TIMEOUT,
            "Request timed out",
            Some(format!("deadline of {}s exceeded", deadline.as_secs())),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_chain(mut self, err: &dyn StdError) -> Self {
        let report = ErrorReport::from_error("infra::http::api", self.status, err);
        self.chain = report.messages;
        self
    }

    fn from_kind(kind: ErrorKind, err: &dyn StdError) -> Self {
        let error = match kind {
            ErrorKind::Validation => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                err.to_string(),
                None,
            ),
            ErrorKind::NotFound => Self::not_found(err.to_string()),
            ErrorKind::Conflict => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_PARENT,
                "Parent comment not found",
                Some(err.to_string()),
            ),
            ErrorKind::Transient => Self::unavailable("Service temporarily unavailable"),
            ErrorKind::Internal => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "Internal server error",
                None,
            ),
        };
        error.with_chain(err)
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        Self::from_kind(err.kind(), &err)
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        Self::from_kind(err.kind(), &err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut messages = vec![format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(&self.message)
        )];
        messages.extend(self.chain);

        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport {
            source: "infra::http::api",
            status: self.status,
            messages,
        }
        .attach(&mut response);
        response
    }
}
