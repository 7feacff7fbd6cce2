//! Error translation: every failure that escapes a route handler becomes
//! exactly one JSON error envelope, logged with full diagnostics first.
//!
//! Handlers return `Result<T, ApiError>`. The three variants are mutually
//! exclusive catch points: a declared HTTP failure keeps its status code, a
//! validation failure is always 422 with the structured violation list, and
//! everything else is the 500 catch-all. Panics are converted by the
//! catch-panic stage into the same catch-all envelope, so no failure path can
//! reach the transport unformatted.

use std::any::Any;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// One structured violation from payload validation.
///
/// `loc` is the path to the offending field, `msg` the human-readable
/// message, and `type` a machine-readable classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(
        loc: impl IntoIterator<Item = impl Into<String>>,
        msg: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            loc: loc.into_iter().map(Into::into).collect(),
            msg: msg.into(),
            kind: kind.into(),
        }
    }
}

/// Application error returned by route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A handler deliberately signalled a specific status code and detail.
    #[error("HTTP {status} error: {detail}")]
    Http { status: StatusCode, detail: String },

    /// The inbound payload failed schema validation. `body` is the raw
    /// request body, carried for diagnostics and never echoed to the client.
    #[error("request validation failed")]
    Validation {
        errors: Vec<FieldError>,
        body: String,
    },

    /// Anything else. `kind` is the concrete source error type, captured at
    /// conversion time so the envelope can name the failure class.
    #[error("internal error: {source}")]
    Internal { kind: String, source: anyhow::Error },
}

impl ApiError {
    pub fn http(status: StatusCode, detail: impl Into<String>) -> Self {
        Self::Http {
            status,
            detail: detail.into(),
        }
    }

    pub fn validation(errors: Vec<FieldError>, body: impl Into<String>) -> Self {
        Self::Validation {
            errors,
            body: body.into(),
        }
    }

    pub fn internal<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            kind: std::any::type_name::<E>().to_owned(),
            source: anyhow::Error::new(source),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(source: anyhow::Error) -> Self {
        Self::Internal {
            kind: "anyhow::Error".to_owned(),
            source,
        }
    }
}

/// Failure summary stashed in response extensions by [`ApiError`] (and the
/// panic handler) so [`log_failures`] can log with request context attached.
#[derive(Debug, Clone)]
pub enum ErrorDetails {
    Declared {
        status: StatusCode,
        detail: String,
    },
    Validation {
        errors: String,
        body: String,
    },
    Internal {
        kind: String,
        message: String,
        /// Full error chain and backtrace. `None` for panics, whose trace the
        /// panic hook has already logged at the panic site.
        trace: Option<String>,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Http { status, detail } => {
                let details = ErrorDetails::Declared {
                    status,
                    detail: detail.clone(),
                };
                let mut response = (status, Json(json!({ "detail": detail }))).into_response();
                response.extensions_mut().insert(details);
                response
            }
            Self::Validation { errors, body } => {
                let details = ErrorDetails::Validation {
                    errors: serde_json::to_string(&errors).unwrap_or_default(),
                    body,
                };
                let mut response = (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "detail": errors })),
                )
                    .into_response();
                response.extensions_mut().insert(details);
                response
            }
            Self::Internal { kind, source } => {
                let message = source.to_string();
                let details = ErrorDetails::Internal {
                    kind: kind.clone(),
                    message: message.clone(),
                    trace: Some(format!("{source:?}")),
                };
                let mut response = (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "detail": "Internal server error",
                        "error_type": kind,
                        "error_message": message,
                    })),
                )
                    .into_response();
                response.extensions_mut().insert(details);
                response
            }
        }
    }
}

/// Response-path dispatcher: captures the request method and path, then logs
/// one error-level entry per failed request based on the [`ErrorDetails`]
/// the envelope left in the response. Successful responses pass through
/// silently.
pub async fn log_failures(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;

    match response.extensions().get::<ErrorDetails>() {
        Some(ErrorDetails::Declared { status, detail }) => {
            error!(
                status = %status,
                detail = %detail,
                path = %path,
                method = %method,
                "HTTP error response"
            );
        }
        Some(ErrorDetails::Validation { errors, body }) => {
            error!(
                path = %path,
                method = %method,
                errors = %errors,
                body = %body,
                "request validation failed"
            );
        }
        Some(ErrorDetails::Internal {
            kind,
            message,
            trace,
        }) => {
            if let Some(trace) = trace {
                error!(
                    method = %method,
                    path = %path,
                    error_type = %kind,
                    error_message = %message,
                    trace = %trace,
                    "unhandled error"
                );
            } else {
                error!(
                    method = %method,
                    path = %path,
                    error_type = %kind,
                    error_message = %message,
                    "unhandled error"
                );
            }
        }
        None => {}
    }

    response
}

/// Last-resort translation for handler panics, used with the catch-panic
/// stage. Produces the catch-all envelope; the stack trace is not attached
/// here because the panic hook already logged it from the panic site.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = panic_message(err.as_ref());
    let details = ErrorDetails::Internal {
        kind: "panic".to_owned(),
        message: message.clone(),
        trace: None,
    };
    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "detail": "Internal server error",
            "error_type": "panic",
            "error_message": message,
        })),
    )
        .into_response();
    response.extensions_mut().insert(details);
    response
}

fn panic_message(err: &(dyn Any + Send)) -> String {
    if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}
