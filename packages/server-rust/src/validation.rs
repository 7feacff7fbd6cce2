//! Schema validation for inbound JSON payloads.
//!
//! [`ValidatedJson`] replaces `axum::Json` at the handler boundary: it decodes
//! the body through serde, runs the payload's [`Validate`] impl, and converts
//! any failure into [`ApiError::Validation`] carrying the raw body for
//! diagnostics. The response is always 422 with the ordered violation list.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, FieldError};

/// Post-decode validation rules for a payload type.
///
/// Implementations return every violation they find, in field order; an empty
/// list means the payload is acceptable. The default accepts everything, so
/// plain DTOs opt in with `impl Validate for T {}`.
pub trait Validate {
    fn validate(&self) -> Vec<FieldError> {
        Vec::new()
    }
}

/// JSON extractor that rejects invalid payloads with the validation envelope.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            ApiError::validation(
                vec![FieldError::new(
                    ["body"],
                    rejection.to_string(),
                    "body_read_error",
                )],
                String::new(),
            )
        })?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        let value: T = serde_json::from_slice(&bytes)
            .map_err(|err| ApiError::validation(vec![decode_error(&err)], body.clone()))?;

        let violations = value.validate();
        if violations.is_empty() {
            Ok(Self(value))
        } else {
            Err(ApiError::validation(violations, body))
        }
    }
}

/// serde reports one decode failure at a time, so a decode error becomes a
/// single-record list.
fn decode_error(err: &serde_json::Error) -> FieldError {
    let kind = match err.classify() {
        serde_json::error::Category::Data => "type_error",
        serde_json::error::Category::Syntax | serde_json::error::Category::Eof => "json_invalid",
        serde_json::error::Category::Io => "body_read_error",
    };
    FieldError::new(["body"], err.to_string(), kind)
}
