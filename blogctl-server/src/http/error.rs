//! API error type with IntoResponse
//!
//! Every failure leaves the server as
//! `{ "success": false, "error": { "code", "message", "details"? } }`.

use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::db::DbError;
use crate::models::{ValidationError, ValidationErrors};

const DATABASE_MESSAGE: &str = "Database operation failed";

/// Store error text riding on a `DATABASE_ERROR` response.
///
/// The body never includes it; [`expose_error_details`] copies it in for
/// routers that opt in.
#[derive(Debug, Clone)]
pub struct WithheldDetail(pub String);

/// Middleware: put withheld store error text into `error.details`.
///
/// Only layered onto development routers.
pub async fn expose_error_details(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let Some(WithheldDetail(detail)) = response.extensions_mut().remove::<WithheldDetail>() else {
        return response;
    };

    let (mut parts, _body) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    let body = error_body(
        "DATABASE_ERROR",
        DATABASE_MESSAGE.to_owned(),
        Some(json!({ "message": detail })),
    );
    (parts, Json(body)).into_response()
}

fn error_body(code: &str, message: String, details: Option<Value>) -> Value {
    let mut error = json!({
        "code": code,
        "message": message,
    });
    if let Some(details) = details {
        error["details"] = details;
    }
    json!({ "success": false, "error": error })
}

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Request failed field validation (422)
    Validation(ValidationErrors),

    /// A business rule refused the request (400)
    BadRequest(String),

    /// Resource not found (404)
    NotFound { resource: &'static str },

    /// No route matched (404)
    RouteNotFound { method: Method, path: String },

    /// Missing or wrong API key (401)
    Unauthorized(&'static str),

    /// Duplicate resource (409)
    Conflict(String),

    /// Fixed window exhausted (429)
    RateLimited { message: &'static str, retry_after_secs: u64 },

    /// Store failure (500, logged)
    Database(DbError),

    /// Unexpected failure (500, logged)
    Internal { message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } | Self::RouteNotFound { .. } => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Conflict(_) => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    fn message_and_details(&self) -> (String, Option<Value>) {
        match self {
            Self::Validation(errors) => (
                "Validation failed".to_owned(),
                Some(json!({ "fields": errors.by_field() })),
            ),
            Self::BadRequest(message) | Self::Conflict(message) => (message.clone(), None),
            Self::NotFound { resource } => (format!("{} not found", capitalize(resource)), None),
            Self::RouteNotFound { method, path } => {
                (format!("Route {} {} not found", method, path), None)
            }
            Self::Unauthorized(message) => ((*message).to_owned(), None),
            Self::RateLimited { message, .. } => ((*message).to_owned(), None),
            Self::Database(e) => {
                tracing::error!(error = %e, "database error");
                (DATABASE_MESSAGE.to_owned(), None)
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                ("An internal server error occurred".to_owned(), None)
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = self.message_and_details();
        let body = error_body(self.code(), message, details);

        let mut response = (status, Json(body)).into_response();
        match self {
            Self::RateLimited { retry_after_secs, .. } => {
                response
                    .headers_mut()
                    .insert("retry-after", HeaderValue::from(retry_after_secs));
            }
            Self::Database(e) => {
                response.extensions_mut().insert(WithheldDetail(e.to_string()));
            }
            _ => {}
        }
        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e.into())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, .. } => Self::NotFound { resource },
            DbError::Conflict(message) => Self::Conflict(message),
            DbError::Rejected(message) => Self::BadRequest(message.to_owned()),
            _ => Self::Database(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_is_422_with_fields() {
        let err = ApiError::from(ValidationError::Empty { field: "title" });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["fields"]["title"][0], "title is required");
    }

    #[tokio::test]
    async fn business_rules_are_400() {
        let err = ApiError::from(DbError::Rejected("Voting is disabled for this blog"));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "Voting is disabled for this blog");
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let err = ApiError::from(DbError::not_found("blog", "missing"));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Blog not found");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn conflict_is_409() {
        let err = ApiError::from(DbError::Conflict("slug already exists".into()));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let err = ApiError::RateLimited {
            message: "Too many comments. Please try again later.",
            retry_after_secs: 30,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "30");
    }

    #[tokio::test]
    async fn database_errors_hide_details_by_default() {
        let err = ApiError::from(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "DATABASE_ERROR");
        assert!(body["error"].get("details").is_none());
    }

    #[test]
    fn database_errors_carry_the_withheld_text() {
        let response = ApiError::from(DbError::Sqlx(sqlx::Error::PoolTimedOut)).into_response();
        let WithheldDetail(detail) = response.extensions().get::<WithheldDetail>().unwrap();
        assert!(detail.contains("pool timed out"));

        let response = ApiError::BadRequest("nope".into()).into_response();
        assert!(response.extensions().get::<WithheldDetail>().is_none());
    }

    #[test]
    fn capitalizes_resource_names() {
        assert_eq!(capitalize("comment"), "Comment");
        assert_eq!(capitalize(""), "");
    }
}
