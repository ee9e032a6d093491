use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Crate-wide error taxonomy (§7). `ConflictNotTransitioned` is internal to
/// the worker's CAS machinery and must never reach an HTTP response.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: intent was not transitioned")]
    ConflictNotTransitioned,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("broker error")]
    Broker(#[from] lapin::Error),
}

impl GatewayError {
    /// True when the wrapped `sqlx::Error` is a unique-constraint violation,
    /// used at call sites to translate an insert failure into the specific
    /// error variant §4 calls for (e.g. duplicate email).
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(
            err.as_database_error().and_then(|e| e.code()),
            Some(code) if code == "23505"
        )
    }
}

impl ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        match self {
            GatewayError::Validation(msg) => HttpResponse::BadRequest().json(json!({
                "status": false,
                "error": msg,
            })),
            GatewayError::Authentication(msg) => HttpResponse::Unauthorized().json(json!({
                "status": false,
                "error": msg,
            })),
            GatewayError::DuplicateResource(msg) => HttpResponse::BadRequest().json(json!({
                "status": false,
                "error": msg,
            })),
            GatewayError::NotFound(msg) => HttpResponse::NotFound().json(json!({
                "status": false,
                "error": msg,
            })),
            GatewayError::ConflictNotTransitioned => {
                tracing::error!("ConflictNotTransitioned leaked to an HTTP response");
                HttpResponse::InternalServerError().json(json!({
                    "status": false,
                    "error": "internal server error",
                }))
            }
            GatewayError::UpstreamUnavailable(detail) => {
                tracing::error!(%detail, "upstream unavailable");
                HttpResponse::InternalServerError().json(json!({
                    "status": false,
                    "error": "internal server error",
                }))
            }
            GatewayError::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                HttpResponse::InternalServerError().json(json!({
                    "status": false,
                    "error": "internal server error",
                }))
            }
            GatewayError::Database(err) => {
                tracing::error!(%err, "database error");
                HttpResponse::InternalServerError().json(json!({
                    "status": false,
                    "error": "internal server error",
                }))
            }
            GatewayError::Broker(err) => {
                tracing::error!(%err, "broker error");
                HttpResponse::InternalServerError().json(json!({
                    "status": false,
                    "error": "internal server error",
                }))
            }
        }
    }
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(err: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    e.message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"))
                })
            })
            .collect();

        GatewayError::Validation(messages.join("; "))
    }
}
