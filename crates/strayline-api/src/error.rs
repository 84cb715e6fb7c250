//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! The core error taxonomy maps one-to-one onto status codes, so handlers
//! can use `?` and let the kind decide the response.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use strayline_core::Error;
use thiserror::Error as ThisError;

/// An error returned by an API handler. Thin wrapper over the core
/// taxonomy so `?` works directly on core results.
#[derive(Debug, ThisError)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl ApiError {
  fn status(&self) -> StatusCode {
    match &self.0 {
      Error::Validation(_) => StatusCode::BAD_REQUEST,
      Error::CaseNotFound(_)
      | Error::ResponderNotFound(_)
      | Error::NotificationNotFound(_) => StatusCode::NOT_FOUND,
      Error::InvalidTransition { .. } => StatusCode::CONFLICT,
      Error::MissingAssignment => StatusCode::UNPROCESSABLE_ENTITY,
      Error::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
  }

  fn kind(&self) -> &'static str {
    match &self.0 {
      Error::Validation(_) => "validation",
      Error::CaseNotFound(_)
      | Error::ResponderNotFound(_)
      | Error::NotificationNotFound(_) => "not_found",
      Error::InvalidTransition { .. } => "invalid_transition",
      Error::MissingAssignment => "missing_assignment",
      Error::Unavailable(_) => "unavailable",
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let body = json!({
      "error": { "kind": self.kind(), "message": self.0.to_string() }
    });
    (self.status(), Json(body)).into_response()
  }
}
