//! Error taxonomy for `strayline-core`.
//!
//! Every kind is meaningful to callers and must survive up to the API
//! surface untranslated: `Validation` and `MissingAssignment` are caller
//! faults, `InvalidTransition` means "refresh and reconsider", and
//! `Unavailable` is the only retryable kind.

use thiserror::Error;
use uuid::Uuid;

use crate::case::CaseStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("case not found: {0}")]
  CaseNotFound(Uuid),

  #[error("responder not found: {0}")]
  ResponderNotFound(Uuid),

  #[error("notification not found: {0}")]
  NotificationNotFound(Uuid),

  #[error("invalid transition: {from} -> {to}")]
  InvalidTransition { from: CaseStatus, to: CaseStatus },

  #[error("transition to ASSIGNED requires a responder")]
  MissingAssignment,

  /// Transient store or index failure; safe to retry with backoff.
  #[error("store unavailable: {0}")]
  Unavailable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
