//! Responder (volunteer) records referenced by case assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::case::Coordinates;

/// What a responder does in the field. Used as a ranking preference by the
/// dispatch resolver, never as a hard filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponderRole {
  Feeder,
  Rescuer,
  Vet,
  Transport,
  Foster,
}

impl ResponderRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Feeder => "FEEDER",
      Self::Rescuer => "RESCUER",
      Self::Vet => "VET",
      Self::Transport => "TRANSPORT",
      Self::Foster => "FOSTER",
    }
  }
}

/// Whether a responder may be dispatched. Only `Active` responders are
/// eligible candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
  Pending,
  Active,
  Inactive,
  Rejected,
}

impl Availability {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "PENDING",
      Self::Active => "ACTIVE",
      Self::Inactive => "INACTIVE",
      Self::Rejected => "REJECTED",
    }
  }
}

/// An approved (or not-yet-approved) field volunteer.
///
/// The open-case count is deliberately not a field here: it is derived from
/// the case store on demand via
/// [`crate::store::ResponderDirectory::open_case_counts`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Responder {
  pub responder_id: Uuid,
  pub display_name: String,
  pub contact:      Option<String>,
  /// Free-text declared area, e.g. "Koramangala". Used for the text
  /// fallback when a case has no coordinates.
  pub area:         String,
  /// Geocoded centre of the declared area, if known.
  pub coordinates:  Option<Coordinates>,
  pub role:         ResponderRole,
  pub availability: Availability,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::ResponderDirectory::add_responder`].
/// New responders always start as `Pending`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewResponder {
  pub display_name: String,
  pub contact:      Option<String>,
  pub area:         String,
  pub coordinates:  Option<Coordinates>,
  pub role:         ResponderRole,
}
