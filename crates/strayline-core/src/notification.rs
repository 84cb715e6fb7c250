//! Notification records — the side-effect output of the engine.
//!
//! Notifications are produced, never consumed, by this core. Other
//! workflows (adoption, donation, volunteer approval) write through the
//! same [`crate::store::NotificationSink`] contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
  Info,
  CaseAssigned,
  CaseUpdate,
  AdoptionUpdate,
  DonationReceived,
  VolunteerApproved,
}

impl NotificationKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Info => "INFO",
      Self::CaseAssigned => "CASE_ASSIGNED",
      Self::CaseUpdate => "CASE_UPDATE",
      Self::AdoptionUpdate => "ADOPTION_UPDATE",
      Self::DonationReceived => "DONATION_RECEIVED",
      Self::VolunteerApproved => "VOLUNTEER_APPROVED",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id:     Uuid,
  pub recipient_id:        Uuid,
  pub kind:                NotificationKind,
  pub title:               String,
  pub message:             String,
  /// The originating case, adoption, etc.
  pub related_entity_id:   Option<Uuid>,
  pub related_entity_type: Option<String>,
  pub read:                bool,
  pub created_at:          DateTime<Utc>,
  pub read_at:             Option<DateTime<Utc>>,
}

/// Input to [`crate::store::NotificationSink::insert_notification`].
/// Records are created unread with a store-assigned timestamp.
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub recipient_id:        Uuid,
  pub kind:                NotificationKind,
  pub title:               String,
  pub message:             String,
  pub related_entity_id:   Option<Uuid>,
  pub related_entity_type: Option<String>,
}
