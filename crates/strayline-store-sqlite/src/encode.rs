//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated
//! lowercase strings, and enums as their uppercase wire tokens. A row that
//! fails to decode is treated as a store fault (`Unavailable`), never as a
//! caller error.

use chrono::{DateTime, Utc};
use strayline_core::{
  Error, Result,
  case::{Assignee, Case, CaseStatus, Condition, Coordinates, Note, Reporter},
  notification::{Notification, NotificationKind},
  responder::{Availability, Responder, ResponderRole},
};
use uuid::Uuid;

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(|e| corrupt("uuid", s, &e.to_string()))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| corrupt("timestamp", s, &e.to_string()))
}

fn corrupt(what: &str, value: &str, detail: &str) -> Error {
  Error::Unavailable(format!("corrupt {what} column {value:?}: {detail}"))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<CaseStatus> {
  match s {
    "PENDING" => Ok(CaseStatus::Pending),
    "ASSIGNED" => Ok(CaseStatus::Assigned),
    "IN_PROGRESS" => Ok(CaseStatus::InProgress),
    "RESCUED" => Ok(CaseStatus::Rescued),
    "COMPLETED" => Ok(CaseStatus::Completed),
    "CLOSED" => Ok(CaseStatus::Closed),
    other => Err(corrupt("status", other, "unknown token")),
  }
}

pub fn decode_condition(s: &str) -> Result<Condition> {
  match s {
    "HEALTHY" => Ok(Condition::Healthy),
    "INJURED" => Ok(Condition::Injured),
    "SICK" => Ok(Condition::Sick),
    "MALNOURISHED" => Ok(Condition::Malnourished),
    "CRITICAL" => Ok(Condition::Critical),
    other => Err(corrupt("condition", other, "unknown token")),
  }
}

pub fn decode_role(s: &str) -> Result<ResponderRole> {
  match s {
    "FEEDER" => Ok(ResponderRole::Feeder),
    "RESCUER" => Ok(ResponderRole::Rescuer),
    "VET" => Ok(ResponderRole::Vet),
    "TRANSPORT" => Ok(ResponderRole::Transport),
    "FOSTER" => Ok(ResponderRole::Foster),
    other => Err(corrupt("role", other, "unknown token")),
  }
}

pub fn decode_availability(s: &str) -> Result<Availability> {
  match s {
    "PENDING" => Ok(Availability::Pending),
    "ACTIVE" => Ok(Availability::Active),
    "INACTIVE" => Ok(Availability::Inactive),
    "REJECTED" => Ok(Availability::Rejected),
    other => Err(corrupt("availability", other, "unknown token")),
  }
}

pub fn decode_kind(s: &str) -> Result<NotificationKind> {
  match s {
    "INFO" => Ok(NotificationKind::Info),
    "CASE_ASSIGNED" => Ok(NotificationKind::CaseAssigned),
    "CASE_UPDATE" => Ok(NotificationKind::CaseUpdate),
    "ADOPTION_UPDATE" => Ok(NotificationKind::AdoptionUpdate),
    "DONATION_RECEIVED" => Ok(NotificationKind::DonationReceived),
    "VOLUNTEER_APPROVED" => Ok(NotificationKind::VolunteerApproved),
    other => Err(corrupt("notification kind", other, "unknown token")),
  }
}

fn decode_coordinates(lon: Option<f64>, lat: Option<f64>) -> Option<Coordinates> {
  match (lon, lat) {
    (Some(lon), Some(lat)) => Some(Coordinates { lon, lat }),
    _ => None,
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `cases` row.
pub struct RawCase {
  pub case_id:          String,
  pub animal_name:      Option<String>,
  pub description:      String,
  pub condition:        String,
  pub location:         String,
  pub lon:              Option<f64>,
  pub lat:              Option<f64>,
  pub photo_url:        Option<String>,
  pub status:           String,
  pub reporter_id:      String,
  pub reporter_name:    String,
  pub reporter_contact: String,
  pub assignee_id:      Option<String>,
  pub assignee_name:    Option<String>,
  pub priority:         i64,
  pub version:          i64,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawCase {
  pub fn into_case(self, notes: Vec<Note>) -> Result<Case> {
    let assignee = match (self.assignee_id, self.assignee_name) {
      (Some(id), Some(name)) => Some(Assignee {
        responder_id: decode_uuid(&id)?,
        display_name: name,
      }),
      _ => None,
    };

    Ok(Case {
      case_id: decode_uuid(&self.case_id)?,
      animal_name: self.animal_name,
      description: self.description,
      condition: decode_condition(&self.condition)?,
      location: self.location,
      coordinates: decode_coordinates(self.lon, self.lat),
      photo_url: self.photo_url,
      status: decode_status(&self.status)?,
      reporter: Reporter {
        id:           decode_uuid(&self.reporter_id)?,
        display_name: self.reporter_name,
        contact:      self.reporter_contact,
      },
      assignee,
      notes,
      priority: u8::try_from(self.priority)
        .map_err(|_| corrupt("priority", &self.priority.to_string(), "out of range"))?,
      version: self.version,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `case_notes` row.
pub struct RawNote {
  pub content:     String,
  pub author_id:   String,
  pub author_name: String,
  pub added_at:    String,
}

impl RawNote {
  pub fn into_note(self) -> Result<Note> {
    Ok(Note {
      content:     self.content,
      author_id:   decode_uuid(&self.author_id)?,
      author_name: self.author_name,
      added_at:    decode_dt(&self.added_at)?,
    })
  }
}

/// Raw values read directly from a `responders` row.
pub struct RawResponder {
  pub responder_id: String,
  pub display_name: String,
  pub contact:      Option<String>,
  pub area:         String,
  pub lon:          Option<f64>,
  pub lat:          Option<f64>,
  pub role:         String,
  pub availability: String,
  pub created_at:   String,
}

impl RawResponder {
  pub fn into_responder(self) -> Result<Responder> {
    Ok(Responder {
      responder_id: decode_uuid(&self.responder_id)?,
      display_name: self.display_name,
      contact:      self.contact,
      area:         self.area,
      coordinates:  decode_coordinates(self.lon, self.lat),
      role:         decode_role(&self.role)?,
      availability: decode_availability(&self.availability)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `notifications` row.
pub struct RawNotification {
  pub notification_id:     String,
  pub recipient_id:        String,
  pub kind:                String,
  pub title:               String,
  pub message:             String,
  pub related_entity_id:   Option<String>,
  pub related_entity_type: Option<String>,
  pub is_read:             bool,
  pub created_at:          String,
  pub read_at:             Option<String>,
}

impl RawNotification {
  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      recipient_id: decode_uuid(&self.recipient_id)?,
      kind: decode_kind(&self.kind)?,
      title: self.title,
      message: self.message,
      related_entity_id: self
        .related_entity_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      related_entity_type: self.related_entity_type,
      read: self.is_read,
      created_at: decode_dt(&self.created_at)?,
      read_at: self.read_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
