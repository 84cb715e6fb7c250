//! Case types — a single reported incident tracked through the rescue
//! lifecycle.
//!
//! A case is mutated only through the
//! [`TransitionAuthority`](crate::authority::TransitionAuthority); its
//! `status` walks the fixed transition graph, its `notes` are append-only,
//! and its `reporter` is immutable after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Coordinates ─────────────────────────────────────────────────────────────

/// A WGS-84 point. Longitude first to match the stored (lon, lat) pair
/// convention of the geospatial index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub lon: f64,
  pub lat: f64,
}

// ─── Condition ───────────────────────────────────────────────────────────────

/// Severity of the reported animal's condition. Closed set; drives default
/// priority and dispatch role preference, never transition legality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
  Healthy,
  Injured,
  Sick,
  Malnourished,
  Critical,
}

impl Condition {
  /// The wire/storage token; matches the serde representation above.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Healthy => "HEALTHY",
      Self::Injured => "INJURED",
      Self::Sick => "SICK",
      Self::Malnourished => "MALNOURISHED",
      Self::Critical => "CRITICAL",
    }
  }

  /// Advisory priority (1 is most urgent) when the reporter supplies none.
  pub fn default_priority(self) -> u8 {
    match self {
      Self::Critical => 1,
      Self::Injured | Self::Sick => 2,
      Self::Malnourished => 3,
      Self::Healthy => 4,
    }
  }
}

impl std::fmt::Display for Condition {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a case. The allowed forward edges are fixed:
///
/// | From        | To                              |
/// |-------------|---------------------------------|
/// | PENDING     | ASSIGNED                        |
/// | ASSIGNED    | IN_PROGRESS, PENDING (unassign) |
/// | IN_PROGRESS | RESCUED, ASSIGNED (reassign)    |
/// | RESCUED     | COMPLETED                       |
/// | COMPLETED   | CLOSED                          |
///
/// An administrative actor may force any other edge; see
/// [`crate::authority::validate_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
  Pending,
  Assigned,
  InProgress,
  Rescued,
  Completed,
  Closed,
}

impl CaseStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "PENDING",
      Self::Assigned => "ASSIGNED",
      Self::InProgress => "IN_PROGRESS",
      Self::Rescued => "RESCUED",
      Self::Completed => "COMPLETED",
      Self::Closed => "CLOSED",
    }
  }

  /// Statuses reachable from `self` without administrative capability.
  pub fn allowed_targets(self) -> &'static [CaseStatus] {
    match self {
      Self::Pending => &[Self::Assigned],
      Self::Assigned => &[Self::InProgress, Self::Pending],
      Self::InProgress => &[Self::Rescued, Self::Assigned],
      Self::Rescued => &[Self::Completed],
      Self::Completed => &[Self::Closed],
      Self::Closed => &[],
    }
  }

  pub fn can_transition_to(self, target: CaseStatus) -> bool {
    self.allowed_targets().contains(&target)
  }

  /// A case still counted against its assignee's load.
  pub fn counts_as_open(self) -> bool {
    matches!(self, Self::Assigned | Self::InProgress | Self::Rescued)
  }
}

impl std::fmt::Display for CaseStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Participants ────────────────────────────────────────────────────────────

/// Identity of the person who filed the report; immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reporter {
  pub id:           Uuid,
  pub display_name: String,
  pub contact:      String,
}

/// The responder currently assigned to a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignee {
  pub responder_id: Uuid,
  pub display_name: String,
}

// ─── Notes ───────────────────────────────────────────────────────────────────

/// One entry in a case's append-only audit trail. Never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
  pub content:     String,
  pub author_id:   Uuid,
  pub author_name: String,
  /// Server-assigned; defines the ordering of the trail.
  pub added_at:    DateTime<Utc>,
}

/// Input for appending a note. `added_at` is always set by the store.
#[derive(Debug, Clone)]
pub struct NewNote {
  pub content:     String,
  pub author_id:   Uuid,
  pub author_name: String,
}

// ─── Case ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
  pub case_id:     Uuid,
  pub animal_name: Option<String>,
  pub description: String,
  pub condition:   Condition,
  /// Human-readable location; always present even when coordinates are not.
  pub location:    String,
  pub coordinates: Option<Coordinates>,
  /// Opaque URL supplied by the upload subsystem.
  pub photo_url:   Option<String>,
  pub status:      CaseStatus,
  pub reporter:    Reporter,
  pub assignee:    Option<Assignee>,
  pub notes:       Vec<Note>,
  /// Advisory urgency, 1 (highest) to 5. Does not gate transitions.
  pub priority:    u8,
  /// Optimistic-concurrency counter, bumped on every transition.
  pub version:     i64,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

// ─── NewCase ─────────────────────────────────────────────────────────────────

/// Input to case creation. `status` is always PENDING and timestamps are
/// store-assigned.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCase {
  pub animal_name: Option<String>,
  pub description: String,
  pub condition:   Condition,
  pub location:    String,
  pub coordinates: Option<Coordinates>,
  pub photo_url:   Option<String>,
  pub reporter:    Reporter,
  /// Explicit priority; derived from `condition` when absent.
  pub priority:    Option<u8>,
}

impl NewCase {
  /// Required-field checks for [`crate::store::CaseStore::create_case`]
  /// callers.
  pub fn validate(&self) -> Result<()> {
    if self.description.trim().is_empty() {
      return Err(Error::Validation("description must not be empty".into()));
    }
    if self.location.trim().is_empty() {
      return Err(Error::Validation("location must not be empty".into()));
    }
    if self.reporter.contact.trim().is_empty() {
      return Err(Error::Validation("reporter contact must not be empty".into()));
    }
    if let Some(p) = self.priority
      && !(1..=5).contains(&p)
    {
      return Err(Error::Validation(format!("priority {p} outside 1-5")));
    }
    Ok(())
  }

  pub fn resolved_priority(&self) -> u8 {
    self.priority.unwrap_or_else(|| self.condition.default_priority())
  }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::CaseStore::list_cases`].
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
  pub status:    Option<CaseStatus>,
  pub condition: Option<Condition>,
  /// 1-based page number; defaults to 1.
  pub page:      Option<u32>,
  /// Defaults to 20, capped at 200.
  pub page_size: Option<u32>,
}

impl CaseFilter {
  pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }

  pub fn page_size(&self) -> u32 {
    self.page_size.unwrap_or(20).clamp(1, 200)
  }
}

/// One page of cases, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct CasePage {
  pub cases:     Vec<Case>,
  pub page:      u32,
  pub page_size: u32,
  pub total:     u64,
}
