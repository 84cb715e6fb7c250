//! Storage traits implemented by backends (e.g. `strayline-store-sqlite`).
//!
//! Higher layers (`strayline-api`, the authority, the resolver) depend on
//! these abstractions, not on any concrete backend. All methods return the
//! core [`Error`](crate::Error) taxonomy directly so no error kind is lost
//! between the store and the API surface, and all futures are `Send` for use
//! in multi-threaded async runtimes.

use std::{collections::HashMap, future::Future};

use uuid::Uuid;

use crate::{
  Result,
  case::{Case, CaseFilter, CasePage, CaseStatus, NewCase, NewNote},
  notification::{NewNotification, Notification},
  responder::{Availability, NewResponder, Responder},
};

// ─── Assignment delta ────────────────────────────────────────────────────────

/// How a transition changes the case's assignee. Computed by the
/// [`TransitionAuthority`](crate::authority::TransitionAuthority) and
/// applied by the store in the same atomic write as the status change.
#[derive(Debug, Clone)]
pub enum AssigneeChange {
  /// Carry the current assignee forward unchanged.
  Keep,
  /// Set (or replace) the assignee; used for ASSIGNED targets.
  Set(crate::case::Assignee),
  /// Remove the assignee; used when a case returns to PENDING.
  Clear,
}

// ─── CaseStore ───────────────────────────────────────────────────────────────

/// Durable case records with atomic, per-case conditional updates.
///
/// `apply_transition` is the engine's correctness mechanism: the write must
/// succeed only if the stored status and version still match what the
/// caller observed. Two concurrent transitions from the same source status
/// therefore resolve deterministically — one wins, the other observes the
/// stale precondition. No in-process lock may be relied on instead.
pub trait CaseStore: Send + Sync {
  /// Persist a new case with status PENDING. Timestamps and priority
  /// resolution are the store's responsibility; validation is the caller's.
  fn create_case(
    &self,
    input: NewCase,
  ) -> impl Future<Output = Result<Case>> + Send + '_;

  /// Retrieve a case (with its full note trail). `None` if unknown.
  fn get_case(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Case>>> + Send + '_;

  /// Filtered, paginated listing, newest first.
  fn list_cases<'a>(
    &'a self,
    filter: &'a CaseFilter,
  ) -> impl Future<Output = Result<CasePage>> + Send + 'a;

  /// Conditionally move a case to `target`, applying the assignee change
  /// and appending `audit_note` (if any) in the same atomic write.
  ///
  /// Fails with [`Error::CaseNotFound`](crate::Error::CaseNotFound) if the
  /// case does not exist, or
  /// [`Error::InvalidTransition`](crate::Error::InvalidTransition) if the
  /// stored `(status, version)` no longer matches
  /// `(expected_status, expected_version)`.
  fn apply_transition(
    &self,
    id: Uuid,
    expected_status: CaseStatus,
    expected_version: i64,
    target: CaseStatus,
    assignee: AssigneeChange,
    audit_note: Option<NewNote>,
  ) -> impl Future<Output = Result<Case>> + Send + '_;

  /// Append a note with a server-assigned timestamp. No status interaction;
  /// concurrent appends must all survive.
  fn append_note(
    &self,
    id: Uuid,
    note: NewNote,
  ) -> impl Future<Output = Result<Case>> + Send + '_;
}

// ─── ResponderDirectory ──────────────────────────────────────────────────────

pub trait ResponderDirectory: Send + Sync {
  fn add_responder(
    &self,
    input: NewResponder,
  ) -> impl Future<Output = Result<Responder>> + Send + '_;

  fn get_responder(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Responder>>> + Send + '_;

  fn list_responders(
    &self,
    availability: Option<Availability>,
  ) -> impl Future<Output = Result<Vec<Responder>>> + Send + '_;

  fn set_availability(
    &self,
    id: Uuid,
    availability: Availability,
  ) -> impl Future<Output = Result<Responder>> + Send + '_;

  /// Count of open cases (ASSIGNED / IN_PROGRESS / RESCUED) per responder,
  /// derived from the case records. Responders with no open cases may be
  /// absent from the map. Slightly stale reads are acceptable; this feeds
  /// ranking only.
  fn open_case_counts<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<HashMap<Uuid, u32>>> + Send + 'a;
}

// ─── NotificationSink ────────────────────────────────────────────────────────

/// Persistence for notification records. `insert_notification` is the only
/// operation the engine itself needs; the read side serves the notification
/// inbox endpoints and the adoption/donation/approval workflows share the
/// same contract.
pub trait NotificationSink: Send + Sync {
  fn insert_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification>> + Send + '_;

  /// Notifications for a recipient, newest first.
  fn notifications_for(
    &self,
    recipient: Uuid,
    unread_only: bool,
  ) -> impl Future<Output = Result<Vec<Notification>>> + Send + '_;

  fn unread_count(
    &self,
    recipient: Uuid,
  ) -> impl Future<Output = Result<u64>> + Send + '_;

  fn mark_read(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Notification>> + Send + '_;

  /// Returns the number of notifications flipped to read.
  fn mark_all_read(
    &self,
    recipient: Uuid,
  ) -> impl Future<Output = Result<u64>> + Send + '_;
}
