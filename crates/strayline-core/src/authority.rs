//! The Transition Authority — sole writer of a case's `status`, `assignee`,
//! and `notes`.
//!
//! Every status change flows through [`TransitionAuthority::
//! request_transition`]: the requested edge is validated against the
//! transition table (or the actor's administrative override), the store
//! applies the change as a conditional write, and only a realized change
//! triggers notification emission. A request that loses a concurrent race
//! surfaces as `InvalidTransition` and emits nothing.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  case::{Assignee, Case, CaseStatus, NewCase, NewNote},
  emitter::NotificationEmitter,
  notification::NotificationKind,
  responder::{Availability, Responder},
  store::{AssigneeChange, CaseStore, NotificationSink, ResponderDirectory},
};

/// `related_entity_type` value for notifications about cases.
const CASE_ENTITY: &str = "CASE";

// ─── Actor ───────────────────────────────────────────────────────────────────

/// The authenticated identity performing an operation. Supplied by the
/// (out-of-scope) auth layer; the engine only needs the display name for
/// audit notes and whether the actor holds administrative capability.
#[derive(Debug, Clone, Deserialize)]
pub struct Actor {
  pub id:           Uuid,
  pub display_name: String,
  #[serde(default)]
  pub admin:        bool,
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Whether a requested edge follows the table or needs (and has) override
/// capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPath {
  Normal,
  Override,
}

/// Check a requested edge against the transition table. Administrative
/// actors may force any edge; everyone else gets `InvalidTransition` for
/// targets outside the table.
pub fn validate_transition(
  current: CaseStatus,
  target: CaseStatus,
  admin: bool,
) -> Result<TransitionPath> {
  if current.can_transition_to(target) {
    Ok(TransitionPath::Normal)
  } else if admin {
    Ok(TransitionPath::Override)
  } else {
    Err(Error::InvalidTransition { from: current, to: target })
  }
}

// ─── Authority ───────────────────────────────────────────────────────────────

pub struct TransitionAuthority<S, N> {
  store:   Arc<S>,
  emitter: NotificationEmitter<N>,
}

impl<S, N> Clone for TransitionAuthority<S, N> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), emitter: self.emitter.clone() }
  }
}

impl<S, N> TransitionAuthority<S, N>
where
  S: CaseStore + ResponderDirectory,
  N: NotificationSink,
{
  pub fn new(store: Arc<S>, emitter: NotificationEmitter<N>) -> Self {
    Self { store, emitter }
  }

  /// Validate and persist a new report (status PENDING), then alert active
  /// responders whose declared area matches the report's location.
  /// Alerting is best-effort and never fails the creation.
  pub async fn create_case(&self, input: NewCase) -> Result<Case> {
    input.validate()?;
    let case = self.store.create_case(input).await?;

    match self.store.list_responders(Some(Availability::Active)).await {
      Ok(responders) => {
        let location = case.location.to_lowercase();
        for r in responders.iter().filter(|r| area_matches(&r.area, &location)) {
          self
            .emitter
            .emit(
              r.responder_id,
              NotificationKind::Info,
              "New report in your area",
              format!("A stray animal has been reported near {}", case.location),
              Some(case.case_id),
              Some(CASE_ENTITY),
            )
            .await;
        }
      }
      Err(e) => {
        tracing::warn!(case_id = %case.case_id, error = %e,
          "could not list responders for area alerts");
      }
    }

    Ok(case)
  }

  /// Apply a status change. See the module docs for the full contract.
  ///
  /// A target of ASSIGNED requires `responder_id` (else
  /// `MissingAssignment`); a target of PENDING clears the assignee; any
  /// other target carries the current assignee forward. An override path
  /// appends an audit note naming the actor and the forced edge.
  pub async fn request_transition(
    &self,
    case_id: Uuid,
    target: CaseStatus,
    actor: &Actor,
    responder_id: Option<Uuid>,
  ) -> Result<Case> {
    let case = self
      .store
      .get_case(case_id)
      .await?
      .ok_or(Error::CaseNotFound(case_id))?;
    let from = case.status;

    let path = validate_transition(from, target, actor.admin)?;

    let assignee_change = match target {
      CaseStatus::Assigned => {
        let rid = responder_id.ok_or(Error::MissingAssignment)?;
        let responder = self
          .store
          .get_responder(rid)
          .await?
          .ok_or(Error::ResponderNotFound(rid))?;
        AssigneeChange::Set(Assignee {
          responder_id: rid,
          display_name: responder.display_name,
        })
      }
      CaseStatus::Pending => AssigneeChange::Clear,
      _ => AssigneeChange::Keep,
    };

    let audit_note = (path == TransitionPath::Override).then(|| NewNote {
      content:     format!(
        "administrative override: {from} -> {target} by {}",
        actor.display_name
      ),
      author_id:   actor.id,
      author_name: actor.display_name.clone(),
    });

    let updated = self
      .store
      .apply_transition(
        case_id,
        from,
        case.version,
        target,
        assignee_change,
        audit_note,
      )
      .await?;

    // Post-transition hooks. Gated on the realized change, not on request
    // receipt: a retried request that lost the race never reaches here.
    if target == CaseStatus::Assigned
      && let Some(assignee) = updated.assignee.as_ref()
    {
      self
        .emitter
        .emit(
          assignee.responder_id,
          NotificationKind::CaseAssigned,
          "Case assigned",
          format!("You have been assigned to rescue case at {}", updated.location),
          Some(case_id),
          Some(CASE_ENTITY),
        )
        .await;
    }
    self
      .emitter
      .emit(
        updated.reporter.id,
        NotificationKind::CaseUpdate,
        "Case update",
        format!("Your report moved from {from} to {target}"),
        Some(case_id),
        Some(CASE_ENTITY),
      )
      .await;

    Ok(updated)
  }

  /// Append to the audit trail. Always permitted to any authenticated
  /// actor; ordered by the store-assigned timestamp.
  pub async fn append_note(
    &self,
    case_id: Uuid,
    content: String,
    actor: &Actor,
  ) -> Result<Case> {
    if content.trim().is_empty() {
      return Err(Error::Validation("note content must not be empty".into()));
    }
    self
      .store
      .append_note(case_id, NewNote {
        content,
        author_id: actor.id,
        author_name: actor.display_name.clone(),
      })
      .await
  }

  /// Volunteer-approval workflow: change a responder's availability and
  /// notify them when they become active. Reuses the same emitter contract
  /// as case transitions.
  pub async fn set_responder_availability(
    &self,
    responder_id: Uuid,
    availability: Availability,
  ) -> Result<Responder> {
    let responder =
      self.store.set_availability(responder_id, availability).await?;

    if availability == Availability::Active {
      self
        .emitter
        .emit(
          responder.responder_id,
          NotificationKind::VolunteerApproved,
          "Application approved",
          "You are now an active responder and can be assigned to cases",
          None,
          None,
        )
        .await;
    }

    Ok(responder)
  }
}

fn area_matches(area: &str, location_lower: &str) -> bool {
  let area = area.to_lowercase();
  !area.is_empty()
    && (location_lower.contains(&area) || area.contains(location_lower))
}
