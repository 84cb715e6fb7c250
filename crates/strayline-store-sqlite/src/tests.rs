//! Integration tests for `SqliteStore` against an in-memory database,
//! including the full transition workflow driven through
//! [`TransitionAuthority`].

use std::sync::Arc;

use strayline_core::{
  Error,
  authority::{Actor, TransitionAuthority},
  case::{CaseFilter, CaseStatus, Condition, Coordinates, NewCase, NewNote, Reporter},
  emitter::NotificationEmitter,
  notification::{NewNotification, Notification, NotificationKind},
  responder::{Availability, NewResponder, Responder, ResponderRole},
  store::{AssigneeChange, CaseStore, NotificationSink, ResponderDirectory},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
}

fn authority(
  s: &Arc<SqliteStore>,
) -> TransitionAuthority<SqliteStore, SqliteStore> {
  TransitionAuthority::new(
    Arc::clone(s),
    NotificationEmitter::new(Arc::clone(s)),
  )
}

fn reporter() -> Reporter {
  Reporter {
    id:           Uuid::new_v4(),
    display_name: "Asha".into(),
    contact:      "asha@example.com".into(),
  }
}

fn new_case(condition: Condition) -> NewCase {
  NewCase {
    animal_name: Some("Bruno".into()),
    description: "dog limping near the flyover".into(),
    condition,
    location: "Koramangala".into(),
    coordinates: Some(Coordinates { lon: 77.6245, lat: 12.9352 }),
    photo_url: None,
    reporter: reporter(),
    priority: None,
  }
}

fn new_responder(name: &str, role: ResponderRole) -> NewResponder {
  NewResponder {
    display_name: name.into(),
    contact:      Some(format!("{}@example.com", name.to_lowercase())),
    area:         "Koramangala".into(),
    coordinates:  Some(Coordinates { lon: 77.62, lat: 12.93 }),
    role,
  }
}

fn actor() -> Actor {
  Actor { id: Uuid::new_v4(), display_name: "Ops".into(), admin: false }
}

fn admin() -> Actor {
  Actor { id: Uuid::new_v4(), display_name: "Supervisor".into(), admin: true }
}

/// Register a responder and flip them straight to ACTIVE.
async fn active_responder(s: &SqliteStore, name: &str) -> Responder {
  let r = s.add_responder(new_responder(name, ResponderRole::Rescuer))
    .await
    .unwrap();
  s.set_availability(r.responder_id, Availability::Active)
    .await
    .unwrap()
}

// ─── Cases ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_case() {
  let s = store().await;

  let case = s.create_case(new_case(Condition::Injured)).await.unwrap();
  assert_eq!(case.status, CaseStatus::Pending);
  assert_eq!(case.version, 0);
  assert_eq!(case.priority, 2);
  assert!(case.assignee.is_none());

  let fetched = s.get_case(case.case_id).await.unwrap().unwrap();
  assert_eq!(fetched.case_id, case.case_id);
  assert_eq!(fetched.description, case.description);
  assert_eq!(fetched.condition, Condition::Injured);
  assert_eq!(fetched.coordinates, case.coordinates);
  assert_eq!(fetched.reporter.contact, "asha@example.com");
}

#[tokio::test]
async fn get_case_missing_returns_none() {
  let s = store().await;
  assert!(s.get_case(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_cases_filters_and_paginates() {
  let s = store().await;
  for _ in 0..3 {
    s.create_case(new_case(Condition::Injured)).await.unwrap();
  }
  for _ in 0..2 {
    s.create_case(new_case(Condition::Healthy)).await.unwrap();
  }

  let all = s.list_cases(&CaseFilter::default()).await.unwrap();
  assert_eq!(all.total, 5);
  assert_eq!(all.cases.len(), 5);

  let injured = s
    .list_cases(&CaseFilter {
      condition: Some(Condition::Injured),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(injured.total, 3);
  assert!(injured.cases.iter().all(|c| c.condition == Condition::Injured));

  let page2 = s
    .list_cases(&CaseFilter {
      page: Some(2),
      page_size: Some(2),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page2.total, 5);
  assert_eq!(page2.cases.len(), 2);
  assert_eq!(page2.page, 2);

  let pending = s
    .list_cases(&CaseFilter {
      status: Some(CaseStatus::Pending),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(pending.total, 5);
}

#[tokio::test]
async fn list_cases_far_past_the_end_is_empty() {
  let s = store().await;
  s.create_case(new_case(Condition::Injured)).await.unwrap();

  let page = s
    .list_cases(&CaseFilter {
      page: Some(u32::MAX),
      page_size: Some(200),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page.total, 1);
  assert!(page.cases.is_empty());
}

#[tokio::test]
async fn apply_transition_is_conditional_on_version() {
  let s = store().await;
  let case = s.create_case(new_case(Condition::Sick)).await.unwrap();
  let responder = active_responder(&s, "Ravi").await;

  let assignee = strayline_core::case::Assignee {
    responder_id: responder.responder_id,
    display_name: responder.display_name.clone(),
  };

  let updated = s
    .apply_transition(
      case.case_id,
      CaseStatus::Pending,
      0,
      CaseStatus::Assigned,
      AssigneeChange::Set(assignee.clone()),
      None,
    )
    .await
    .unwrap();
  assert_eq!(updated.status, CaseStatus::Assigned);
  assert_eq!(updated.version, 1);
  assert_eq!(
    updated.assignee.as_ref().map(|a| a.responder_id),
    Some(responder.responder_id)
  );

  // A second write with the stale precondition loses.
  let stale = s
    .apply_transition(
      case.case_id,
      CaseStatus::Pending,
      0,
      CaseStatus::Assigned,
      AssigneeChange::Set(assignee),
      None,
    )
    .await;
  assert!(matches!(
    stale,
    Err(Error::InvalidTransition { from: CaseStatus::Assigned, .. })
  ));
}

#[tokio::test]
async fn apply_transition_unknown_case() {
  let s = store().await;
  let result = s
    .apply_transition(
      Uuid::new_v4(),
      CaseStatus::Pending,
      0,
      CaseStatus::Assigned,
      AssigneeChange::Keep,
      None,
    )
    .await;
  assert!(matches!(result, Err(Error::CaseNotFound(_))));
}

#[tokio::test]
async fn append_note_preserves_order() {
  let s = store().await;
  let case = s.create_case(new_case(Condition::Injured)).await.unwrap();
  let author = actor();

  for content in ["first observation", "second observation"] {
    s.append_note(case.case_id, NewNote {
      content:     content.into(),
      author_id:   author.id,
      author_name: author.display_name.clone(),
    })
    .await
    .unwrap();
  }

  let fetched = s.get_case(case.case_id).await.unwrap().unwrap();
  assert_eq!(fetched.notes.len(), 2);
  assert_eq!(fetched.notes[0].content, "first observation");
  assert_eq!(fetched.notes[1].content, "second observation");
}

#[tokio::test]
async fn append_note_unknown_case() {
  let s = store().await;
  let result = s
    .append_note(Uuid::new_v4(), NewNote {
      content:     "hello".into(),
      author_id:   Uuid::new_v4(),
      author_name: "Ops".into(),
    })
    .await;
  assert!(matches!(result, Err(Error::CaseNotFound(_))));
}

// ─── Responders ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn responders_start_pending_and_can_be_activated() {
  let s = store().await;
  let r = s.add_responder(new_responder("Meera", ResponderRole::Vet))
    .await
    .unwrap();
  assert_eq!(r.availability, Availability::Pending);

  let active = s
    .set_availability(r.responder_id, Availability::Active)
    .await
    .unwrap();
  assert_eq!(active.availability, Availability::Active);

  let listed = s.list_responders(Some(Availability::Active)).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].responder_id, r.responder_id);

  assert!(s.list_responders(Some(Availability::Pending))
    .await
    .unwrap()
    .is_empty());
}

#[tokio::test]
async fn set_availability_unknown_responder() {
  let s = store().await;
  let result = s.set_availability(Uuid::new_v4(), Availability::Active).await;
  assert!(matches!(result, Err(Error::ResponderNotFound(_))));
}

#[tokio::test]
async fn open_case_counts_tracks_active_assignments() {
  let s = store().await;
  let auth = authority(&s);
  let responder = active_responder(&s, "Ravi").await;
  let op = actor();

  let a = s.create_case(new_case(Condition::Injured)).await.unwrap();
  let b = s.create_case(new_case(Condition::Sick)).await.unwrap();

  for case_id in [a.case_id, b.case_id] {
    auth
      .request_transition(
        case_id,
        CaseStatus::Assigned,
        &op,
        Some(responder.responder_id),
      )
      .await
      .unwrap();
  }

  let counts =
    s.open_case_counts(&[responder.responder_id]).await.unwrap();
  assert_eq!(counts.get(&responder.responder_id), Some(&2));

  // Walk one case to CLOSED; it stops counting against the responder.
  for target in [
    CaseStatus::InProgress,
    CaseStatus::Rescued,
    CaseStatus::Completed,
    CaseStatus::Closed,
  ] {
    auth.request_transition(a.case_id, target, &op, None).await.unwrap();
  }

  let counts =
    s.open_case_counts(&[responder.responder_id]).await.unwrap();
  assert_eq!(counts.get(&responder.responder_id), Some(&1));
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn notification_inbox_roundtrip() {
  let s = store().await;
  let recipient = Uuid::new_v4();

  for i in 0..3 {
    s.insert_notification(NewNotification {
      recipient_id:        recipient,
      kind:                NotificationKind::Info,
      title:               format!("title {i}"),
      message:             "hello".into(),
      related_entity_id:   None,
      related_entity_type: None,
    })
    .await
    .unwrap();
  }

  let inbox = s.notifications_for(recipient, false).await.unwrap();
  assert_eq!(inbox.len(), 3);
  assert_eq!(s.unread_count(recipient).await.unwrap(), 3);

  let first = s.mark_read(inbox[0].notification_id).await.unwrap();
  assert!(first.read);
  assert!(first.read_at.is_some());
  assert_eq!(s.unread_count(recipient).await.unwrap(), 2);

  // Re-marking is idempotent.
  let again = s.mark_read(inbox[0].notification_id).await.unwrap();
  assert_eq!(again.read_at, first.read_at);

  let unread = s.notifications_for(recipient, true).await.unwrap();
  assert_eq!(unread.len(), 2);

  assert_eq!(s.mark_all_read(recipient).await.unwrap(), 2);
  assert_eq!(s.unread_count(recipient).await.unwrap(), 0);
}

#[tokio::test]
async fn mark_read_unknown_notification() {
  let s = store().await;
  let result = s.mark_read(Uuid::new_v4()).await;
  assert!(matches!(result, Err(Error::NotificationNotFound(_))));
}

// ─── Transition workflow ─────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_assignment_has_exactly_one_winner() {
  let s = store().await;
  let auth = authority(&s);
  let case = s.create_case(new_case(Condition::Critical)).await.unwrap();
  let ravi  = active_responder(&s, "Ravi").await;
  let meera = active_responder(&s, "Meera").await;
  let op = actor();

  let (a, b) = tokio::join!(
    auth.request_transition(
      case.case_id,
      CaseStatus::Assigned,
      &op,
      Some(ravi.responder_id),
    ),
    auth.request_transition(
      case.case_id,
      CaseStatus::Assigned,
      &op,
      Some(meera.responder_id),
    ),
  );

  let (winner_id, loser) = match (&a, &b) {
    (Ok(_), Err(e)) => (ravi.responder_id, e),
    (Err(e), Ok(_)) => (meera.responder_id, e),
    other => panic!("expected exactly one winner, got {other:?}"),
  };
  assert!(matches!(loser, Error::InvalidTransition { .. }));

  let final_case = s.get_case(case.case_id).await.unwrap().unwrap();
  assert_eq!(final_case.status, CaseStatus::Assigned);
  assert_eq!(final_case.version, 1);
  assert_eq!(
    final_case.assignee.as_ref().map(|a| a.responder_id),
    Some(winner_id)
  );

  // Emission is gated on the realized change: the loser produced nothing,
  // so exactly one assignment notification exists and it names the winner.
  let assigned_count = |inbox: Vec<Notification>| {
    inbox
      .into_iter()
      .filter(|n| n.kind == NotificationKind::CaseAssigned)
      .count()
  };
  let ravi_inbox =
    s.notifications_for(ravi.responder_id, false).await.unwrap();
  let meera_inbox =
    s.notifications_for(meera.responder_id, false).await.unwrap();
  let (winner_inbox, loser_inbox) = if winner_id == ravi.responder_id {
    (ravi_inbox, meera_inbox)
  } else {
    (meera_inbox, ravi_inbox)
  };
  assert_eq!(assigned_count(winner_inbox), 1);
  assert_eq!(assigned_count(loser_inbox), 0);
}

#[tokio::test]
async fn assignment_without_responder_is_rejected() {
  let s = store().await;
  let auth = authority(&s);
  let case = s.create_case(new_case(Condition::Injured)).await.unwrap();

  let result = auth
    .request_transition(case.case_id, CaseStatus::Assigned, &actor(), None)
    .await;
  assert!(matches!(result, Err(Error::MissingAssignment)));

  // Nothing changed.
  let fetched = s.get_case(case.case_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, CaseStatus::Pending);
  assert_eq!(fetched.version, 0);
}

#[tokio::test]
async fn assignment_to_unknown_responder_is_rejected() {
  let s = store().await;
  let auth = authority(&s);
  let case = s.create_case(new_case(Condition::Injured)).await.unwrap();

  let result = auth
    .request_transition(
      case.case_id,
      CaseStatus::Assigned,
      &actor(),
      Some(Uuid::new_v4()),
    )
    .await;
  assert!(matches!(result, Err(Error::ResponderNotFound(_))));
}

#[tokio::test]
async fn admin_override_forces_edge_and_leaves_audit_note() {
  let s = store().await;
  let auth = authority(&s);
  let case = s.create_case(new_case(Condition::Injured)).await.unwrap();
  let responder = active_responder(&s, "Ravi").await;
  let op = actor();

  for target in [
    CaseStatus::Assigned,
    CaseStatus::InProgress,
    CaseStatus::Rescued,
    CaseStatus::Completed,
  ] {
    let rid =
      (target == CaseStatus::Assigned).then_some(responder.responder_id);
    auth.request_transition(case.case_id, target, &op, rid).await.unwrap();
  }

  // Reopening a completed case is off the table for regular actors.
  let denied = auth
    .request_transition(
      case.case_id,
      CaseStatus::Assigned,
      &op,
      Some(responder.responder_id),
    )
    .await;
  assert!(matches!(
    denied,
    Err(Error::InvalidTransition {
      from: CaseStatus::Completed,
      to:   CaseStatus::Assigned,
    })
  ));

  let supervisor = admin();
  let reopened = auth
    .request_transition(
      case.case_id,
      CaseStatus::Assigned,
      &supervisor,
      Some(responder.responder_id),
    )
    .await
    .unwrap();
  assert_eq!(reopened.status, CaseStatus::Assigned);

  let audit = reopened
    .notes
    .iter()
    .find(|n| n.content.contains("administrative override"))
    .expect("audit note");
  assert!(audit.content.contains("COMPLETED -> ASSIGNED"));
  assert_eq!(audit.author_name, supervisor.display_name);
}

#[tokio::test]
async fn unassign_returns_case_to_pending_and_clears_assignee() {
  let s = store().await;
  let auth = authority(&s);
  let case = s.create_case(new_case(Condition::Injured)).await.unwrap();
  let responder = active_responder(&s, "Ravi").await;
  let op = actor();

  auth
    .request_transition(
      case.case_id,
      CaseStatus::Assigned,
      &op,
      Some(responder.responder_id),
    )
    .await
    .unwrap();

  let unassigned = auth
    .request_transition(case.case_id, CaseStatus::Pending, &op, None)
    .await
    .unwrap();
  assert_eq!(unassigned.status, CaseStatus::Pending);
  assert!(unassigned.assignee.is_none());
}

#[tokio::test]
async fn concurrent_note_appends_all_survive() {
  let s = store().await;
  let auth = authority(&s);
  let case = s.create_case(new_case(Condition::Injured)).await.unwrap();
  let op = actor();

  let (a, b, c) = tokio::join!(
    auth.append_note(case.case_id, "note one".into(), &op),
    auth.append_note(case.case_id, "note two".into(), &op),
    auth.append_note(case.case_id, "note three".into(), &op),
  );
  a.unwrap();
  b.unwrap();
  c.unwrap();

  let fetched = s.get_case(case.case_id).await.unwrap().unwrap();
  assert_eq!(fetched.notes.len(), 3);
}

#[tokio::test]
async fn assignment_notifies_responder_and_reporter() {
  let s = store().await;
  let auth = authority(&s);
  let case = s.create_case(new_case(Condition::Injured)).await.unwrap();
  let responder = active_responder(&s, "Ravi").await;

  auth
    .request_transition(
      case.case_id,
      CaseStatus::Assigned,
      &actor(),
      Some(responder.responder_id),
    )
    .await
    .unwrap();

  let responder_inbox =
    s.notifications_for(responder.responder_id, false).await.unwrap();
  assert!(responder_inbox
    .iter()
    .any(|n| n.kind == NotificationKind::CaseAssigned
      && n.related_entity_id == Some(case.case_id)));

  let reporter_inbox =
    s.notifications_for(case.reporter.id, false).await.unwrap();
  assert!(reporter_inbox
    .iter()
    .any(|n| n.kind == NotificationKind::CaseUpdate));
}

#[tokio::test]
async fn activation_notifies_responder() {
  let s = store().await;
  let auth = authority(&s);
  let r = s.add_responder(new_responder("Meera", ResponderRole::Vet))
    .await
    .unwrap();

  auth
    .set_responder_availability(r.responder_id, Availability::Active)
    .await
    .unwrap();

  let inbox = s.notifications_for(r.responder_id, false).await.unwrap();
  assert!(inbox
    .iter()
    .any(|n| n.kind == NotificationKind::VolunteerApproved));
}

// ─── Emission failure tolerance ──────────────────────────────────────────────

/// A sink that always fails; transitions must still succeed against it.
struct FailingSink;

impl NotificationSink for FailingSink {
  async fn insert_notification(
    &self,
    _input: NewNotification,
  ) -> strayline_core::Result<Notification> {
    Err(Error::Unavailable("sink down".into()))
  }

  async fn notifications_for(
    &self,
    _recipient: Uuid,
    _unread_only: bool,
  ) -> strayline_core::Result<Vec<Notification>> {
    Err(Error::Unavailable("sink down".into()))
  }

  async fn unread_count(&self, _recipient: Uuid) -> strayline_core::Result<u64> {
    Err(Error::Unavailable("sink down".into()))
  }

  async fn mark_read(
    &self,
    _id: Uuid,
  ) -> strayline_core::Result<Notification> {
    Err(Error::Unavailable("sink down".into()))
  }

  async fn mark_all_read(
    &self,
    _recipient: Uuid,
  ) -> strayline_core::Result<u64> {
    Err(Error::Unavailable("sink down".into()))
  }
}

#[tokio::test]
async fn transition_succeeds_when_emission_fails() {
  let s = store().await;
  let auth = TransitionAuthority::new(
    Arc::clone(&s),
    NotificationEmitter::new(Arc::new(FailingSink)),
  );
  let case = s.create_case(new_case(Condition::Injured)).await.unwrap();
  let responder = active_responder(&s, "Ravi").await;

  let assigned = auth
    .request_transition(
      case.case_id,
      CaseStatus::Assigned,
      &actor(),
      Some(responder.responder_id),
    )
    .await
    .unwrap();
  assert_eq!(assigned.status, CaseStatus::Assigned);
  assert_eq!(
    assigned.assignee.as_ref().map(|a| a.responder_id),
    Some(responder.responder_id)
  );
}
