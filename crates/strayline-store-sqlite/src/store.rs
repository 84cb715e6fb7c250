//! [`SqliteStore`] — the SQLite implementation of the engine's storage
//! traits.

use std::{collections::HashMap, path::Path};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use strayline_core::{
  Error, Result,
  case::{Case, CaseFilter, CasePage, CaseStatus, NewCase, NewNote, Note},
  notification::{NewNotification, Notification},
  responder::{Availability, NewResponder, Responder},
  store::{AssigneeChange, CaseStore, NotificationSink, ResponderDirectory},
};

use crate::{
  encode::{
    RawCase, RawNote, RawNotification, RawResponder, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

const CASE_COLUMNS: &str = "case_id, animal_name, description, condition, \
   location, lon, lat, photo_url, status, reporter_id, reporter_name, \
   reporter_contact, assignee_id, assignee_name, priority, version, \
   created_at, updated_at";

fn case_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCase> {
  Ok(RawCase {
    case_id:          row.get(0)?,
    animal_name:      row.get(1)?,
    description:      row.get(2)?,
    condition:        row.get(3)?,
    location:         row.get(4)?,
    lon:              row.get(5)?,
    lat:              row.get(6)?,
    photo_url:        row.get(7)?,
    status:           row.get(8)?,
    reporter_id:      row.get(9)?,
    reporter_name:    row.get(10)?,
    reporter_contact: row.get(11)?,
    assignee_id:      row.get(12)?,
    assignee_name:    row.get(13)?,
    priority:         row.get(14)?,
    version:          row.get(15)?,
    created_at:       row.get(16)?,
    updated_at:       row.get(17)?,
  })
}

/// Notes ordered by timestamp, rowid as the tiebreak so same-instant
/// appends keep insertion order.
fn notes_for_case(
  conn: &rusqlite::Connection,
  case_id: &str,
) -> rusqlite::Result<Vec<RawNote>> {
  let mut stmt = conn.prepare(
    "SELECT content, author_id, author_name, added_at
     FROM case_notes WHERE case_id = ?1
     ORDER BY added_at, rowid",
  )?;
  stmt
    .query_map(rusqlite::params![case_id], |row| {
      Ok(RawNote {
        content:     row.get(0)?,
        author_id:   row.get(1)?,
        author_name: row.get(2)?,
        added_at:    row.get(3)?,
      })
    })?
    .collect()
}

fn responder_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawResponder> {
  Ok(RawResponder {
    responder_id: row.get(0)?,
    display_name: row.get(1)?,
    contact:      row.get(2)?,
    area:         row.get(3)?,
    lon:          row.get(4)?,
    lat:          row.get(5)?,
    role:         row.get(6)?,
    availability: row.get(7)?,
    created_at:   row.get(8)?,
  })
}

fn notification_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawNotification> {
  Ok(RawNotification {
    notification_id:     row.get(0)?,
    recipient_id:        row.get(1)?,
    kind:                row.get(2)?,
    title:               row.get(3)?,
    message:             row.get(4)?,
    related_entity_id:   row.get(5)?,
    related_entity_type: row.get(6)?,
    is_read:             row.get(7)?,
    created_at:          row.get(8)?,
    read_at:             row.get(9)?,
  })
}

fn db_err(e: tokio_rusqlite::Error) -> Error { Error::Unavailable(e.to_string()) }

fn decode_notes(raws: Vec<RawNote>) -> Result<Vec<Note>> {
  raws.into_iter().map(RawNote::into_note).collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// All three storage traits backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn =
      tokio_rusqlite::Connection::open(path).await.map_err(db_err)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn =
      tokio_rusqlite::Connection::open_in_memory().await.map_err(db_err)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  async fn fetch_case(&self, id: Uuid) -> Result<Option<Case>> {
    let id_str = encode_uuid(id);

    let raw: Option<(RawCase, Vec<RawNote>)> = self
      .conn
      .call(move |conn| {
        let case = conn
          .query_row(
            &format!("SELECT {CASE_COLUMNS} FROM cases WHERE case_id = ?1"),
            rusqlite::params![id_str],
            case_row,
          )
          .optional()?;

        match case {
          Some(case) => {
            let notes = notes_for_case(conn, &id_str)?;
            Ok(Some((case, notes)))
          }
          None => Ok(None),
        }
      })
      .await
      .map_err(db_err)?;

    raw
      .map(|(case, notes)| case.into_case(decode_notes(notes)?))
      .transpose()
  }
}

// ─── CaseStore impl ──────────────────────────────────────────────────────────

impl CaseStore for SqliteStore {
  async fn create_case(&self, input: NewCase) -> Result<Case> {
    let now = Utc::now();
    let priority = input.resolved_priority();
    let case = Case {
      case_id:     Uuid::new_v4(),
      animal_name: input.animal_name,
      description: input.description,
      condition:   input.condition,
      location:    input.location,
      coordinates: input.coordinates,
      photo_url:   input.photo_url,
      status:      CaseStatus::Pending,
      reporter:    input.reporter,
      assignee:    None,
      notes:       vec![],
      priority,
      version:     0,
      created_at:  now,
      updated_at:  now,
    };

    let case_id_str  = encode_uuid(case.case_id);
    let animal_name  = case.animal_name.clone();
    let description  = case.description.clone();
    let condition    = case.condition.as_str();
    let location     = case.location.clone();
    let lon          = case.coordinates.map(|c| c.lon);
    let lat          = case.coordinates.map(|c| c.lat);
    let photo_url    = case.photo_url.clone();
    let reporter_id  = encode_uuid(case.reporter.id);
    let reporter_nm  = case.reporter.display_name.clone();
    let reporter_ct  = case.reporter.contact.clone();
    let priority     = i64::from(case.priority);
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cases (
             case_id, animal_name, description, condition, location,
             lon, lat, photo_url, status,
             reporter_id, reporter_name, reporter_contact,
             priority, version, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'PENDING',
                     ?9, ?10, ?11, ?12, 0, ?13, ?13)",
          rusqlite::params![
            case_id_str,
            animal_name,
            description,
            condition,
            location,
            lon,
            lat,
            photo_url,
            reporter_id,
            reporter_nm,
            reporter_ct,
            priority,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)?;

    Ok(case)
  }

  async fn get_case(&self, id: Uuid) -> Result<Option<Case>> {
    self.fetch_case(id).await
  }

  async fn list_cases(&self, filter: &CaseFilter) -> Result<CasePage> {
    let page      = filter.page();
    let page_size = filter.page_size();
    let offset    = (i64::from(page) - 1) * i64::from(page_size);
    let limit     = i64::from(page_size);

    let status    = filter.status.map(CaseStatus::as_str);
    let condition = filter.condition.map(|c| c.as_str());

    let (total, raws): (u64, Vec<(RawCase, Vec<RawNote>)>) = self
      .conn
      .call(move |conn| {
        let mut conds: Vec<&'static str> = vec![];
        let mut args: Vec<rusqlite::types::Value> = vec![];
        if let Some(s) = status {
          conds.push("status = ?");
          args.push(s.to_owned().into());
        }
        if let Some(c) = condition {
          conds.push("condition = ?");
          args.push(c.to_owned().into());
        }
        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM cases {where_clause}"),
          rusqlite::params_from_iter(args.iter()),
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {CASE_COLUMNS} FROM cases {where_clause}
           ORDER BY created_at DESC, case_id DESC
           LIMIT {limit} OFFSET {offset}"
        ))?;
        let cases = stmt
          .query_map(rusqlite::params_from_iter(args.iter()), case_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(cases.len());
        for case in cases {
          let notes = notes_for_case(conn, &case.case_id)?;
          out.push((case, notes));
        }

        Ok((total as u64, out))
      })
      .await
      .map_err(db_err)?;

    let cases = raws
      .into_iter()
      .map(|(case, notes)| case.into_case(decode_notes(notes)?))
      .collect::<Result<Vec<_>>>()?;

    Ok(CasePage { cases, page, page_size, total })
  }

  async fn apply_transition(
    &self,
    id: Uuid,
    expected_status: CaseStatus,
    expected_version: i64,
    target: CaseStatus,
    assignee: AssigneeChange,
    audit_note: Option<NewNote>,
  ) -> Result<Case> {
    let id_str      = encode_uuid(id);
    let id_for_note = id_str.clone();
    let now_str     = encode_dt(Utc::now());
    let target_str  = target.as_str();
    let expect_str  = expected_status.as_str();

    let affected: usize = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // The conditional write: only the caller whose observed
        // (status, version) still holds gets to move the case.
        let affected = match &assignee {
          AssigneeChange::Keep => tx.execute(
            "UPDATE cases
             SET status = ?1, version = version + 1, updated_at = ?2
             WHERE case_id = ?3 AND status = ?4 AND version = ?5",
            rusqlite::params![
              target_str, now_str, id_for_note, expect_str, expected_version
            ],
          )?,
          AssigneeChange::Set(a) => tx.execute(
            "UPDATE cases
             SET status = ?1, version = version + 1, updated_at = ?2,
                 assignee_id = ?3, assignee_name = ?4
             WHERE case_id = ?5 AND status = ?6 AND version = ?7",
            rusqlite::params![
              target_str,
              now_str,
              encode_uuid(a.responder_id),
              a.display_name,
              id_for_note,
              expect_str,
              expected_version,
            ],
          )?,
          AssigneeChange::Clear => tx.execute(
            "UPDATE cases
             SET status = ?1, version = version + 1, updated_at = ?2,
                 assignee_id = NULL, assignee_name = NULL
             WHERE case_id = ?3 AND status = ?4 AND version = ?5",
            rusqlite::params![
              target_str, now_str, id_for_note, expect_str, expected_version
            ],
          )?,
        };

        if affected == 1
          && let Some(note) = &audit_note
        {
          tx.execute(
            "INSERT INTO case_notes
               (note_id, case_id, content, author_id, author_name, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              encode_uuid(Uuid::new_v4()),
              id_for_note,
              note.content,
              encode_uuid(note.author_id),
              note.author_name,
              now_str,
            ],
          )?;
        }

        tx.commit()?;
        Ok(affected)
      })
      .await
      .map_err(db_err)?;

    if affected == 0 {
      // Distinguish a missing case from a lost race by re-reading.
      return match self.fetch_case(id).await? {
        Some(current) => {
          Err(Error::InvalidTransition { from: current.status, to: target })
        }
        None => Err(Error::CaseNotFound(id)),
      };
    }

    self
      .fetch_case(id)
      .await?
      .ok_or_else(|| Error::Unavailable("case vanished mid-transition".into()))
  }

  async fn append_note(&self, id: Uuid, note: NewNote) -> Result<Case> {
    let id_str  = encode_uuid(id);
    let id_copy = id_str.clone();
    let now_str = encode_dt(Utc::now());

    let found: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let affected = tx.execute(
          "UPDATE cases SET updated_at = ?1 WHERE case_id = ?2",
          rusqlite::params![now_str, id_copy],
        )?;
        if affected == 1 {
          tx.execute(
            "INSERT INTO case_notes
               (note_id, case_id, content, author_id, author_name, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              encode_uuid(Uuid::new_v4()),
              id_copy,
              note.content,
              encode_uuid(note.author_id),
              note.author_name,
              now_str,
            ],
          )?;
        }

        tx.commit()?;
        Ok(affected == 1)
      })
      .await
      .map_err(db_err)?;

    if !found {
      return Err(Error::CaseNotFound(id));
    }

    self
      .fetch_case(id)
      .await?
      .ok_or_else(|| Error::Unavailable("case vanished mid-append".into()))
  }
}

// ─── ResponderDirectory impl ─────────────────────────────────────────────────

const RESPONDER_COLUMNS: &str = "responder_id, display_name, contact, area, \
   lon, lat, role, availability, created_at";

impl ResponderDirectory for SqliteStore {
  async fn add_responder(&self, input: NewResponder) -> Result<Responder> {
    let responder = Responder {
      responder_id: Uuid::new_v4(),
      display_name: input.display_name,
      contact:      input.contact,
      area:         input.area,
      coordinates:  input.coordinates,
      role:         input.role,
      availability: Availability::Pending,
      created_at:   Utc::now(),
    };

    let id_str       = encode_uuid(responder.responder_id);
    let display_name = responder.display_name.clone();
    let contact      = responder.contact.clone();
    let area         = responder.area.clone();
    let lon          = responder.coordinates.map(|c| c.lon);
    let lat          = responder.coordinates.map(|c| c.lat);
    let role         = responder.role.as_str();
    let at_str       = encode_dt(responder.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO responders (
             responder_id, display_name, contact, area, lon, lat,
             role, availability, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'PENDING', ?8)",
          rusqlite::params![
            id_str, display_name, contact, area, lon, lat, role, at_str
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)?;

    Ok(responder)
  }

  async fn get_responder(&self, id: Uuid) -> Result<Option<Responder>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawResponder> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RESPONDER_COLUMNS} FROM responders
                 WHERE responder_id = ?1"
              ),
              rusqlite::params![id_str],
              responder_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db_err)?;

    raw.map(RawResponder::into_responder).transpose()
  }

  async fn list_responders(
    &self,
    availability: Option<Availability>,
  ) -> Result<Vec<Responder>> {
    let availability = availability.map(Availability::as_str);

    let raws: Vec<RawResponder> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(a) = availability {
          let mut stmt = conn.prepare(&format!(
            "SELECT {RESPONDER_COLUMNS} FROM responders
             WHERE availability = ?1 ORDER BY created_at, responder_id"
          ))?;
          stmt
            .query_map(rusqlite::params![a], responder_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {RESPONDER_COLUMNS} FROM responders
             ORDER BY created_at, responder_id"
          ))?;
          stmt
            .query_map([], responder_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws.into_iter().map(RawResponder::into_responder).collect()
  }

  async fn set_availability(
    &self,
    id: Uuid,
    availability: Availability,
  ) -> Result<Responder> {
    let id_str = encode_uuid(id);
    let a_str  = availability.as_str();

    let affected: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE responders SET availability = ?1 WHERE responder_id = ?2",
          rusqlite::params![a_str, id_str],
        )?)
      })
      .await
      .map_err(db_err)?;

    if affected == 0 {
      return Err(Error::ResponderNotFound(id));
    }

    self
      .get_responder(id)
      .await?
      .ok_or_else(|| Error::Unavailable("responder vanished mid-update".into()))
  }

  async fn open_case_counts(
    &self,
    ids: &[Uuid],
  ) -> Result<HashMap<Uuid, u32>> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }

    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let placeholders =
          std::iter::repeat_n("?", id_strs.len()).collect::<Vec<_>>().join(", ");
        let mut stmt = conn.prepare(&format!(
          "SELECT assignee_id, COUNT(*) FROM cases
           WHERE assignee_id IN ({placeholders})
             AND status IN ('ASSIGNED', 'IN_PROGRESS', 'RESCUED')
           GROUP BY assignee_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(id_strs.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    let mut counts = HashMap::with_capacity(rows.len());
    for (id_str, count) in rows {
      counts.insert(
        crate::encode::decode_uuid(&id_str)?,
        u32::try_from(count).unwrap_or(u32::MAX),
      );
    }
    Ok(counts)
  }
}

// ─── NotificationSink impl ───────────────────────────────────────────────────

const NOTIFICATION_COLUMNS: &str = "notification_id, recipient_id, kind, \
   title, message, related_entity_id, related_entity_type, is_read, \
   created_at, read_at";

impl NotificationSink for SqliteStore {
  async fn insert_notification(
    &self,
    input: NewNotification,
  ) -> Result<Notification> {
    let notification = Notification {
      notification_id:     Uuid::new_v4(),
      recipient_id:        input.recipient_id,
      kind:                input.kind,
      title:               input.title,
      message:             input.message,
      related_entity_id:   input.related_entity_id,
      related_entity_type: input.related_entity_type,
      read:                false,
      created_at:          Utc::now(),
      read_at:             None,
    };

    let id_str        = encode_uuid(notification.notification_id);
    let recipient_str = encode_uuid(notification.recipient_id);
    let kind          = notification.kind.as_str();
    let title         = notification.title.clone();
    let message       = notification.message.clone();
    let related_id    = notification.related_entity_id.map(encode_uuid);
    let related_type  = notification.related_entity_type.clone();
    let at_str        = encode_dt(notification.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications (
             notification_id, recipient_id, kind, title, message,
             related_entity_id, related_entity_type, is_read, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
          rusqlite::params![
            id_str, recipient_str, kind, title, message,
            related_id, related_type, at_str
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)?;

    Ok(notification)
  }

  async fn notifications_for(
    &self,
    recipient: Uuid,
    unread_only: bool,
  ) -> Result<Vec<Notification>> {
    let recipient_str = encode_uuid(recipient);

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let unread_clause = if unread_only { "AND is_read = 0" } else { "" };
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
           WHERE recipient_id = ?1 {unread_clause}
           ORDER BY created_at DESC, notification_id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![recipient_str], notification_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn unread_count(&self, recipient: Uuid) -> Result<u64> {
    let recipient_str = encode_uuid(recipient);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM notifications
           WHERE recipient_id = ?1 AND is_read = 0",
          rusqlite::params![recipient_str],
          |row| row.get(0),
        )?)
      })
      .await
      .map_err(db_err)?;

    Ok(count as u64)
  }

  async fn mark_read(&self, id: Uuid) -> Result<Notification> {
    let id_str  = encode_uuid(id);
    let id_copy = id_str.clone();
    let now_str = encode_dt(Utc::now());

    let raw: Option<RawNotification> = self
      .conn
      .call(move |conn| {
        // Idempotent: re-marking keeps the original read_at.
        conn.execute(
          "UPDATE notifications
           SET is_read = 1, read_at = COALESCE(read_at, ?1)
           WHERE notification_id = ?2",
          rusqlite::params![now_str, id_copy],
        )?;
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE notification_id = ?1"
              ),
              rusqlite::params![id_str],
              notification_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db_err)?;

    match raw {
      Some(raw) => raw.into_notification(),
      None => Err(Error::NotificationNotFound(id)),
    }
  }

  async fn mark_all_read(&self, recipient: Uuid) -> Result<u64> {
    let recipient_str = encode_uuid(recipient);
    let now_str       = encode_dt(Utc::now());

    let affected: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET is_read = 1, read_at = ?1
           WHERE recipient_id = ?2 AND is_read = 0",
          rusqlite::params![now_str, recipient_str],
        )?)
      })
      .await
      .map_err(db_err)?;

    Ok(affected as u64)
  }
}
