//! Handlers for `/responders` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/responders` | Optional `?availability=ACTIVE\|PENDING\|...` |
//! | `POST` | `/responders` | Registration; responds 201 with PENDING availability |
//! | `GET`  | `/responders/:id` | 404 if not found |
//! | `POST` | `/responders/:id/availability` | Body: `{"availability":"ACTIVE"}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use strayline_core::{
  Error,
  responder::{Availability, NewResponder, Responder},
  store::{CaseStore, NotificationSink, ResponderDirectory},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub availability: Option<Availability>,
}

/// `GET /responders[?availability=<availability>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Responder>>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let responders = state.store.list_responders(params.availability).await?;
  Ok(Json(responders))
}

/// `POST /responders` — volunteer registration.
pub async fn register<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewResponder>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  if body.display_name.trim().is_empty() {
    return Err(Error::Validation("display name must not be empty".into()).into());
  }
  if body.area.trim().is_empty() {
    return Err(Error::Validation("area must not be empty".into()).into());
  }

  let responder = state.store.add_responder(body).await?;

  if let Some(coords) = responder.coordinates
    && let Err(e) = state.geo_responders.upsert(responder.responder_id, coords)
  {
    tracing::warn!(responder_id = %responder.responder_id, error = %e,
      "could not index responder coordinates");
  }

  Ok((StatusCode::CREATED, Json(responder)))
}

/// `GET /responders/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Responder>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let responder = state
    .store
    .get_responder(id)
    .await?
    .ok_or(Error::ResponderNotFound(id))?;
  Ok(Json(responder))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityBody {
  pub availability: Availability,
}

/// `POST /responders/:id/availability` — the approval workflow.
pub async fn set_availability<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AvailabilityBody>,
) -> Result<Json<Responder>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let responder = state
    .authority
    .set_responder_availability(id, body.availability)
    .await?;
  Ok(Json(responder))
}
