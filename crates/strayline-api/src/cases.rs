//! Handlers for `/cases` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/cases` | `?status=`, `?condition=`, `?page=`, `?page_size=` |
//! | `POST` | `/cases` | Body: a new report; responds 201 with the PENDING case |
//! | `GET`  | `/cases/nearby` | `?lon=&lat=&radius_km=&limit=` |
//! | `GET`  | `/cases/:id` | 404 if not found |
//! | `POST` | `/cases/:id/transition` | Body: `{"target","actor","responder_id"?}` |
//! | `POST` | `/cases/:id/notes` | Body: `{"content","actor"}` |
//! | `GET`  | `/cases/:id/candidates` | Ranked dispatch candidates |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use strayline_core::{
  Error,
  authority::Actor,
  case::{Case, CaseFilter, CasePage, CaseStatus, Condition, Coordinates, NewCase},
  dispatch::DispatchCandidate,
  store::{CaseStore, NotificationSink, ResponderDirectory},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status:    Option<CaseStatus>,
  pub condition: Option<Condition>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /cases`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<CasePage>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let filter = CaseFilter {
    status:    params.status,
    condition: params.condition,
    page:      params.page,
    page_size: params.page_size,
  };
  let page = state.store.list_cases(&filter).await?;
  Ok(Json(page))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /cases` — file a new report.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewCase>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let case = state.authority.create_case(body).await?;

  // Index failure must not lose the already-persisted case.
  if let Some(coords) = case.coordinates
    && let Err(e) = state.geo_cases.upsert(case.case_id, coords)
  {
    tracing::warn!(case_id = %case.case_id, error = %e,
      "could not index case coordinates");
  }

  Ok((StatusCode::CREATED, Json(case)))
}

// ─── Nearby ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NearbyParams {
  pub lon:       f64,
  pub lat:       f64,
  /// Defaults to 5 km.
  pub radius_km: Option<f64>,
  pub limit:     Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct NearbyCase {
  pub distance_km: f64,
  pub case:        Case,
}

/// `GET /cases/nearby` — cases around a point, nearest first.
pub async fn nearby<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<NearbyCase>>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let center = Coordinates { lon: params.lon, lat: params.lat };
  let radius = params.radius_km.unwrap_or(5.0);
  let hits = state.geo_cases.within_radius(center, radius)?;

  let mut out = Vec::new();
  for (id, distance_km) in hits {
    if params.limit.is_some_and(|limit| out.len() >= limit) {
      break;
    }
    // An index entry without a stored row means the index is stale; skip.
    if let Some(case) = state.store.get_case(id).await? {
      out.push(NearbyCase { distance_km, case });
    }
  }
  Ok(Json(out))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /cases/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Case>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let case = state
    .store
    .get_case(id)
    .await?
    .ok_or(Error::CaseNotFound(id))?;
  Ok(Json(case))
}

// ─── Transition ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
  pub target:       CaseStatus,
  pub actor:        Actor,
  pub responder_id: Option<Uuid>,
}

/// `POST /cases/:id/transition`
pub async fn transition<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<TransitionBody>,
) -> Result<Json<Case>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let case = state
    .authority
    .request_transition(id, body.target, &body.actor, body.responder_id)
    .await?;

  // Closed cases stop showing up in nearby queries.
  if case.status == CaseStatus::Closed
    && let Err(e) = state.geo_cases.remove(case.case_id)
  {
    tracing::warn!(case_id = %case.case_id, error = %e,
      "could not drop closed case from the index");
  }

  Ok(Json(case))
}

// ─── Notes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NoteBody {
  pub content: String,
  pub actor:   Actor,
}

/// `POST /cases/:id/notes`
pub async fn append_note<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<NoteBody>,
) -> Result<Json<Case>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let case = state.authority.append_note(id, body.content, &body.actor).await?;
  Ok(Json(case))
}

// ─── Candidates ───────────────────────────────────────────────────────────────

/// `GET /cases/:id/candidates` — ranked responders for (re)assignment.
pub async fn candidates<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<DispatchCandidate>>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let case = state
    .store
    .get_case(id)
    .await?
    .ok_or(Error::CaseNotFound(id))?;
  let candidates = state.resolver.candidates(&case).await?;
  Ok(Json(candidates))
}
