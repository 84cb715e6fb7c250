//! Handlers for `/notifications` endpoints — the recipient inbox.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use strayline_core::{
  notification::Notification,
  store::{CaseStore, NotificationSink, ResponderDirectory},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct InboxParams {
  pub recipient:   Uuid,
  #[serde(default)]
  pub unread_only: bool,
}

/// `GET /notifications?recipient=<uuid>[&unread_only=true]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<InboxParams>,
) -> Result<Json<Vec<Notification>>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let inbox = state
    .store
    .notifications_for(params.recipient, params.unread_only)
    .await?;
  Ok(Json(inbox))
}

#[derive(Debug, Deserialize)]
pub struct RecipientParams {
  pub recipient: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
  pub unread: u64,
}

/// `GET /notifications/unread_count?recipient=<uuid>`
pub async fn unread_count<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<RecipientParams>,
) -> Result<Json<UnreadCount>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let unread = state.store.unread_count(params.recipient).await?;
  Ok(Json(UnreadCount { unread }))
}

/// `POST /notifications/:id/read` — idempotent.
pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let notification = state.store.mark_read(id).await?;
  Ok(Json(notification))
}

#[derive(Debug, Deserialize)]
pub struct ReadAllBody {
  pub recipient: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ReadAllResult {
  pub marked: u64,
}

/// `POST /notifications/read_all` — body: `{"recipient":"<uuid>"}`
pub async fn read_all<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<ReadAllBody>,
) -> Result<Json<ReadAllResult>, ApiError>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  let marked = state.store.mark_all_read(body.recipient).await?;
  Ok(Json(ReadAllResult { marked }))
}
