//! JSON REST API for Strayline.
//!
//! Exposes an axum [`Router`] backed by any store implementing the core
//! storage traits. Auth, TLS, and transport concerns are the caller's
//! responsibility; actors arrive pre-authenticated in request bodies.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", strayline_api::api_router(state.clone()))
//! ```

pub mod cases;
pub mod error;
pub mod notifications;
pub mod responders;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use strayline_core::{
  authority::TransitionAuthority,
  dispatch::DispatchResolver,
  emitter::NotificationEmitter,
  geo::GeoIndex,
  store::{CaseStore, NotificationSink, ResponderDirectory},
};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared handler state: the store plus the workflow components built over
/// it. The geo indexes are in-memory ranking aids; the store stays the
/// source of truth.
pub struct AppState<S> {
  pub store:          Arc<S>,
  pub authority:      TransitionAuthority<S, S>,
  pub resolver:       DispatchResolver<S>,
  pub geo_cases:      Arc<GeoIndex>,
  pub geo_responders: Arc<GeoIndex>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:          Arc::clone(&self.store),
      authority:      self.authority.clone(),
      resolver:       self.resolver.clone(),
      geo_cases:      Arc::clone(&self.geo_cases),
      geo_responders: Arc::clone(&self.geo_responders),
    }
  }
}

impl<S> AppState<S>
where
  S: CaseStore + ResponderDirectory + NotificationSink,
{
  pub fn new(
    store: Arc<S>,
    geo_cases: Arc<GeoIndex>,
    geo_responders: Arc<GeoIndex>,
  ) -> Self {
    let authority = TransitionAuthority::new(
      Arc::clone(&store),
      NotificationEmitter::new(Arc::clone(&store)),
    );
    let resolver =
      DispatchResolver::new(Arc::clone(&store), Arc::clone(&geo_responders));
    Self { store, authority, resolver, geo_cases, geo_responders }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: CaseStore + ResponderDirectory + NotificationSink + 'static,
{
  Router::new()
    // Cases
    .route("/cases", get(cases::list::<S>).post(cases::create::<S>))
    .route("/cases/nearby", get(cases::nearby::<S>))
    .route("/cases/{id}", get(cases::get_one::<S>))
    .route("/cases/{id}/transition", post(cases::transition::<S>))
    .route("/cases/{id}/notes", post(cases::append_note::<S>))
    .route("/cases/{id}/candidates", get(cases::candidates::<S>))
    // Responders
    .route(
      "/responders",
      get(responders::list::<S>).post(responders::register::<S>),
    )
    .route("/responders/{id}", get(responders::get_one::<S>))
    .route(
      "/responders/{id}/availability",
      post(responders::set_availability::<S>),
    )
    // Notifications
    .route("/notifications", get(notifications::list::<S>))
    .route(
      "/notifications/unread_count",
      get(notifications::unread_count::<S>),
    )
    .route("/notifications/read_all", post(notifications::read_all::<S>))
    .route("/notifications/{id}/read", post(notifications::mark_read::<S>))
    .with_state(state)
}
