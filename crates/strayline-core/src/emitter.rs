//! Best-effort notification emission.
//!
//! The emitter is the single place any workflow (case transitions here;
//! adoption, donation, and volunteer approval elsewhere) turns an event
//! into a notification record. It never deduplicates — callers gate
//! emission on a *successful* state change — and it never propagates
//! failure: a notification is an auxiliary concern, not part of the
//! triggering operation's contract.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  notification::{NewNotification, Notification, NotificationKind},
  store::NotificationSink,
};

pub struct NotificationEmitter<N> {
  sink: Arc<N>,
}

impl<N> Clone for NotificationEmitter<N> {
  fn clone(&self) -> Self { Self { sink: Arc::clone(&self.sink) } }
}

impl<N: NotificationSink> NotificationEmitter<N> {
  pub fn new(sink: Arc<N>) -> Self { Self { sink } }

  /// Create exactly one notification record, or log the failure and return
  /// `None`. Never fails the caller.
  pub async fn emit(
    &self,
    recipient: Uuid,
    kind: NotificationKind,
    title: impl Into<String>,
    message: impl Into<String>,
    related_entity_id: Option<Uuid>,
    related_entity_type: Option<&str>,
  ) -> Option<Notification> {
    let input = NewNotification {
      recipient_id: recipient,
      kind,
      title: title.into(),
      message: message.into(),
      related_entity_id,
      related_entity_type: related_entity_type.map(str::to_owned),
    };

    match self.sink.insert_notification(input).await {
      Ok(n) => Some(n),
      Err(e) => {
        tracing::warn!(
          recipient = %recipient,
          kind = kind.as_str(),
          error = %e,
          "notification emission failed"
        );
        None
      }
    }
  }
}
