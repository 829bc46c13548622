//! The notification channel: audience-scoped access to the durable queue.
//!
//! Reads are limited to audiences the actor may see. `mark_read` and
//! `delete` are idempotent and never fail for an unknown id, so clients may
//! retry them freely.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  actor::Actor,
  notification::{Audience, NewNotification, Notification},
  store::ClinicStore,
};

/// Cheap to clone: the store is reference-counted.
pub struct NotificationChannel<S> {
  store: Arc<S>,
}

impl<S> Clone for NotificationChannel<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: ClinicStore> NotificationChannel<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  fn ensure_visible(&self, actor: &Actor, audience: &Audience) -> Result<()> {
    if actor.can_view_audience(audience) {
      Ok(())
    } else {
      Err(Error::PermissionDenied(format!(
        "notifications for {audience} are not visible to you"
      )))
    }
  }

  /// Durable notifications for `audience`, most recent first.
  pub async fn list(
    &self,
    actor: &Actor,
    audience: Audience,
  ) -> Result<Vec<Notification>> {
    self.ensure_visible(actor, &audience)?;
    let mut notifications = self
      .store
      .list_notifications(audience)
      .await
      .map_err(Error::store)?;
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(notifications)
  }

  pub async fn unread_count(
    &self,
    actor: &Actor,
    audience: Audience,
  ) -> Result<usize> {
    self.ensure_visible(actor, &audience)?;
    self.store.unread_count(audience).await.map_err(Error::store)
  }

  pub async fn mark_read(&self, actor: &Actor, id: Uuid) -> Result<()> {
    self
      .store
      .mark_notification_read(id, actor.audiences())
      .await
      .map_err(Error::store)
  }

  pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
    self
      .store
      .delete_notification(id, actor.audiences())
      .await
      .map_err(Error::store)
  }

  /// Create one durable notification. Used for transition fan-out.
  pub async fn enqueue(&self, input: NewNotification) -> Result<Notification> {
    self.store.enqueue_notification(input).await.map_err(Error::store)
  }
}
