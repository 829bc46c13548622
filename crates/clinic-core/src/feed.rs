//! Client-side notification feed: durable notifications merged with the
//! session's ephemeral overlay.
//!
//! Every screen renders [`NotificationFeed::snapshot`]; none re-implements the
//! merge. The merge is idempotent: refreshing with the same durable set leaves
//! the snapshot unchanged, and an ephemeral entry that has expired is gone for
//! good because nothing ever re-fetches it.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::notification::{EphemeralNotification, LocalId, Notification};

/// One displayed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEntry {
  Durable(Notification),
  Ephemeral(EphemeralNotification),
}

impl FeedEntry {
  pub fn created_at(&self) -> DateTime<Utc> {
    match self {
      Self::Durable(n) => n.created_at,
      Self::Ephemeral(e) => e.created_at,
    }
  }

  pub fn message(&self) -> &str {
    match self {
      Self::Durable(n) => &n.message,
      Self::Ephemeral(e) => &e.message,
    }
  }

  pub fn is_ephemeral(&self) -> bool { matches!(self, Self::Ephemeral(_)) }

  /// Ephemeral rows never count as unread.
  pub fn is_unread(&self) -> bool {
    matches!(self, Self::Durable(n) if !n.read)
  }
}

/// Unread badge count: durable entries with `read = false`.
pub fn unread_count(durable: &[Notification]) -> usize {
  durable.iter().filter(|n| !n.read).count()
}

/// Concatenate the durable set (first occurrence of each id wins) with the
/// unexpired ephemeral entries, newest first. Ties keep concatenation order,
/// so repeated merges of the same input produce the same sequence.
pub fn merge(
  durable: &[Notification],
  ephemeral: &[EphemeralNotification],
  now: DateTime<Utc>,
) -> Vec<FeedEntry> {
  let mut seen = HashSet::new();
  let mut entries: Vec<FeedEntry> = durable
    .iter()
    .filter(|n| seen.insert(n.notification_id))
    .cloned()
    .map(FeedEntry::Durable)
    .chain(
      ephemeral
        .iter()
        .filter(|e| !e.is_expired(now))
        .cloned()
        .map(FeedEntry::Ephemeral),
    )
    .collect();
  entries.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
  entries
}

/// What a consuming screen renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
  pub unread:  usize,
  pub entries: Vec<FeedEntry>,
}

// ─── Feed ────────────────────────────────────────────────────────────────────

/// Per-session notification state.
#[derive(Debug, Clone)]
pub struct NotificationFeed {
  durable:       Vec<Notification>,
  ephemeral:     Vec<EphemeralNotification>,
  next_local_id: u64,
  ttl:           TimeDelta,
}

impl NotificationFeed {
  /// `ttl` is how long an ephemeral notification stays on screen.
  pub fn new(ttl: TimeDelta) -> Self {
    Self {
      durable: Vec::new(),
      ephemeral: Vec::new(),
      next_local_id: 0,
      ttl,
    }
  }

  /// Replace the durable set with a freshly fetched one and drop expired
  /// ephemeral entries. Returns whether the durable set changed.
  pub fn refresh(
    &mut self,
    fetched: Vec<Notification>,
    now: DateTime<Utc>,
  ) -> bool {
    self.expire(now);
    let mut seen = HashSet::new();
    let fetched: Vec<Notification> = fetched
      .into_iter()
      .filter(|n| seen.insert(n.notification_id))
      .collect();
    if fetched == self.durable {
      return false;
    }
    self.durable = fetched;
    true
  }

  /// Add local feedback that expires after the feed's ttl.
  pub fn push_ephemeral(
    &mut self,
    message: impl Into<String>,
    now: DateTime<Utc>,
  ) -> LocalId {
    let local_id = LocalId(self.next_local_id);
    self.next_local_id += 1;
    self.ephemeral.push(EphemeralNotification {
      local_id,
      message: message.into(),
      created_at: now,
      expires_at: now + self.ttl,
    });
    local_id
  }

  /// Manually dismiss an ephemeral entry.
  pub fn dismiss(&mut self, local_id: LocalId) -> bool {
    let before = self.ephemeral.len();
    self.ephemeral.retain(|e| e.local_id != local_id);
    self.ephemeral.len() != before
  }

  /// Drop ephemeral entries whose display time is over. Returns how many.
  pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
    let before = self.ephemeral.len();
    self.ephemeral.retain(|e| !e.is_expired(now));
    before - self.ephemeral.len()
  }

  /// Reflect a mark-read the server has confirmed.
  pub fn confirm_read(&mut self, id: Uuid) {
    if let Some(n) = self.durable.iter_mut().find(|n| n.notification_id == id) {
      n.read = true;
    }
  }

  /// Reflect a delete the server has confirmed.
  pub fn confirm_deleted(&mut self, id: Uuid) {
    self.durable.retain(|n| n.notification_id != id);
  }

  /// Forget durable state, e.g. when the session's audience changes.
  pub fn clear_durable(&mut self) { self.durable.clear(); }

  pub fn durable(&self) -> &[Notification] { &self.durable }

  pub fn unread_count(&self) -> usize { unread_count(&self.durable) }

  pub fn entries(&self, now: DateTime<Utc>) -> Vec<FeedEntry> {
    merge(&self.durable, &self.ephemeral, now)
  }

  pub fn snapshot(&self, now: DateTime<Utc>) -> FeedSnapshot {
    FeedSnapshot {
      unread:  self.unread_count(),
      entries: self.entries(now),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::notification::{Audience, NotificationKind};

  fn durable(minutes_ago: i64, read: bool) -> Notification {
    Notification {
      notification_id: Uuid::new_v4(),
      audience: Audience::Admin,
      kind: NotificationKind::AppointmentCreated,
      appointment_id: None,
      message: format!("{minutes_ago} minutes ago"),
      read,
      created_at: base() - TimeDelta::minutes(minutes_ago),
    }
  }

  fn base() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2030-01-01T12:00:00Z")
      .unwrap()
      .with_timezone(&Utc)
  }

  #[test]
  fn unread_ignores_ephemeral() {
    let mut feed = NotificationFeed::new(TimeDelta::seconds(5));
    feed.refresh(vec![durable(1, false), durable(2, true), durable(3, false)], base());
    feed.push_ephemeral("saved", base());
    feed.push_ephemeral("sent", base());

    let snap = feed.snapshot(base());
    assert_eq!(snap.unread, 2);
    assert_eq!(snap.entries.len(), 5);
    assert_eq!(snap.entries.iter().filter(|e| e.is_unread()).count(), 2);
  }

  #[test]
  fn entries_sorted_newest_first() {
    let mut feed = NotificationFeed::new(TimeDelta::minutes(30));
    feed.refresh(vec![durable(10, false), durable(1, false)], base());
    feed.push_ephemeral("five ago", base() - TimeDelta::minutes(5));

    let messages: Vec<_> = feed
      .entries(base())
      .iter()
      .map(|e| e.message().to_owned())
      .collect();
    assert_eq!(messages, ["1 minutes ago", "five ago", "10 minutes ago"]);
  }

  #[test]
  fn repeated_refresh_with_same_set_is_stable() {
    let mut feed = NotificationFeed::new(TimeDelta::seconds(60));
    let set = vec![durable(3, false), durable(1, true)];
    assert!(feed.refresh(set.clone(), base()));
    feed.push_ephemeral("a", base());
    feed.push_ephemeral("b", base());
    let first = feed.snapshot(base());

    for tick in 1..5 {
      let now = base() + TimeDelta::seconds(tick);
      assert!(!feed.refresh(set.clone(), now));
      assert_eq!(feed.snapshot(now), first);
    }
  }

  #[test]
  fn duplicate_durable_ids_collapse() {
    let n = durable(1, false);
    let mut feed = NotificationFeed::new(TimeDelta::seconds(5));
    feed.refresh(vec![n.clone(), n.clone()], base());
    assert_eq!(feed.durable().len(), 1);
    assert_eq!(feed.unread_count(), 1);
  }

  #[test]
  fn expired_ephemeral_never_comes_back() {
    let mut feed = NotificationFeed::new(TimeDelta::seconds(5));
    let set = vec![durable(1, false)];
    feed.refresh(set.clone(), base());
    feed.push_ephemeral("toast", base());
    assert_eq!(feed.entries(base()).len(), 2);

    let later = base() + TimeDelta::seconds(6);
    feed.refresh(set.clone(), later);
    assert_eq!(feed.entries(later).len(), 1);

    // Even asked about an earlier instant, the entry has been dropped.
    assert_eq!(feed.entries(base()).len(), 1);
  }

  #[test]
  fn entries_hide_expired_before_next_refresh() {
    let mut feed = NotificationFeed::new(TimeDelta::seconds(5));
    feed.push_ephemeral("toast", base());
    assert!(feed.entries(base() + TimeDelta::seconds(5)).is_empty());
  }

  #[test]
  fn dismiss_removes_only_that_entry() {
    let mut feed = NotificationFeed::new(TimeDelta::seconds(60));
    let a = feed.push_ephemeral("a", base());
    let b = feed.push_ephemeral("b", base());
    assert_ne!(a, b);
    assert!(feed.dismiss(a));
    assert!(!feed.dismiss(a));
    let left: Vec<_> =
      feed.entries(base()).iter().map(|e| e.message().to_owned()).collect();
    assert_eq!(left, ["b"]);
  }

  #[test]
  fn confirmed_read_and_delete_update_badge() {
    let first = durable(1, false);
    let second = durable(2, false);
    let mut feed = NotificationFeed::new(TimeDelta::seconds(5));
    feed.refresh(vec![first.clone(), second.clone()], base());
    assert_eq!(feed.unread_count(), 2);

    feed.confirm_read(first.notification_id);
    feed.confirm_read(first.notification_id);
    assert_eq!(feed.unread_count(), 1);

    feed.confirm_deleted(second.notification_id);
    feed.confirm_deleted(second.notification_id);
    assert_eq!(feed.unread_count(), 0);
    assert_eq!(feed.durable().len(), 1);
  }
}
