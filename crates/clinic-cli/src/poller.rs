//! Notification polling for one client session.
//!
//! A [`PollingSession`] owns at most one background poll task. Each tick
//! fetches the durable notifications for the session's audience, merges them
//! with the local ephemeral overlay, and publishes a [`FeedSnapshot`] on a
//! watch channel only when the snapshot actually changed. A fetch that is
//! still in flight when the next tick is due delays that tick instead of
//! overlapping it.
//!
//! Every `start` and `stop` bumps the session's generation. A fetch started
//! under an older generation is dropped when it lands, so stopping or
//! restarting discards in-flight work even if the aborted task was mid-poll.
//! Local notifications carry their own timer and leave the feed when it
//! fires, independently of the poll interval.

use std::{
  future::Future,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use chrono::{TimeDelta, Utc};
use clinic_core::{
  feed::{FeedSnapshot, NotificationFeed},
  notification::{Audience, LocalId, Notification},
};
use tokio::{
  sync::watch,
  task::JoinHandle,
  time::{self, MissedTickBehavior},
};

use crate::client::{ApiClient, ClientError};

/// Where durable notifications come from.
pub trait NotificationSource: Send + Sync + 'static {
  type Error: std::fmt::Display + Send;

  fn fetch(
    &self,
    audience: Audience,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;
}

impl NotificationSource for ApiClient {
  type Error = ClientError;

  async fn fetch(
    &self,
    audience: Audience,
  ) -> Result<Vec<Notification>, ClientError> {
    self.notifications(audience).await
  }
}

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// How long local feedback stays in the feed.
pub const EPHEMERAL_TTL: TimeDelta = TimeDelta::seconds(5);

struct FeedState {
  feed:       NotificationFeed,
  generation: u64,
}

type SharedState = Arc<Mutex<FeedState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, FeedState> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Recompute the snapshot and wake subscribers if it differs. Callers hold
/// the state lock so publishes happen in mutation order.
fn publish(state: &FeedState, tx: &watch::Sender<FeedSnapshot>) {
  let snapshot = state.feed.snapshot(Utc::now());
  tx.send_if_modified(|current| {
    if *current == snapshot {
      return false;
    }
    *current = snapshot;
    true
  });
}

/// Fold one fetch result into the feed. Returns `false`, leaving the feed
/// untouched, when `generation` is no longer current.
fn apply_fetch<E: std::fmt::Display>(
  state: &SharedState,
  tx: &watch::Sender<FeedSnapshot>,
  generation: u64,
  audience: Audience,
  fetched: Result<Vec<Notification>, E>,
) -> bool {
  let mut guard = lock(state);
  if guard.generation != generation {
    tracing::debug!(%audience, "dropping fetch from a stopped poller");
    return false;
  }
  match fetched {
    Ok(fetched) => {
      guard.feed.refresh(fetched, Utc::now());
    }
    Err(e) => {
      tracing::warn!(%audience, error = %e, "notification fetch failed");
      guard.feed.expire(Utc::now());
    }
  }
  publish(&guard, tx);
  true
}

pub struct PollingSession<S> {
  source:        Arc<S>,
  interval:      Duration,
  ephemeral_ttl: TimeDelta,
  state:         SharedState,
  tx:            watch::Sender<FeedSnapshot>,
  audience:      Option<Audience>,
  task:          Option<JoinHandle<()>>,
  timers:        Vec<JoinHandle<()>>,
}

impl<S: NotificationSource> PollingSession<S> {
  pub fn new(source: Arc<S>, interval: Duration) -> Self {
    Self::with_ephemeral_ttl(source, interval, EPHEMERAL_TTL)
  }

  pub fn with_ephemeral_ttl(
    source: Arc<S>,
    interval: Duration,
    ephemeral_ttl: TimeDelta,
  ) -> Self {
    let (tx, _) = watch::channel(FeedSnapshot::default());
    Self {
      source,
      interval,
      ephemeral_ttl,
      state: Arc::new(Mutex::new(FeedState {
        feed:       NotificationFeed::new(ephemeral_ttl),
        generation: 0,
      })),
      tx,
      audience: None,
      task: None,
      timers: Vec::new(),
    }
  }

  /// Receive every published snapshot.
  pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> { self.tx.subscribe() }

  pub fn audience(&self) -> Option<Audience> { self.audience }

  pub fn is_running(&self) -> bool {
    self.task.as_ref().is_some_and(|t| !t.is_finished())
  }

  /// Begin polling for `audience`, replacing any previous poller.
  pub fn start(&mut self, audience: Audience) {
    self.stop();
    let generation = {
      let mut state = lock(&self.state);
      if self.audience != Some(audience) {
        state.feed.clear_durable();
        publish(&state, &self.tx);
      }
      state.generation
    };
    self.audience = Some(audience);

    tracing::debug!(%audience, interval = ?self.interval, "notification polling started");
    self.task = Some(tokio::spawn(poll_loop(
      Arc::clone(&self.source),
      audience,
      self.interval,
      generation,
      Arc::clone(&self.state),
      self.tx.clone(),
    )));
  }

  /// Stop polling and discard any fetch still in flight. The feed keeps its
  /// last state.
  pub fn stop(&mut self) {
    lock(&self.state).generation += 1;
    if let Some(task) = self.task.take() {
      task.abort();
      tracing::debug!(audience = ?self.audience, "notification polling stopped");
    }
  }

  /// Show local feedback that is never sent to the server. It leaves the
  /// feed once the session's ephemeral ttl has elapsed.
  pub fn notify_local(&mut self, message: impl Into<String>) -> LocalId {
    let id = {
      let mut state = lock(&self.state);
      let id = state.feed.push_ephemeral(message, Utc::now());
      publish(&state, &self.tx);
      id
    };

    self.timers.retain(|t| !t.is_finished());
    let ttl = self.ephemeral_ttl.to_std().unwrap_or(Duration::ZERO);
    let state = Arc::clone(&self.state);
    let tx = self.tx.clone();
    self.timers.push(tokio::spawn(async move {
      time::sleep(ttl).await;
      let mut state = lock(&state);
      if state.feed.dismiss(id) {
        publish(&state, &tx);
      }
    }));
    id
  }

  pub fn dismiss(&self, id: LocalId) {
    let mut state = lock(&self.state);
    if state.feed.dismiss(id) {
      publish(&state, &self.tx);
    }
  }

  /// The current merged feed.
  pub fn snapshot(&self) -> FeedSnapshot {
    lock(&self.state).feed.snapshot(Utc::now())
  }
}

impl<S> Drop for PollingSession<S> {
  fn drop(&mut self) {
    lock(&self.state).generation += 1;
    if let Some(task) = self.task.take() {
      task.abort();
    }
    for timer in self.timers.drain(..) {
      timer.abort();
    }
  }
}

async fn poll_loop<S: NotificationSource>(
  source: Arc<S>,
  audience: Audience,
  period: Duration,
  generation: u64,
  state: SharedState,
  tx: watch::Sender<FeedSnapshot>,
) {
  let mut ticker = time::interval(period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    ticker.tick().await;
    let fetched = source.fetch(audience).await;
    if !apply_fetch(&state, &tx, generation, audience, fetched) {
      return;
    }
  }
}
