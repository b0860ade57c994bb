//! Background polling of the two role-view reads.
//!
//! One task per dashboard re-issues both reads on a fixed interval and
//! publishes the result over a [`watch`] channel. Each tick awaits its fetch
//! before the next tick is taken, so fetches never overlap; ticks missed
//! while a slow fetch was running are skipped rather than replayed.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use codered_core::{clock::Clock, projector::CodeRedView, role::Role};
use thiserror::Error;
use tokio::{
  sync::{Notify, watch},
  task::JoinHandle,
  time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;

// ─── Data ─────────────────────────────────────────────────────────────────────

/// The result of one successful poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fetched {
  pub active:     Option<CodeRedView>,
  pub all_active: Vec<CodeRedView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
  /// A scheduled fetch failed; it will be retried on the next tick.
  #[error("refresh failed: {0}")]
  Transient(String),
}

/// What the dashboard renders: the last good data plus freshness markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
  pub active:     Option<CodeRedView>,
  pub all_active: Vec<CodeRedView>,
  /// When the data above was fetched. `None` until the first success.
  pub fetched_at: Option<DateTime<Utc>>,
  /// The most recent fetch failed; the data is from an earlier one.
  pub stale:      bool,
  pub last_error: Option<PollError>,
}

impl Snapshot {
  /// Fold one fetch outcome in. Failures keep the previous data.
  pub fn apply(&mut self, outcome: anyhow::Result<Fetched>, at: DateTime<Utc>) {
    match outcome {
      Ok(fetched) => {
        self.active = fetched.active;
        self.all_active = fetched.all_active;
        self.fetched_at = Some(at);
        self.stale = false;
        self.last_error = None;
      }
      Err(e) => {
        tracing::warn!(error = %format!("{e:#}"), "poll failed, keeping last data");
        self.stale = true;
        self.last_error = Some(PollError::Transient(format!("{e:#}")));
      }
    }
  }
}

// ─── Source ───────────────────────────────────────────────────────────────────

/// Something that can produce both role-view reads.
pub trait Source: Send + Sync + 'static {
  fn fetch(&self) -> impl Future<Output = anyhow::Result<Fetched>> + Send + '_;
}

/// The HTTP source: one viewer's reads against the server.
pub struct Feed {
  pub client: ApiClient,
  pub role:   Option<Role>,
  pub scope:  Option<String>,
}

impl Source for Feed {
  async fn fetch(&self) -> anyhow::Result<Fetched> {
    let (active, all_active) = tokio::try_join!(
      self.client.active(self.role, self.scope.as_deref()),
      self.client.all_active(),
    )?;
    Ok(Fetched { active, all_active })
  }
}

// ─── Poller ───────────────────────────────────────────────────────────────────

/// Handle to a running poll loop. Dropping it stops the loop.
pub struct Poller {
  snapshots: watch::Receiver<Snapshot>,
  nudge:     Arc<Notify>,
  cancel:    CancellationToken,
  task:      Option<JoinHandle<()>>,
}

impl Poller {
  /// Start polling `source` every `period`. The first fetch happens
  /// immediately.
  pub fn spawn<S: Source>(source: S, period: Duration, clock: Arc<dyn Clock>) -> Self {
    let (tx, snapshots) = watch::channel(Snapshot::default());
    let nudge = Arc::new(Notify::new());
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run(
      source,
      period,
      clock,
      tx,
      Arc::clone(&nudge),
      cancel.clone(),
    ));

    Self { snapshots, nudge, cancel, task: Some(task) }
  }

  /// A receiver that sees every published snapshot.
  pub fn subscribe(&self) -> watch::Receiver<Snapshot> { self.snapshots.clone() }

  /// Ask for a fetch now instead of at the next tick, e.g. right after a
  /// write. Coalesces with a fetch already running.
  pub fn refresh(&self) { self.nudge.notify_one(); }

  /// Cancel the loop, including any request in flight, and wait for it.
  pub async fn stop(mut self) {
    self.cancel.cancel();
    if let Some(task) = self.task.take() {
      let _ = task.await;
    }
  }
}

impl Drop for Poller {
  fn drop(&mut self) { self.cancel.cancel(); }
}

async fn run<S: Source>(
  source: S,
  period: Duration,
  clock: Arc<dyn Clock>,
  tx: watch::Sender<Snapshot>,
  nudge: Arc<Notify>,
  cancel: CancellationToken,
) {
  let mut ticker = tokio::time::interval(period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    tokio::select! {
      _ = cancel.cancelled() => break,
      _ = ticker.tick() => {}
      _ = nudge.notified() => ticker.reset(),
    }

    let outcome = tokio::select! {
      _ = cancel.cancelled() => break,
      outcome = source.fetch() => outcome,
    };
    tx.send_modify(|snapshot| snapshot.apply(outcome, clock.now()));
  }
  tracing::debug!("poller stopped");
}

#[cfg(test)]
mod tests {
  use std::{
    collections::VecDeque,
    sync::{
      Mutex,
      atomic::{AtomicUsize, Ordering},
    },
  };

  use anyhow::anyhow;
  use chrono::TimeZone;
  use codered_core::{
    clock::ManualClock,
    event::{CodeRedEvent, EventId, LabType},
    projector::project,
  };

  use super::*;

  const PERIOD: Duration = Duration::from_secs(5);

  fn view(id: i64) -> CodeRedView {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    project(
      CodeRedEvent {
        id:                    EventId(id),
        lab_type:              LabType::MainLab,
        location:              "ED".into(),
        patient_mrn:           format!("{id}"),
        activation_time:       at,
        assigned_runner_id:    None,
        assigned_clinician_id: None,
        resolution:            None,
        packs:                 Vec::new(),
      },
      at,
    )
  }

  fn fetched(ids: &[i64]) -> Fetched {
    Fetched {
      active:     ids.first().map(|id| view(*id)),
      all_active: ids.iter().map(|id| view(*id)).collect(),
    }
  }

  /// Replays scripted outcomes, then repeats the last success forever.
  #[derive(Clone, Default)]
  struct Scripted {
    script:    Arc<Mutex<VecDeque<Result<Fetched, String>>>>,
    calls:     Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_seen:  Arc<AtomicUsize>,
    delay:     Duration,
  }

  impl Scripted {
    fn new(script: Vec<Result<Fetched, String>>) -> Self {
      Self {
        script: Arc::new(Mutex::new(script.into())),
        ..Self::default()
      }
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
  }

  impl Source for Scripted {
    async fn fetch(&self) -> anyhow::Result<Fetched> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
      self.max_seen.fetch_max(now, Ordering::SeqCst);
      if !self.delay.is_zero() {
        tokio::time::sleep(self.delay).await;
      }
      self.in_flight.fetch_sub(1, Ordering::SeqCst);

      let mut script = self.script.lock().unwrap();
      let next = if script.len() > 1 {
        script.pop_front()
      } else {
        script.front().cloned()
      };
      match next {
        Some(Ok(f)) => Ok(f),
        Some(Err(e)) => Err(anyhow!(e)),
        None => Ok(Fetched::default()),
      }
    }
  }

  fn clock() -> Arc<dyn Clock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()))
  }

  #[tokio::test(start_paused = true)]
  async fn first_fetch_is_immediate() {
    let source = Scripted::new(vec![Ok(fetched(&[1]))]);
    let poller = Poller::spawn(source.clone(), PERIOD, clock());
    let mut rx = poller.subscribe();

    rx.changed().await.unwrap();
    let snap = rx.borrow().clone();
    assert_eq!(snap.all_active.len(), 1);
    assert!(snap.fetched_at.is_some());
    assert!(!snap.stale);
    assert_eq!(source.calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn polls_on_every_interval() {
    let source = Scripted::new(vec![Ok(fetched(&[1]))]);
    let poller = Poller::spawn(source.clone(), PERIOD, clock());
    let mut rx = poller.subscribe();

    for _ in 0..3 {
      rx.changed().await.unwrap();
    }
    assert_eq!(source.calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn failure_keeps_last_good_data() {
    let source = Scripted::new(vec![
      Ok(fetched(&[2, 1])),
      Err("connection refused".into()),
      Ok(fetched(&[2])),
    ]);
    let poller = Poller::spawn(source, PERIOD, clock());
    let mut rx = poller.subscribe();

    rx.changed().await.unwrap();
    let good = rx.borrow_and_update().clone();
    assert_eq!(good.all_active.len(), 2);

    rx.changed().await.unwrap();
    let failed = rx.borrow_and_update().clone();
    assert!(failed.stale);
    assert_eq!(failed.all_active, good.all_active);
    assert_eq!(failed.active, good.active);
    assert_eq!(failed.fetched_at, good.fetched_at);
    assert!(matches!(failed.last_error, Some(PollError::Transient(ref m)) if m.contains("refused")));

    rx.changed().await.unwrap();
    let recovered = rx.borrow_and_update().clone();
    assert!(!recovered.stale);
    assert!(recovered.last_error.is_none());
    assert_eq!(recovered.all_active.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn slow_fetches_never_overlap() {
    let mut source = Scripted::new(vec![Ok(fetched(&[1]))]);
    source.delay = PERIOD * 3;
    let poller = Poller::spawn(source.clone(), PERIOD, clock());
    let mut rx = poller.subscribe();

    for _ in 0..4 {
      rx.changed().await.unwrap();
    }
    assert_eq!(source.max_seen.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn stop_ends_the_loop() {
    let source = Scripted::new(vec![Ok(fetched(&[1]))]);
    let poller = Poller::spawn(source.clone(), PERIOD, clock());
    let mut rx = poller.subscribe();
    rx.changed().await.unwrap();

    poller.stop().await;
    let calls = source.calls();
    tokio::time::sleep(PERIOD * 4).await;
    assert_eq!(source.calls(), calls);
    // The sender went away with the task.
    assert!(rx.changed().await.is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn stop_cancels_a_fetch_in_flight() {
    let mut source = Scripted::new(vec![Ok(fetched(&[1]))]);
    source.delay = Duration::from_secs(60);
    let poller = Poller::spawn(source.clone(), PERIOD, clock());
    let rx = poller.subscribe();

    // Let the first fetch start, then tear down before it completes.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls(), 1);
    poller.stop().await;

    assert!(rx.borrow().fetched_at.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn dropping_the_handle_ends_the_loop() {
    let source = Scripted::new(vec![Ok(fetched(&[1]))]);
    let poller = Poller::spawn(source.clone(), PERIOD, clock());
    let mut rx = poller.subscribe();

    tokio::time::sleep(PERIOD * 2 + Duration::from_secs(1)).await;
    let calls = source.calls();
    assert_eq!(calls, 3);

    drop(poller);
    tokio::time::sleep(PERIOD * 12).await;
    assert_eq!(source.calls(), calls);
    rx.borrow_and_update();
    assert!(rx.changed().await.is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn dropping_the_handle_cancels_a_fetch_in_flight() {
    let mut source = Scripted::new(vec![Ok(fetched(&[1]))]);
    source.delay = Duration::from_secs(60);
    let poller = Poller::spawn(source.clone(), PERIOD, clock());
    let mut rx = poller.subscribe();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls(), 1);
    drop(poller);

    // The sender closes without ever publishing the slow result.
    assert!(rx.changed().await.is_err());
    assert!(rx.borrow().fetched_at.is_none());
    assert_eq!(source.in_flight.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn refresh_fetches_before_the_next_tick() {
    let source = Scripted::new(vec![Ok(fetched(&[1]))]);
    let poller = Poller::spawn(source.clone(), Duration::from_secs(3600), clock());
    let mut rx = poller.subscribe();
    rx.changed().await.unwrap();

    poller.refresh();
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
      .await
      .expect("refresh should not wait for the interval")
      .unwrap();
    assert_eq!(source.calls(), 2);
  }

  #[test]
  fn identical_data_leaves_snapshot_equal() {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 5).unwrap();
    let mut a = Snapshot::default();
    a.apply(Ok(fetched(&[1])), at);
    let mut b = a.clone();
    b.apply(Ok(fetched(&[1])), at);
    assert_eq!(a, b);
  }
}
