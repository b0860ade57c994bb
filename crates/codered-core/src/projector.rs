//! Status projection: derived fields computed on every read.
//!
//! Nothing here is stored. Elapsed time depends on "now", so a
//! [`CodeRedView`] is only valid for the instant it was projected at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{event::CodeRedEvent, pack::PackCounts};

/// Whether an event is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
  Active,
  Resolved,
}

/// An event as served to the dashboards: stored fields plus derived ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRedView {
  #[serde(flatten)]
  pub event:           CodeRedEvent,
  pub status:          EventStatus,
  pub elapsed_minutes: i64,
  /// `elapsed_minutes` rendered as `"Mm"` or `"Hh Mm"`.
  pub elapsed:         String,
  pub pack_counts:     PackCounts,
}

/// Whole minutes from `since` to `now`, clamped at zero.
pub fn elapsed_minutes(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
  (now - since).num_minutes().max(0)
}

/// `"Mm"` below an hour, `"Hh Mm"` from 60 minutes on.
pub fn format_elapsed(minutes: i64) -> String {
  let minutes = minutes.max(0);
  let (hours, rest) = (minutes / 60, minutes % 60);
  if hours > 0 {
    format!("{hours}h {rest}m")
  } else {
    format!("{rest}m")
  }
}

/// Whole minutes `event` has been running as of `now`. A resolved event's
/// clock stops at its resolution time.
pub fn minutes_running(event: &CodeRedEvent, now: DateTime<Utc>) -> i64 {
  let until = event
    .resolution
    .as_ref()
    .map_or(now, |r| r.resolved_at.min(now));
  elapsed_minutes(event.activation_time, until)
}

pub fn status_of(event: &CodeRedEvent) -> EventStatus {
  if event.is_active() {
    EventStatus::Active
  } else {
    EventStatus::Resolved
  }
}

/// Project `event` as seen at `now`. A resolved event's elapsed value is
/// the total duration of the protocol.
pub fn project(event: CodeRedEvent, now: DateTime<Utc>) -> CodeRedView {
  let minutes = minutes_running(&event, now);

  CodeRedView {
    status:          status_of(&event),
    elapsed_minutes: minutes,
    elapsed:         format_elapsed(minutes),
    pack_counts:     PackCounts::tally(&event.packs),
    event,
  }
}
