//! The `EventStore` trait: event persistence plus the assignment engine.
//!
//! The trait is implemented by storage backends (e.g. `codered-store-sqlite`).
//! Higher layers (`codered-api`, the gateway) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use crate::{
  Error,
  assignment::{AssignmentRecord, Slot},
  event::{CodeRedEvent, EventId, NewCodeRed},
  pack::{NewPack, Pack, PackId, PackState},
};

/// A backend error that may wrap one of the domain outcomes in [`Error`].
///
/// Lets the HTTP layer tell "runner already assigned" apart from "disk full"
/// without knowing which backend it is talking to.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn domain(&self) -> Option<&Error>;
}

impl StoreError for Error {
  fn domain(&self) -> Option<&Error> { Some(self) }
}

/// Abstraction over a Code Red event store backend.
///
/// Events are never deleted. All writes touching one event are applied in
/// the order the store receives them, and a read started after a write
/// completes observes it.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait EventStore: Send + Sync {
  type Error: StoreError;

  // ── Events ────────────────────────────────────────────────────────────

  /// Activate a new Code Red. The store allocates the id and stamps
  /// `activation_time` with its own clock.
  fn create_event(
    &self,
    input: NewCodeRed,
  ) -> impl Future<Output = Result<CodeRedEvent, Self::Error>> + Send + '_;

  /// Retrieve an event (active or resolved) with its packs. Returns `None`
  /// if not found.
  fn get_event(
    &self,
    id: EventId,
  ) -> impl Future<Output = Result<Option<CodeRedEvent>, Self::Error>> + Send + '_;

  /// All unresolved events, most recently activated first. The order is
  /// stable across reads when nothing was written in between.
  fn list_active(
    &self,
  ) -> impl Future<Output = Result<Vec<CodeRedEvent>, Self::Error>> + Send + '_;

  /// Every retained event in the same order as [`Self::list_active`],
  /// optionally including resolved ones.
  fn list_events(
    &self,
    include_resolved: bool,
  ) -> impl Future<Output = Result<Vec<CodeRedEvent>, Self::Error>> + Send + '_;

  /// Close an event. Fails with [`Error::EventResolved`] if it already is.
  fn resolve(
    &self,
    id: EventId,
    resolved_by: Option<String>,
  ) -> impl Future<Output = Result<CodeRedEvent, Self::Error>> + Send + '_;

  // ── Assignment ────────────────────────────────────────────────────────

  /// Bind `staff_id` to `slot` on an active event.
  ///
  /// Re-binding the identity already in the slot succeeds without change.
  /// A different identity fails with [`Error::Conflict`]. The check and the
  /// write are atomic: of two racing callers exactly one wins.
  fn assign(
    &self,
    id: EventId,
    slot: Slot,
    staff_id: String,
  ) -> impl Future<Output = Result<CodeRedEvent, Self::Error>> + Send + '_;

  /// Explicitly replace whoever holds `slot`. Always recorded in the
  /// assignment history unless `staff_id` already holds the slot.
  fn reassign(
    &self,
    id: EventId,
    slot: Slot,
    staff_id: String,
    reason: Option<String>,
  ) -> impl Future<Output = Result<CodeRedEvent, Self::Error>> + Send + '_;

  /// The append-only binding history of an event, oldest first.
  fn assignment_history(
    &self,
    id: EventId,
  ) -> impl Future<Output = Result<Vec<AssignmentRecord>, Self::Error>> + Send + '_;

  // ── Packs ─────────────────────────────────────────────────────────────

  /// Dispatch a pack under an active event.
  fn add_pack(
    &self,
    id: EventId,
    input: NewPack,
  ) -> impl Future<Output = Result<Pack, Self::Error>> + Send + '_;

  /// Move a pack along its state machine. Setting the current state again
  /// is a no-op.
  fn update_pack(
    &self,
    id: EventId,
    pack_id: PackId,
    state: PackState,
  ) -> impl Future<Output = Result<Pack, Self::Error>> + Send + '_;
}
