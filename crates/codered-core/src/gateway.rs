//! Query gateway: the read contract shared by every role's view.
//!
//! Reads go straight to the store and are projected against the injected
//! clock on the way out, so two reads a minute apart differ only in their
//! derived fields.

use std::sync::Arc;

use crate::{
  clock::Clock,
  event::{CodeRedEvent, EventId},
  projector::{CodeRedView, project},
  role::Viewer,
  store::EventStore,
};

pub struct Gateway<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S> Clone for Gateway<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      clock: Arc::clone(&self.clock),
    }
  }
}

impl<S: EventStore> Gateway<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
    Self { store, clock }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// The single event most relevant to `viewer`, or `None` when nothing
  /// active matches. Absence is not an error.
  pub async fn active_for(
    &self,
    viewer: &Viewer,
  ) -> Result<Option<CodeRedView>, S::Error> {
    let active = self.store.list_active().await?;
    let now = self.clock.now();
    Ok(viewer.pick(&active).cloned().map(|e| project(e, now)))
  }

  /// Every unresolved event with derived fields and packs. Empty, never
  /// absent, when nothing is active.
  pub async fn all_active(&self) -> Result<Vec<CodeRedView>, S::Error> {
    let active = self.store.list_active().await?;
    Ok(self.project_all(active))
  }

  /// Every retained event, for audit listings.
  pub async fn all(
    &self,
    include_resolved: bool,
  ) -> Result<Vec<CodeRedView>, S::Error> {
    let events = self.store.list_events(include_resolved).await?;
    Ok(self.project_all(events))
  }

  /// Direct lookup by id, resolved events included.
  pub async fn get(&self, id: EventId) -> Result<Option<CodeRedView>, S::Error> {
    let event = self.store.get_event(id).await?;
    Ok(event.map(|e| project(e, self.clock.now())))
  }

  /// Project a single event the caller already holds (e.g. a write result).
  pub fn view(&self, event: CodeRedEvent) -> CodeRedView {
    project(event, self.clock.now())
  }

  fn project_all(
    &self,
    events: Vec<CodeRedEvent>,
  ) -> Vec<CodeRedView> {
    let now = self.clock.now();
    events.into_iter().map(|e| project(e, now)).collect()
  }
}
