//! Application state machine and key dispatcher.
//!
//! The app never talks to the network itself. Keys that change server state
//! come back from [`App::handle_key`] as an [`Op`] for the event loop to run,
//! which keeps every decision here testable without a server.

use chrono::{DateTime, Utc};
use codered_core::{
  assignment::Slot,
  event::EventId,
  pack::{PackId, PackState, ProductType},
  projector::{CodeRedView, format_elapsed, minutes_running},
  role::{Action, Role},
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::poller::Snapshot;

// ─── Ops ──────────────────────────────────────────────────────────────────────

/// A server write requested from the keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
  Claim { event: EventId, slot: Slot, staff_id: String },
  Dispatch { event: EventId, product: ProductType },
  MovePack { event: EventId, pack: PackId, state: PackState },
  Resolve { event: EventId },
}

/// What the event loop should do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Continue,
  Run(Op),
  Quit,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level dashboard state.
pub struct App {
  pub role:  Role,
  /// Staff id for runners and clinicians, lab type for labs.
  pub scope: Option<String>,

  /// Latest data from the poller.
  pub snapshot: Snapshot,

  /// The event under the cursor, tracked by id so refreshes that reorder or
  /// repeat rows keep it.
  pub selected: Option<EventId>,

  /// Display time, advanced by the clock tick independently of polling.
  pub now: DateTime<Utc>,

  /// Set after the first `X`; a second `X` on the same event resolves it.
  pub confirm_resolve: Option<EventId>,

  /// One-line status message shown in the status bar.
  pub status_msg: String,
}

impl App {
  pub fn new(role: Role, scope: Option<String>, now: DateTime<Utc>) -> Self {
    Self {
      role,
      scope,
      snapshot: Snapshot::default(),
      selected: None,
      now,
      confirm_resolve: None,
      status_msg: String::new(),
    }
  }

  // ── Data ──────────────────────────────────────────────────────────────────

  /// Take a new snapshot from the poller.
  pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
    self.snapshot = snapshot;
    let still_listed = self
      .selected
      .is_some_and(|id| self.rows().iter().any(|v| v.event.id == id));
    if !still_listed {
      // Prefer this role's own event, then the top of the list.
      self.selected = self
        .own_listed_event()
        .or_else(|| self.rows().first().map(|v| v.event.id));
    }
    if self.confirm_resolve.is_some() && self.confirm_resolve != self.selected {
      self.confirm_resolve = None;
    }
  }

  /// Advance the display clock.
  pub fn tick(&mut self, now: DateTime<Utc>) { self.now = now; }

  pub fn rows(&self) -> &[CodeRedView] { &self.snapshot.all_active }

  pub fn selected_view(&self) -> Option<&CodeRedView> {
    let id = self.selected?;
    self.rows().iter().find(|v| v.event.id == id)
  }

  fn selected_index(&self) -> Option<usize> {
    let id = self.selected?;
    self.rows().iter().position(|v| v.event.id == id)
  }

  /// This role's own event, if it also appears in the list.
  fn own_listed_event(&self) -> Option<EventId> {
    self
      .snapshot
      .active
      .as_ref()
      .map(|v| v.event.id)
      .filter(|id| self.rows().iter().any(|v| v.event.id == *id))
  }

  /// Whether `view` is the one the server picked for this role.
  pub fn is_mine(&self, view: &CodeRedView) -> bool {
    self
      .snapshot
      .active
      .as_ref()
      .is_some_and(|mine| mine.event.id == view.event.id)
  }

  /// Elapsed time of `view` as of the display clock, not the fetch time.
  pub fn elapsed(&self, view: &CodeRedView) -> String {
    format_elapsed(minutes_running(&view.event, self.now))
  }

  /// Staff id used for claims, if this role has one.
  fn staff_id(&self) -> Option<&str> {
    match self.role {
      Role::Lab => None,
      Role::Runner | Role::Clinician => {
        self.scope.as_deref().filter(|s| !s.trim().is_empty())
      }
    }
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  pub fn handle_key(&mut self, key: KeyEvent) -> Outcome {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Outcome::Quit;
    }

    self.status_msg.clear();
    let resolve_pending = self.confirm_resolve.take();

    match key.code {
      KeyCode::Char('q') => Outcome::Quit,

      KeyCode::Down | KeyCode::Char('j') => {
        self.move_cursor(1);
        Outcome::Continue
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.move_cursor(-1);
        Outcome::Continue
      }
      KeyCode::Home | KeyCode::Char('m') => {
        // Jump back to this role's own event.
        // The two reads are separate requests; only jump to a listed row.
        if let Some(id) = self.own_listed_event() {
          self.selected = Some(id);
        }
        Outcome::Continue
      }

      KeyCode::Char('c') => self.claim(),
      KeyCode::Char(c @ '1'..='4') => self.dispatch(c),
      KeyCode::Char('d') => self.move_pack(Action::MarkDelivered, PackState::Delivered),
      KeyCode::Char('u') => self.move_pack(Action::MarkConsumed, PackState::Consumed),
      KeyCode::Char('b') => self.move_pack(Action::ReturnPack, PackState::Returned),
      KeyCode::Char('X') => self.resolve(resolve_pending),

      _ => Outcome::Continue,
    }
  }

  fn move_cursor(&mut self, delta: isize) {
    let len = self.rows().len();
    if len == 0 {
      return;
    }
    let next = match self.selected_index() {
      Some(i) => i.saturating_add_signed(delta).min(len - 1),
      None => 0,
    };
    self.selected = Some(self.rows()[next].event.id);
  }

  /// Check the role may `action` on the selected event.
  fn target(&mut self, action: Action) -> Option<EventId> {
    if !self.role.can(action) {
      self.status_msg = format!("{} cannot do that", self.role);
      return None;
    }
    let id = self.selected_view().map(|v| v.event.id);
    if id.is_none() {
      self.status_msg = "No event selected".into();
    }
    id
  }

  fn claim(&mut self) -> Outcome {
    let action = match self.role {
      Role::Runner => Action::ClaimRunner,
      Role::Clinician => Action::ClaimClinician,
      Role::Lab => {
        self.status_msg = "lab cannot claim a slot".into();
        return Outcome::Continue;
      }
    };
    let Some(event) = self.target(action) else { return Outcome::Continue };
    let staff_id = self.staff_id().map(str::to_owned);
    let (Some(slot), Some(staff_id)) = (self.role.slot(), staff_id) else {
      self.status_msg = "Set --scope to your staff id to claim".into();
      return Outcome::Continue;
    };
    Outcome::Run(Op::Claim { event, slot, staff_id })
  }

  fn dispatch(&mut self, key: char) -> Outcome {
    let product = match key {
      '1' => ProductType::RedCells,
      '2' => ProductType::Plasma,
      '3' => ProductType::Platelets,
      _ => ProductType::Cryoprecipitate,
    };
    match self.target(Action::DispatchPack) {
      Some(event) => Outcome::Run(Op::Dispatch { event, product }),
      None => Outcome::Continue,
    }
  }

  /// Move the oldest pack that can make the transition.
  fn move_pack(&mut self, action: Action, state: PackState) -> Outcome {
    let Some(event) = self.target(action) else { return Outcome::Continue };
    let pack = self.selected_view().and_then(|v| {
      v.event
        .packs
        .iter()
        .find(|p| p.state.can_transition_to(state))
        .map(|p| p.pack_id)
    });
    match pack {
      Some(pack) => Outcome::Run(Op::MovePack { event, pack, state }),
      None => {
        self.status_msg = format!("No pack can be marked {state}");
        Outcome::Continue
      }
    }
  }

  fn resolve(&mut self, pending: Option<EventId>) -> Outcome {
    let Some(event) = self.target(Action::Resolve) else { return Outcome::Continue };
    if pending == Some(event) {
      return Outcome::Run(Op::Resolve { event });
    }
    self.confirm_resolve = Some(event);
    self.status_msg = format!("Press X again to resolve {event}");
    Outcome::Continue
  }
}
