//! The three roles that watch a Code Red and what each may do.
//!
//! Every role reads events through the same gateway contract; they differ
//! only in which single event is "theirs" and in the actions they offer.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

use crate::{
  Error,
  assignment::Slot,
  event::{CodeRedEvent, LabType},
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Lab,
  Runner,
  Clinician,
}

/// Something a user can do to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  DispatchPack,
  ClaimRunner,
  ClaimClinician,
  MarkDelivered,
  MarkConsumed,
  ReturnPack,
  Resolve,
}

impl Role {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn can(self, action: Action) -> bool {
    use Action::*;
    match self {
      Self::Lab => matches!(action, DispatchPack | ReturnPack | Resolve),
      Self::Runner => matches!(action, ClaimRunner | MarkDelivered | ReturnPack),
      Self::Clinician => matches!(action, ClaimClinician | MarkConsumed | Resolve),
    }
  }

  /// The slot this role binds itself to, if it has one.
  pub fn slot(self) -> Option<Slot> {
    match self {
      Self::Lab => None,
      Self::Runner => Some(Slot::Runner),
      Self::Clinician => Some(Slot::Clinician),
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Viewer ──────────────────────────────────────────────────────────────────

/// A role plus the optional scope that narrows "my event".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
  /// A lab, optionally restricted to events it activated.
  Lab(Option<LabType>),
  /// A runner, optionally identified by staff id.
  Runner(Option<String>),
  /// A clinician, optionally identified by staff id.
  Clinician(Option<String>),
}

impl Viewer {
  /// Build a viewer from the `role` / `scope` pair used on the wire.
  /// Blank scopes count as absent.
  pub fn from_parts(role: Role, scope: Option<&str>) -> crate::Result<Self> {
    let scope = scope.map(str::trim).filter(|s| !s.is_empty());
    Ok(match role {
      Role::Lab => Viewer::Lab(
        scope
          .map(|s| {
            LabType::from_str(s)
              .map_err(|_| Error::Invalid(format!("unknown lab type {s:?}")))
          })
          .transpose()?,
      ),
      Role::Runner => Viewer::Runner(scope.map(str::to_owned)),
      Role::Clinician => Viewer::Clinician(scope.map(str::to_owned)),
    })
  }

  /// Whether `event` belongs to this viewer's scope. Unscoped viewers claim
  /// every event.
  pub fn claims(&self, event: &CodeRedEvent) -> bool {
    match self {
      Self::Lab(None) | Self::Runner(None) | Self::Clinician(None) => true,
      Self::Lab(Some(lab)) => event.lab_type == *lab,
      Self::Runner(Some(id)) => event.assignee(Slot::Runner) == Some(id.as_str()),
      Self::Clinician(Some(id)) => {
        event.assignee(Slot::Clinician) == Some(id.as_str())
      }
    }
  }

  /// The single most relevant event among `active`, which must already be
  /// ordered most-recent-first.
  pub fn pick<'a>(&self, active: &'a [CodeRedEvent]) -> Option<&'a CodeRedEvent> {
    active.iter().find(|e| e.is_active() && self.claims(e))
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::event::EventId;

  fn event(id: i64, lab: LabType, runner: Option<&str>) -> CodeRedEvent {
    CodeRedEvent {
      id:                    EventId(id),
      lab_type:              lab,
      location:              format!("Bay {id}"),
      patient_mrn:           format!("MRN{id}"),
      activation_time:       Utc::now(),
      assigned_runner_id:    runner.map(str::to_owned),
      assigned_clinician_id: None,
      resolution:            None,
      packs:                 Vec::new(),
    }
  }

  #[test]
  fn capabilities_are_disjoint_where_it_matters() {
    assert!(Role::Lab.can(Action::DispatchPack));
    assert!(!Role::Runner.can(Action::DispatchPack));
    assert!(Role::Runner.can(Action::ClaimRunner));
    assert!(!Role::Clinician.can(Action::ClaimRunner));
    assert!(Role::Clinician.can(Action::MarkConsumed));
    assert_eq!(Role::Lab.slot(), None);
    assert_eq!(Role::Clinician.slot(), Some(Slot::Clinician));
  }

  #[test]
  fn unscoped_viewer_picks_most_recent() {
    let events = vec![
      event(3, LabType::SatelliteLab, None),
      event(2, LabType::MainLab, None),
    ];
    let picked = Viewer::Lab(None).pick(&events).unwrap();
    assert_eq!(picked.id, EventId(3));
  }

  #[test]
  fn lab_scope_filters_by_origin() {
    let events = vec![
      event(3, LabType::SatelliteLab, None),
      event(2, LabType::MainLab, None),
    ];
    let viewer = Viewer::from_parts(Role::Lab, Some("main_lab")).unwrap();
    assert_eq!(viewer.pick(&events).unwrap().id, EventId(2));
  }

  #[test]
  fn runner_scope_finds_their_assignment() {
    let events = vec![
      event(3, LabType::MainLab, Some("R9")),
      event(2, LabType::MainLab, Some("R1")),
    ];
    let viewer = Viewer::from_parts(Role::Runner, Some("R1")).unwrap();
    assert_eq!(viewer.pick(&events).unwrap().id, EventId(2));
    let nobody = Viewer::from_parts(Role::Runner, Some("R5")).unwrap();
    assert!(nobody.pick(&events).is_none());
  }

  #[test]
  fn blank_scope_is_unscoped_and_bad_lab_is_rejected() {
    assert_eq!(
      Viewer::from_parts(Role::Clinician, Some("  ")).unwrap(),
      Viewer::Clinician(None)
    );
    assert!(Viewer::from_parts(Role::Lab, Some("basement")).is_err());
  }
}
