//! Runner and clinician bindings and their audit trail.
//!
//! Each event has two independent slots. A slot is bound once by
//! [`crate::store::EventStore::assign`] and only ever changes through an
//! explicit [`crate::store::EventStore::reassign`]; both append an
//! [`AssignmentRecord`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::event::EventId;

/// An assignable role on an event.
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
pub enum Slot {
  Runner,
  Clinician,
}

impl Slot {
  pub fn as_str(self) -> &'static str { self.into() }
}

impl fmt::Display for Slot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One binding of a staff identity to a slot. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
  pub assignment_id:     Uuid,
  pub event_id:          EventId,
  pub slot:              Slot,
  pub staff_id:          String,
  /// The identity this record displaced; `None` for a first binding.
  pub previous_staff_id: Option<String>,
  pub reason:            Option<String>,
  pub recorded_at:       DateTime<Utc>,
}

impl AssignmentRecord {
  pub fn is_reassignment(&self) -> bool { self.previous_staff_id.is_some() }
}
