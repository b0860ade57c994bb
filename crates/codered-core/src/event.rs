//! The Code Red event: one activated massive-transfusion protocol.
//!
//! An event is created by a lab activation and never deleted. Its mutable
//! parts (slot bindings, packs, resolution) change only through the
//! operations on [`crate::store::EventStore`]; whether it is active is never
//! stored, only derived from the presence of a [`Resolution`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

use crate::{
  Result,
  assignment::Slot,
  error::required,
  pack::Pack,
};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Store-allocated event identifier. Positive, monotonically increasing and
/// safe to embed in a URL (`/runner?codeRedId=7`).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

// ─── Lab ─────────────────────────────────────────────────────────────────────

/// The laboratory that activated the protocol.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LabType {
  MainLab,
  SatelliteLab,
}

impl LabType {
  /// The stable discriminant used on the wire and in storage.
  pub fn as_str(self) -> &'static str { self.into() }

  /// Human-readable name shown on dashboards.
  pub fn label(self) -> &'static str {
    match self {
      Self::MainLab => "Main Lab",
      Self::SatelliteLab => "Satellite Lab",
    }
  }
}

impl fmt::Display for LabType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// The marker that closes an event. Present at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
  pub resolved_at: DateTime<Utc>,
  pub resolved_by: Option<String>,
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A Code Red event together with its pack manifest, exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRedEvent {
  pub id:                    EventId,
  pub lab_type:              LabType,
  pub location:              String,
  #[serde(rename = "patientMRN")]
  pub patient_mrn:           String,
  /// Stamped by the store when it accepts the activation; never changes.
  pub activation_time:       DateTime<Utc>,
  pub assigned_runner_id:    Option<String>,
  pub assigned_clinician_id: Option<String>,
  pub resolution:            Option<Resolution>,
  /// Dispatch order, oldest first.
  pub packs:                 Vec<Pack>,
}

impl CodeRedEvent {
  pub fn is_active(&self) -> bool { self.resolution.is_none() }

  /// The identity bound to `slot`, if any.
  pub fn assignee(&self, slot: Slot) -> Option<&str> {
    match slot {
      Slot::Runner => self.assigned_runner_id.as_deref(),
      Slot::Clinician => self.assigned_clinician_id.as_deref(),
    }
  }
}

// ─── NewCodeRed ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::EventStore::create_event`].
/// `id` and `activation_time` are always set by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCodeRed {
  pub lab_type:    LabType,
  pub location:    String,
  #[serde(rename = "patientMRN")]
  pub patient_mrn: String,
}

impl NewCodeRed {
  pub fn new(
    lab_type: LabType,
    location: impl Into<String>,
    patient_mrn: impl Into<String>,
  ) -> Self {
    Self {
      lab_type,
      location: location.into(),
      patient_mrn: patient_mrn.into(),
    }
  }

  /// Trim free-text fields and reject blanks.
  pub fn normalized(self) -> Result<Self> {
    Ok(Self {
      lab_type:    self.lab_type,
      location:    required("location", &self.location)?,
      patient_mrn: required("patientMRN", &self.patient_mrn)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  #[test]
  fn lab_type_round_trips_through_its_discriminant() {
    for lab in [LabType::MainLab, LabType::SatelliteLab] {
      assert_eq!(lab.as_str().parse::<LabType>().unwrap(), lab);
    }
    assert_eq!(LabType::SatelliteLab.as_str(), "satellite_lab");
  }

  #[test]
  fn normalized_trims_and_rejects_blank_fields() {
    let ok = NewCodeRed::new(LabType::MainLab, "  Resus Bay 2 ", " 12345 ")
      .normalized()
      .unwrap();
    assert_eq!(ok.location, "Resus Bay 2");
    assert_eq!(ok.patient_mrn, "12345");

    let err = NewCodeRed::new(LabType::MainLab, "Resus", "   ")
      .normalized()
      .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
  }

  #[test]
  fn event_serialises_with_the_dashboard_field_names() {
    let event = CodeRedEvent {
      id:                    EventId(3),
      lab_type:              LabType::MainLab,
      location:              "ED Resus".into(),
      patient_mrn:           "12345".into(),
      activation_time:       Utc::now(),
      assigned_runner_id:    None,
      assigned_clinician_id: Some("C1".into()),
      resolution:            None,
      packs:                 Vec::new(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["id"], 3);
    assert_eq!(json["labType"], "main_lab");
    assert_eq!(json["patientMRN"], "12345");
    assert_eq!(json["assignedClinicianId"], "C1");
    assert!(json["assignedRunnerId"].is_null());
    assert!(json["packs"].as_array().unwrap().is_empty());
  }
}
