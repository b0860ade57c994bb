//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical order is chronological order. Enums are stored as
//! their snake_case discriminants. UUIDs are hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use codered_core::{
  assignment::{AssignmentRecord, Slot},
  event::{CodeRedEvent, EventId, LabType, Resolution},
  pack::{Pack, PackId, PackState, ProductType},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

/// Parse a strum-backed discriminant, naming the column on failure.
fn decode_enum<T: FromStr>(column: &str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::Decode(format!("{column}: {s:?}")))
}

pub fn slot_column(slot: Slot) -> &'static str {
  match slot {
    Slot::Runner => "assigned_runner_id",
    Slot::Clinician => "assigned_clinician_id",
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `events` row.
pub struct RawEvent {
  pub id:                    i64,
  pub lab_type:              String,
  pub location:              String,
  pub patient_mrn:           String,
  pub activation_time:       String,
  pub assigned_runner_id:    Option<String>,
  pub assigned_clinician_id: Option<String>,
  pub resolved_at:           Option<String>,
  pub resolved_by:           Option<String>,
}

/// Column list matching [`RawEvent::from_row`].
pub const EVENT_COLUMNS: &str = "id, lab_type, location, patient_mrn, activation_time, \
   assigned_runner_id, assigned_clinician_id, resolved_at, resolved_by";

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                    row.get(0)?,
      lab_type:              row.get(1)?,
      location:              row.get(2)?,
      patient_mrn:           row.get(3)?,
      activation_time:       row.get(4)?,
      assigned_runner_id:    row.get(5)?,
      assigned_clinician_id: row.get(6)?,
      resolved_at:           row.get(7)?,
      resolved_by:           row.get(8)?,
    })
  }

  pub fn into_event(self, packs: Vec<RawPack>) -> Result<CodeRedEvent> {
    let resolution = self
      .resolved_at
      .as_deref()
      .map(|at| {
        Ok::<_, Error>(Resolution {
          resolved_at: decode_dt(at)?,
          resolved_by: self.resolved_by.clone(),
        })
      })
      .transpose()?;

    Ok(CodeRedEvent {
      id: EventId(self.id),
      lab_type: decode_enum::<LabType>("lab_type", &self.lab_type)?,
      location: self.location,
      patient_mrn: self.patient_mrn,
      activation_time: decode_dt(&self.activation_time)?,
      assigned_runner_id: self.assigned_runner_id,
      assigned_clinician_id: self.assigned_clinician_id,
      resolution,
      packs: packs
        .into_iter()
        .map(RawPack::into_pack)
        .collect::<Result<_>>()?,
    })
  }
}

/// Raw strings read directly from a `packs` row.
pub struct RawPack {
  pub pack_id:       String,
  pub event_id:      i64,
  pub sequence:      u32,
  pub product:       String,
  pub unit_number:   Option<String>,
  pub state:         String,
  pub dispatched_at: String,
  pub updated_at:    String,
}

/// Column list matching [`RawPack::from_row`].
pub const PACK_COLUMNS: &str = "pack_id, event_id, sequence, product, unit_number, \
   state, dispatched_at, updated_at";

impl RawPack {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      pack_id:       row.get(0)?,
      event_id:      row.get(1)?,
      sequence:      row.get(2)?,
      product:       row.get(3)?,
      unit_number:   row.get(4)?,
      state:         row.get(5)?,
      dispatched_at: row.get(6)?,
      updated_at:    row.get(7)?,
    })
  }

  pub fn into_pack(self) -> Result<Pack> {
    Ok(Pack {
      pack_id:       PackId(decode_uuid(&self.pack_id)?),
      sequence:      self.sequence,
      product:       decode_enum::<ProductType>("product", &self.product)?,
      unit_number:   self.unit_number,
      state:         decode_enum::<PackState>("state", &self.state)?,
      dispatched_at: decode_dt(&self.dispatched_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `assignments` row.
pub struct RawAssignment {
  pub assignment_id:     String,
  pub event_id:          i64,
  pub slot:              String,
  pub staff_id:          String,
  pub previous_staff_id: Option<String>,
  pub reason:            Option<String>,
  pub recorded_at:       String,
}

impl RawAssignment {
  pub fn into_record(self) -> Result<AssignmentRecord> {
    Ok(AssignmentRecord {
      assignment_id:     decode_uuid(&self.assignment_id)?,
      event_id:          EventId(self.event_id),
      slot:              decode_enum::<Slot>("slot", &self.slot)?,
      staff_id:          self.staff_id,
      previous_staff_id: self.previous_staff_id,
      reason:            self.reason,
      recorded_at:       decode_dt(&self.recorded_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 9, 59, 59).unwrap();
    let earlier = encode_dt(base);
    let later = encode_dt(base + Duration::microseconds(1500));
    assert!(earlier < later, "{earlier} !< {later}");
    assert_eq!(earlier.len(), later.len());
    assert_eq!(decode_dt(&later).unwrap(), base + Duration::microseconds(1500));
  }

  #[test]
  fn unknown_discriminant_names_the_column() {
    let err = decode_enum::<PackState>("state", "lost").unwrap_err();
    assert!(err.to_string().contains("state"), "{err}");
  }
}
