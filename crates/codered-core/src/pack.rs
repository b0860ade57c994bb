//! Blood-product packs dispatched under a Code Red event.
//!
//! Packs are append-only: once dispatched a pack is never removed from its
//! event, it only moves forward through [`PackState`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;

// ─── Identity ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PackId(pub Uuid);

impl PackId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for PackId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for PackId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

// ─── Product ─────────────────────────────────────────────────────────────────

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
pub enum ProductType {
  RedCells,
  Plasma,
  Platelets,
  Cryoprecipitate,
}

impl ProductType {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn label(self) -> &'static str {
    match self {
      Self::RedCells => "Red cells",
      Self::Plasma => "Plasma",
      Self::Platelets => "Platelets",
      Self::Cryoprecipitate => "Cryo",
    }
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Where a pack is in its journey from the lab to the patient.
///
/// ```text
/// dispatched ──► delivered ──► consumed
///      │              │
///      └──────────────┴──────► returned
/// ```
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
pub enum PackState {
  Dispatched,
  Delivered,
  Consumed,
  Returned,
}

impl PackState {
  pub fn as_str(self) -> &'static str { self.into() }

  /// Whether a pack in `self` may move to `next`. Staying put is not a
  /// transition; callers treat it as a no-op.
  pub fn can_transition_to(self, next: PackState) -> bool {
    use PackState::*;
    matches!(
      (self, next),
      (Dispatched, Delivered)
        | (Dispatched, Returned)
        | (Delivered, Consumed)
        | (Delivered, Returned)
    )
  }
}

impl fmt::Display for PackState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Pack ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pack {
  pub pack_id:       PackId,
  /// 1-based dispatch order within the parent event.
  pub sequence:      u32,
  pub product:       ProductType,
  /// Label printed on the bag, when the lab records one.
  pub unit_number:   Option<String>,
  pub state:         PackState,
  pub dispatched_at: DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

/// Input to [`crate::store::EventStore::add_pack`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPack {
  pub product:     ProductType,
  #[serde(default)]
  pub unit_number: Option<String>,
}

impl NewPack {
  pub fn new(product: ProductType) -> Self {
    Self { product, unit_number: None }
  }
}

/// Pack totals per state, as shown on the event cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackCounts {
  pub total:      usize,
  pub dispatched: usize,
  pub delivered:  usize,
  pub consumed:   usize,
  pub returned:   usize,
}

impl PackCounts {
  pub fn tally(packs: &[Pack]) -> Self {
    packs.iter().fold(Self::default(), |mut acc, pack| {
      acc.total += 1;
      match pack.state {
        PackState::Dispatched => acc.dispatched += 1,
        PackState::Delivered => acc.delivered += 1,
        PackState::Consumed => acc.consumed += 1,
        PackState::Returned => acc.returned += 1,
      }
      acc
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use PackState::*;

  #[test]
  fn forward_transitions_are_allowed() {
    assert!(Dispatched.can_transition_to(Delivered));
    assert!(Dispatched.can_transition_to(Returned));
    assert!(Delivered.can_transition_to(Consumed));
    assert!(Delivered.can_transition_to(Returned));
  }

  #[test]
  fn terminal_states_never_move() {
    for next in [Dispatched, Delivered, Consumed, Returned] {
      assert!(!Consumed.can_transition_to(next));
      assert!(!Returned.can_transition_to(next));
    }
  }

  #[test]
  fn consumption_requires_delivery_first() {
    assert!(!Dispatched.can_transition_to(Consumed));
    assert!(!Delivered.can_transition_to(Dispatched));
  }
}
