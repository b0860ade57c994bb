//! Error types for `codered-core`.

use thiserror::Error;

use crate::{
  assignment::Slot,
  event::EventId,
  pack::{PackId, PackState},
};

/// Domain outcomes that a caller is expected to handle explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("code red {0} not found")]
  EventNotFound(EventId),

  #[error("pack {0} not found")]
  PackNotFound(PackId),

  #[error("code red {event} already has {slot} {current} assigned")]
  Conflict {
    event:   EventId,
    slot:    Slot,
    /// The identity currently bound to the slot.
    current: String,
  },

  #[error("code red {0} is already resolved")]
  EventResolved(EventId),

  #[error("pack {pack} cannot move from {from} to {to}")]
  InvalidPackTransition {
    pack: PackId,
    from: PackState,
    to:   PackState,
  },

  #[error("invalid input: {0}")]
  Invalid(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Trim `value` and reject it if nothing is left.
pub(crate) fn required(field: &str, value: &str) -> Result<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(Error::Invalid(format!("{field} must not be empty")));
  }
  Ok(trimmed.to_owned())
}
