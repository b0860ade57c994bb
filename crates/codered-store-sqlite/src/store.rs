//! [`SqliteStore`], the SQLite implementation of [`EventStore`].

use std::{collections::HashMap, path::Path, sync::Arc};

use codered_core::{
  Error as CoreError,
  assignment::{AssignmentRecord, Slot},
  clock::{Clock, SystemClock},
  event::{CodeRedEvent, EventId, NewCodeRed},
  pack::{NewPack, Pack, PackId, PackState},
  store::EventStore,
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    EVENT_COLUMNS, PACK_COLUMNS, RawAssignment, RawEvent, RawPack, encode_dt,
    encode_uuid, slot_column,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Code Red event store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every clone
/// shares the same background thread, so writes stay serialized.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  clock: Arc<dyn Clock>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  /// Replace the clock used to stamp activations, packs and resolutions.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, clock: Arc::new(SystemClock) })
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

type LoadedEvent = (RawEvent, Vec<RawPack>);

/// The lifecycle columns needed to validate a write.
struct Lifecycle {
  runner:    Option<String>,
  clinician: Option<String>,
  resolved:  bool,
}

impl Lifecycle {
  fn holder(&self, slot: Slot) -> Option<&str> {
    match slot {
      Slot::Runner => self.runner.as_deref(),
      Slot::Clinician => self.clinician.as_deref(),
    }
  }
}

fn load_lifecycle(conn: &Connection, id: i64) -> rusqlite::Result<Option<Lifecycle>> {
  conn
    .query_row(
      "SELECT assigned_runner_id, assigned_clinician_id, resolved_at IS NOT NULL
       FROM events WHERE id = ?1",
      rusqlite::params![id],
      |row| {
        Ok(Lifecycle {
          runner:    row.get(0)?,
          clinician: row.get(1)?,
          resolved:  row.get(2)?,
        })
      },
    )
    .optional()
}

/// Load a lifecycle that must exist, mapping absence to a domain error.
fn require_lifecycle(conn: &Connection, id: EventId) -> Result<Lifecycle> {
  load_lifecycle(conn, id.0)
    .map_err(tokio_rusqlite::Error::from)?
    .ok_or_else(|| CoreError::EventNotFound(id).into())
}

fn load_packs(conn: &Connection, event_id: i64) -> rusqlite::Result<Vec<RawPack>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PACK_COLUMNS} FROM packs WHERE event_id = ?1 ORDER BY sequence"
  ))?;
  let packs = stmt
    .query_map(rusqlite::params![event_id], RawPack::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(packs)
}

fn load_event(conn: &Connection, id: i64) -> rusqlite::Result<Option<LoadedEvent>> {
  let raw = conn
    .query_row(
      &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
      rusqlite::params![id],
      RawEvent::from_row,
    )
    .optional()?;
  match raw {
    Some(raw) => Ok(Some((raw, load_packs(conn, id)?))),
    None => Ok(None),
  }
}

/// Load events and all their packs in one pass, most recent first.
fn load_events(
  conn: &Connection,
  include_resolved: bool,
) -> rusqlite::Result<Vec<LoadedEvent>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {EVENT_COLUMNS} FROM events
     WHERE ?1 OR resolved_at IS NULL
     ORDER BY activation_time DESC, id DESC"
  ))?;
  let events = stmt
    .query_map(rusqlite::params![include_resolved], RawEvent::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut stmt = conn.prepare(&format!(
    "SELECT {PACK_COLUMNS} FROM packs
     WHERE event_id IN (SELECT id FROM events WHERE ?1 OR resolved_at IS NULL)
     ORDER BY event_id, sequence"
  ))?;
  let mut packs: HashMap<i64, Vec<RawPack>> = HashMap::new();
  for pack in stmt.query_map(rusqlite::params![include_resolved], RawPack::from_row)? {
    let pack = pack?;
    packs.entry(pack.event_id).or_default().push(pack);
  }

  Ok(
    events
      .into_iter()
      .map(|e| {
        let own = packs.remove(&e.id).unwrap_or_default();
        (e, own)
      })
      .collect(),
  )
}

/// Point `slot` at `staff_id` and append the audit record.
fn bind_slot(
  conn: &Connection,
  id: i64,
  slot: Slot,
  staff_id: &str,
  previous: Option<&str>,
  reason: Option<&str>,
  at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!("UPDATE events SET {} = ?1 WHERE id = ?2", slot_column(slot)),
    rusqlite::params![staff_id, id],
  )?;
  conn.execute(
    "INSERT INTO assignments (
       assignment_id, event_id, slot, staff_id, previous_staff_id, reason, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      id,
      slot.as_str(),
      staff_id,
      previous,
      reason,
      at,
    ],
  )?;
  Ok(())
}

fn loaded_or_missing(loaded: Option<LoadedEvent>, id: EventId) -> Result<LoadedEvent> {
  loaded.ok_or_else(|| CoreError::EventNotFound(id).into())
}

fn decode(loaded: LoadedEvent) -> Result<CodeRedEvent> {
  let (raw, packs) = loaded;
  raw.into_event(packs)
}

/// Trim an identity and reject blanks before it reaches the database.
fn staff(field: &str, value: String) -> Result<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(CoreError::Invalid(format!("{field} must not be empty")).into());
  }
  Ok(trimmed.to_owned())
}

fn sql(e: rusqlite::Error) -> Error { Error::Database(e.into()) }

// ─── EventStore impl ─────────────────────────────────────────────────────────

impl EventStore for SqliteStore {
  type Error = Error;

  // ── Events ────────────────────────────────────────────────────────────────

  async fn create_event(&self, input: NewCodeRed) -> Result<CodeRedEvent> {
    let input = input.normalized()?;
    let lab_str = input.lab_type.as_str();
    let clock = Arc::clone(&self.clock);

    let loaded = self
      .conn
      .call(move |conn| {
        // Stamp on the connection thread so times follow write order.
        let at_str = encode_dt(clock.now());
        conn.execute(
          "INSERT INTO events (lab_type, location, patient_mrn, activation_time)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![lab_str, input.location, input.patient_mrn, at_str],
        )?;
        let id = conn.last_insert_rowid();
        Ok(load_event(conn, id)?)
      })
      .await?;

    let event = match loaded {
      Some(loaded) => decode(loaded)?,
      None => return Err(Error::Decode("inserted event vanished".into())),
    };
    tracing::info!(
      event = %event.id,
      lab = %event.lab_type,
      location = %event.location,
      "code red activated"
    );
    Ok(event)
  }

  async fn get_event(&self, id: EventId) -> Result<Option<CodeRedEvent>> {
    let loaded = self
      .conn
      .call(move |conn| Ok(load_event(conn, id.0)?))
      .await?;
    loaded.map(decode).transpose()
  }

  async fn list_active(&self) -> Result<Vec<CodeRedEvent>> {
    self.list_events(false).await
  }

  async fn list_events(&self, include_resolved: bool) -> Result<Vec<CodeRedEvent>> {
    let loaded = self
      .conn
      .call(move |conn| Ok(load_events(conn, include_resolved)?))
      .await?;
    loaded.into_iter().map(decode).collect()
  }

  async fn resolve(
    &self,
    id: EventId,
    resolved_by: Option<String>,
  ) -> Result<CodeRedEvent> {
    let resolved_by = resolved_by
      .map(|s| s.trim().to_owned())
      .filter(|s| !s.is_empty());
    let clock = Arc::clone(&self.clock);

    let loaded: Result<LoadedEvent> = self
      .conn
      .call(move |conn| {
        let at_str = encode_dt(clock.now());
        let tx = conn.transaction()?;
        let outcome = (|| -> Result<LoadedEvent> {
          let lifecycle = require_lifecycle(&tx, id)?;
          if lifecycle.resolved {
            return Err(CoreError::EventResolved(id).into());
          }
          tx.execute(
            "UPDATE events SET resolved_at = ?1, resolved_by = ?2
             WHERE id = ?3 AND resolved_at IS NULL",
            rusqlite::params![at_str, resolved_by, id.0],
          )
          .map_err(sql)?;
          loaded_or_missing(load_event(&tx, id.0).map_err(sql)?, id)
        })();
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    let event = decode(loaded?)?;
    tracing::info!(event = %id, packs = event.packs.len(), "code red resolved");
    Ok(event)
  }

  // ── Assignment ────────────────────────────────────────────────────────────

  async fn assign(
    &self,
    id: EventId,
    slot: Slot,
    staff_id: String,
  ) -> Result<CodeRedEvent> {
    let staff_id = staff("staffId", staff_id)?;
    let clock = Arc::clone(&self.clock);
    let who = staff_id.clone();

    // Check-and-set in one transaction on the connection thread: no other
    // statement can run between the read of the slot and the write.
    let loaded: Result<(LoadedEvent, bool)> = self
      .conn
      .call(move |conn| {
        let at_str = encode_dt(clock.now());
        let tx = conn.transaction()?;
        let outcome = (|| -> Result<(LoadedEvent, bool)> {
          let lifecycle = require_lifecycle(&tx, id)?;
          if lifecycle.resolved {
            return Err(CoreError::EventResolved(id).into());
          }
          let changed = match lifecycle.holder(slot) {
            Some(current) if current == staff_id => false,
            Some(current) => {
              return Err(
                CoreError::Conflict {
                  event:   id,
                  slot,
                  current: current.to_owned(),
                }
                .into(),
              );
            }
            None => {
              bind_slot(&tx, id.0, slot, &staff_id, None, None, &at_str)
                .map_err(sql)?;
              true
            }
          };
          let loaded = loaded_or_missing(load_event(&tx, id.0).map_err(sql)?, id)?;
          Ok((loaded, changed))
        })();
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    let (loaded, changed) = loaded?;
    if changed {
      tracing::info!(event = %id, %slot, staff = %who, "slot assigned");
    } else {
      tracing::debug!(event = %id, %slot, staff = %who, "slot already held by caller");
    }
    decode(loaded)
  }

  async fn reassign(
    &self,
    id: EventId,
    slot: Slot,
    staff_id: String,
    reason: Option<String>,
  ) -> Result<CodeRedEvent> {
    let staff_id = staff("staffId", staff_id)?;
    let clock = Arc::clone(&self.clock);
    let who = staff_id.clone();

    let loaded: Result<(LoadedEvent, Option<String>)> = self
      .conn
      .call(move |conn| {
        let at_str = encode_dt(clock.now());
        let tx = conn.transaction()?;
        let outcome = (|| -> Result<(LoadedEvent, Option<String>)> {
          let lifecycle = require_lifecycle(&tx, id)?;
          if lifecycle.resolved {
            return Err(CoreError::EventResolved(id).into());
          }
          let previous = lifecycle.holder(slot).map(str::to_owned);
          if previous.as_deref() != Some(staff_id.as_str()) {
            bind_slot(
              &tx,
              id.0,
              slot,
              &staff_id,
              previous.as_deref(),
              reason.as_deref(),
              &at_str,
            )
            .map_err(sql)?;
          }
          let loaded = loaded_or_missing(load_event(&tx, id.0).map_err(sql)?, id)?;
          Ok((loaded, previous))
        })();
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    let (loaded, previous) = loaded?;
    tracing::info!(
      event = %id,
      %slot,
      staff = %who,
      previous = previous.as_deref().unwrap_or("-"),
      "slot reassigned"
    );
    decode(loaded)
  }

  async fn assignment_history(&self, id: EventId) -> Result<Vec<AssignmentRecord>> {
    let rows: Result<Vec<RawAssignment>> = self
      .conn
      .call(move |conn| {
        let outcome = (|| -> Result<Vec<RawAssignment>> {
          require_lifecycle(conn, id)?;
          let mut stmt = conn
            .prepare(
              "SELECT assignment_id, event_id, slot, staff_id, previous_staff_id,
                      reason, recorded_at
               FROM assignments WHERE event_id = ?1
               ORDER BY recorded_at, rowid",
            )
            .map_err(sql)?;
          let rows = stmt
            .query_map(rusqlite::params![id.0], |row| {
              Ok(RawAssignment {
                assignment_id:     row.get(0)?,
                event_id:          row.get(1)?,
                slot:              row.get(2)?,
                staff_id:          row.get(3)?,
                previous_staff_id: row.get(4)?,
                reason:            row.get(5)?,
                recorded_at:       row.get(6)?,
              })
            })
            .map_err(sql)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql)?;
          Ok(rows)
        })();
        Ok(outcome)
      })
      .await?;

    rows?.into_iter().map(RawAssignment::into_record).collect()
  }

  // ── Packs ─────────────────────────────────────────────────────────────────

  async fn add_pack(&self, id: EventId, input: NewPack) -> Result<Pack> {
    let pack_id = PackId::new();
    let pack_id_str = encode_uuid(pack_id.0);
    let product_str = input.product.as_str();
    let unit_number = input
      .unit_number
      .map(|s| s.trim().to_owned())
      .filter(|s| !s.is_empty());
    let clock = Arc::clone(&self.clock);

    let raw: Result<RawPack> = self
      .conn
      .call(move |conn| {
        let at_str = encode_dt(clock.now());
        let tx = conn.transaction()?;
        let outcome = (|| -> Result<RawPack> {
          let lifecycle = require_lifecycle(&tx, id)?;
          if lifecycle.resolved {
            return Err(CoreError::EventResolved(id).into());
          }
          let sequence: u32 = tx
            .query_row(
              "SELECT COALESCE(MAX(sequence), 0) + 1 FROM packs WHERE event_id = ?1",
              rusqlite::params![id.0],
              |row| row.get(0),
            )
            .map_err(sql)?;
          tx.execute(
            "INSERT INTO packs (
               pack_id, event_id, sequence, product, unit_number,
               state, dispatched_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, 'dispatched', ?6, ?6)",
            rusqlite::params![pack_id_str, id.0, sequence, product_str, unit_number, at_str],
          )
          .map_err(sql)?;
          tx.query_row(
            &format!("SELECT {PACK_COLUMNS} FROM packs WHERE pack_id = ?1"),
            rusqlite::params![pack_id_str],
            RawPack::from_row,
          )
          .map_err(sql)
        })();
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    let pack = raw?.into_pack()?;
    tracing::info!(
      event = %id,
      pack = %pack.pack_id,
      sequence = pack.sequence,
      product = pack.product.as_str(),
      "pack dispatched"
    );
    Ok(pack)
  }

  async fn update_pack(
    &self,
    id: EventId,
    pack_id: PackId,
    state: PackState,
  ) -> Result<Pack> {
    let pack_id_str = encode_uuid(pack_id.0);
    let clock = Arc::clone(&self.clock);

    let raw: Result<RawPack> = self
      .conn
      .call(move |conn| {
        let at_str = encode_dt(clock.now());
        let tx = conn.transaction()?;
        let outcome = (|| -> Result<RawPack> {
          let lifecycle = require_lifecycle(&tx, id)?;
          let current = tx
            .query_row(
              &format!(
                "SELECT {PACK_COLUMNS} FROM packs WHERE pack_id = ?1 AND event_id = ?2"
              ),
              rusqlite::params![pack_id_str, id.0],
              RawPack::from_row,
            )
            .optional()
            .map_err(sql)?
            .ok_or(CoreError::PackNotFound(pack_id))?;

          let from: PackState = current
            .state
            .parse()
            .map_err(|_| Error::Decode(format!("state: {:?}", current.state)))?;
          if from == state {
            return Ok(current);
          }
          // Once resolved, the only thing left to do with a pack is send it
          // back to the lab.
          if lifecycle.resolved && state != PackState::Returned {
            return Err(CoreError::EventResolved(id).into());
          }
          if !from.can_transition_to(state) {
            return Err(
              CoreError::InvalidPackTransition { pack: pack_id, from, to: state }.into(),
            );
          }
          tx.execute(
            "UPDATE packs SET state = ?1, updated_at = ?2 WHERE pack_id = ?3",
            rusqlite::params![state.as_str(), at_str, pack_id_str],
          )
          .map_err(sql)?;
          tx.query_row(
            &format!("SELECT {PACK_COLUMNS} FROM packs WHERE pack_id = ?1"),
            rusqlite::params![pack_id_str],
            RawPack::from_row,
          )
          .map_err(sql)
        })();
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    let pack = raw?.into_pack()?;
    tracing::info!(event = %id, pack = %pack.pack_id, state = %pack.state, "pack updated");
    Ok(pack)
  }
}
