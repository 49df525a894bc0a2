mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::EngineError;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedEquipmentState = Arc<RwLock<EquipmentState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the journal. Appends that queue up while a flush is running are
/// written together and share one fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let mut batch: Vec<Pending> = match cmd {
            WalCommand::Append { event, response } => vec![(event, response)],
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        commit_batch(&mut wal, batch);
        if let Some(other) = deferred {
            handle_non_append(&mut wal, other);
        }
    }
    debug!("WAL writer stopped");
}

fn commit_batch(wal: &mut Wal, batch: Vec<Pending>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = write_batch(wal, &batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn write_batch(wal: &mut Wal, batch: &[Pending]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so stale bytes don't ride along with
    // the next batch.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => commit_batch(wal, vec![(event, response)]),
    }
}

/// Journal-backed store of equipment, bookings, blackouts and closed days.
pub struct Engine {
    pub equipment: DashMap<Ulid, SharedEquipmentState>,
    pub(super) blackouts: DashMap<Ulid, Blackout>,
    pub(super) closed_days: DashMap<NaiveDate, ClosedDay>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Booking id → equipment id.
    pub(super) booking_index: DashMap<Ulid, Ulid>,
    /// Serializes registration, blackout and closed-day writes against
    /// each other and against compaction.
    pub(super) venue_lock: Mutex<()>,
}

/// Apply a unit-scoped event. Caller holds the unit's write lock.
fn apply_to_equipment(eq: &mut EquipmentState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::EquipmentRetired { .. } => eq.active = false,
        Event::MaintenanceStarted { reason, .. } => {
            eq.maintenance = Some(Maintenance {
                reason: reason.clone(),
            });
        }
        Event::MaintenanceEnded { .. } => eq.maintenance = None,
        Event::BookingPlaced {
            id,
            equipment_id,
            span,
            customer,
        } => {
            eq.insert_booking(Booking {
                id: *id,
                span: *span,
                status: BookingStatus::Pending,
                customer: customer.clone(),
            });
            index.insert(*id, *equipment_id);
        }
        Event::BookingStatusChanged { id, status, .. } => {
            if let Some(b) = eq.booking_mut(*id) {
                b.status = *status;
            }
        }
        Event::BookingExtended { id, end, .. } => {
            if let Some(b) = eq.booking_mut(*id) {
                b.span.end = *end;
            }
        }
        // Registration creates the entry; venue events live outside units.
        Event::EquipmentRegistered { .. }
        | Event::BlackoutAdded { .. }
        | Event::BlackoutRemoved { .. }
        | Event::DayClosed { .. }
        | Event::DayReopened { .. } => {}
    }
}

/// Unit an event belongs to, for events applied under a unit lock.
fn event_equipment_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::EquipmentRetired { id }
        | Event::MaintenanceStarted { id, .. }
        | Event::MaintenanceEnded { id } => Some(*id),
        Event::BookingPlaced { equipment_id, .. }
        | Event::BookingStatusChanged { equipment_id, .. }
        | Event::BookingExtended { equipment_id, .. } => Some(*equipment_id),
        Event::EquipmentRegistered { .. }
        | Event::BlackoutAdded { .. }
        | Event::BlackoutRemoved { .. }
        | Event::DayClosed { .. }
        | Event::DayReopened { .. } => None,
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            equipment: DashMap::new(),
            blackouts: DashMap::new(),
            closed_days: DashMap::new(),
            wal_tx,
            notify,
            booking_index: DashMap::new(),
            venue_lock: Mutex::new(()),
        };

        // Rebuild plain state first; nothing else can see it yet.
        let mut units: HashMap<Ulid, EquipmentState> = HashMap::new();
        for event in &events {
            match event {
                Event::EquipmentRegistered { id, name, kind } => {
                    units.insert(*id, EquipmentState::new(*id, name.clone(), *kind));
                }
                other => match event_equipment_id(other) {
                    Some(eq_id) => {
                        if let Some(eq) = units.get_mut(&eq_id) {
                            apply_to_equipment(eq, other, &engine.booking_index);
                        }
                    }
                    None => engine.apply_venue(other),
                },
            }
        }
        for (id, eq) in units {
            engine.equipment.insert(id, Arc::new(RwLock::new(eq)));
        }

        info!(
            "replayed {} events: {} equipment, {} bookings",
            events.len(),
            engine.equipment.len(),
            engine.booking_index.len()
        );
        Ok(engine)
    }

    /// Apply a venue-scoped event to the shared maps.
    fn apply_venue(&self, event: &Event) {
        match event {
            Event::BlackoutAdded {
                id,
                span,
                equipment,
                title,
            } => {
                self.blackouts.insert(
                    *id,
                    Blackout {
                        id: *id,
                        span: *span,
                        equipment: equipment.clone(),
                        title: title.clone(),
                    },
                );
            }
            Event::BlackoutRemoved { id, .. } => {
                self.blackouts.remove(id);
            }
            Event::DayClosed { date, reason } => {
                self.closed_days.insert(
                    *date,
                    ClosedDay {
                        date: *date,
                        reason: reason.clone(),
                    },
                );
            }
            Event::DayReopened { date } => {
                self.closed_days.remove(date);
            }
            _ => {}
        }
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_unit(&self, id: &Ulid) -> Option<SharedEquipmentState> {
        self.equipment.get(id).map(|e| e.value().clone())
    }

    pub fn equipment_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_index.get(booking_id).map(|e| *e.value())
    }

    /// WAL-append, apply to the locked unit, notify.
    pub(super) async fn persist_and_apply(
        &self,
        eq: &mut EquipmentState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_equipment(eq, event, &self.booking_index);
        self.notify.publish(event);
        Ok(())
    }

    /// WAL-append, apply to the venue maps, notify. Caller holds `venue_lock`.
    pub(super) async fn persist_venue(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_venue(event);
        self.notify.publish(event);
        Ok(())
    }

    /// Booking id → owning unit, write-locked.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<EquipmentState>, EngineError> {
        let eq_id = self
            .equipment_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let unit = self.get_unit(&eq_id).ok_or(EngineError::NotFound(eq_id))?;
        Ok(unit.write_owned().await)
    }
}
