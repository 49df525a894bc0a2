use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{RwLock, oneshot};
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_span};
use super::{Engine, EngineError, WalCommand};

fn check_len(value: Option<&str>, max: usize, what: &'static str) -> Result<(), EngineError> {
    match value {
        Some(v) if v.len() > max => Err(EngineError::LimitExceeded(what)),
        _ => Ok(()),
    }
}

impl Engine {
    pub async fn register_equipment(
        &self,
        id: Ulid,
        name: String,
        kind: EquipmentKind,
    ) -> Result<(), EngineError> {
        if self.equipment.len() >= MAX_EQUIPMENT {
            return Err(EngineError::LimitExceeded("too many equipment units"));
        }
        check_len(Some(&name), MAX_NAME_LEN, "equipment name too long")?;
        let _venue = self.venue_lock.lock().await;
        if self.equipment.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::EquipmentRegistered {
            id,
            name: name.clone(),
            kind,
        };
        self.wal_append(&event).await?;
        self.equipment
            .insert(id, Arc::new(RwLock::new(EquipmentState::new(id, name, kind))));
        self.notify.publish(&event);
        Ok(())
    }

    /// Soft-disable. Bookings stay for history; no new ones are accepted.
    pub async fn retire_equipment(&self, id: Ulid) -> Result<(), EngineError> {
        let unit = self.get_unit(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = unit.write().await;
        if !guard.active {
            return Err(EngineError::Retired(id));
        }
        self.persist_and_apply(&mut guard, &Event::EquipmentRetired { id })
            .await
    }

    pub async fn start_maintenance(
        &self,
        id: Ulid,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        check_len(reason.as_deref(), MAX_REASON_LEN, "maintenance reason too long")?;
        let unit = self.get_unit(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = unit.write().await;
        if !guard.active {
            return Err(EngineError::Retired(id));
        }
        self.persist_and_apply(&mut guard, &Event::MaintenanceStarted { id, reason })
            .await
    }

    pub async fn end_maintenance(&self, id: Ulid) -> Result<(), EngineError> {
        let unit = self.get_unit(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = unit.write().await;
        if guard.maintenance.is_none() {
            return Err(EngineError::NotInMaintenance(id));
        }
        self.persist_and_apply(&mut guard, &Event::MaintenanceEnded { id })
            .await
    }

    /// Store a new pending booking. The overlap check and the insert run under
    /// the unit's write lock, so of two racing placements at most one lands.
    pub async fn place_booking(
        &self,
        id: Ulid,
        equipment_id: Ulid,
        span: Span,
        customer: Option<String>,
    ) -> Result<(), EngineError> {
        validate_span(&span, MAX_BOOKING_SPAN_MS)?;
        check_len(customer.as_deref(), MAX_CUSTOMER_LEN, "customer label too long")?;
        if self.booking_index.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let unit = self
            .get_unit(&equipment_id)
            .ok_or(EngineError::NotFound(equipment_id))?;
        let mut guard = unit.write().await;
        if !guard.active {
            return Err(EngineError::Retired(equipment_id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_EQUIPMENT {
            return Err(EngineError::LimitExceeded("too many bookings on equipment"));
        }

        check_no_conflict(&guard, &span, None)?;

        let event = Event::BookingPlaced {
            id,
            equipment_id,
            span,
            customer,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Administrative status change: confirm, arrive, complete or cancel.
    pub async fn set_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<BookingInfo, EngineError> {
        let mut guard = self.resolve_booking_write(&id).await?;
        let equipment_id = guard.id;
        let current = guard.booking(id).ok_or(EngineError::NotFound(id))?.status;
        if !current.can_become(status) {
            return Err(EngineError::InvalidTransition {
                id,
                from: current,
                to: status,
            });
        }

        let event = Event::BookingStatusChanged {
            id,
            equipment_id,
            status,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(booking = %id, from = %current, to = %status, "booking status changed");
        guard
            .booking(id)
            .map(|b| b.info(equipment_id))
            .ok_or(EngineError::NotFound(id))
    }

    /// Move a live booking's end forward to `new_end`.
    pub async fn extend_booking(&self, id: Ulid, new_end: Ms) -> Result<BookingInfo, EngineError> {
        let mut guard = self.resolve_booking_write(&id).await?;
        let equipment_id = guard.id;
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if !booking.status.occupies() {
            return Err(EngineError::Inactive(id));
        }
        if new_end <= booking.span.end {
            return Err(EngineError::LimitExceeded("extension must move the end forward"));
        }
        let grown = Span {
            start: booking.span.start,
            end: new_end,
        };
        validate_span(&grown, MAX_BOOKING_SPAN_MS)?;
        check_no_conflict(&guard, &Span::new(booking.span.end, new_end), Some(id))?;

        let event = Event::BookingExtended {
            id,
            equipment_id,
            end: new_end,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        guard
            .booking(id)
            .map(|b| b.info(equipment_id))
            .ok_or(EngineError::NotFound(id))
    }

    pub async fn add_blackout(
        &self,
        id: Ulid,
        span: Span,
        mut equipment: Vec<Ulid>,
        title: Option<String>,
    ) -> Result<(), EngineError> {
        validate_span(&span, MAX_BLACKOUT_SPAN_MS)?;
        check_len(title.as_deref(), MAX_TITLE_LEN, "blackout title too long")?;
        equipment.sort();
        equipment.dedup();
        if equipment.is_empty() {
            return Err(EngineError::InvalidBlackout("equipment set is empty"));
        }
        if equipment.len() > MAX_BLACKOUT_EQUIPMENT {
            return Err(EngineError::LimitExceeded("too many equipment in blackout"));
        }
        if let Some(missing) = equipment.iter().find(|e| !self.equipment.contains_key(e)) {
            return Err(EngineError::NotFound(*missing));
        }

        let _venue = self.venue_lock.lock().await;
        if self.blackouts.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let event = Event::BlackoutAdded {
            id,
            span,
            equipment,
            title,
        };
        self.persist_venue(&event).await
    }

    pub async fn remove_blackout(&self, id: Ulid) -> Result<(), EngineError> {
        let _venue = self.venue_lock.lock().await;
        let event = {
            let blackout = self.blackouts.get(&id).ok_or(EngineError::NotFound(id))?;
            Event::BlackoutRemoved {
                id,
                span: blackout.span,
                equipment: blackout.equipment.clone(),
            }
        };
        self.persist_venue(&event).await
    }

    pub async fn close_day(&self, date: NaiveDate, reason: String) -> Result<(), EngineError> {
        check_len(Some(&reason), MAX_REASON_LEN, "closure reason too long")?;
        let _venue = self.venue_lock.lock().await;
        if self.closed_days.contains_key(&date) {
            return Err(EngineError::DateAlreadyClosed(date));
        }
        self.persist_venue(&Event::DayClosed { date, reason }).await
    }

    pub async fn reopen_day(&self, date: NaiveDate) -> Result<(), EngineError> {
        let _venue = self.venue_lock.lock().await;
        if !self.closed_days.contains_key(&date) {
            return Err(EngineError::DateNotFound(date));
        }
        self.persist_venue(&Event::DayReopened { date }).await
    }

    /// Rewrite the journal with the minimal events that recreate current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        // Hold every lock until the rewrite lands so no append slips between
        // the snapshot and the swap.
        let _venue = self.venue_lock.lock().await;
        let units: Vec<_> = self.equipment.iter().map(|e| e.value().clone()).collect();
        let mut guards = Vec::with_capacity(units.len());
        for unit in units {
            guards.push(unit.read_owned().await);
        }
        for guard in &guards {
            events.push(Event::EquipmentRegistered {
                id: guard.id,
                name: guard.name.clone(),
                kind: guard.kind,
            });
            for b in &guard.bookings {
                events.push(Event::BookingPlaced {
                    id: b.id,
                    equipment_id: guard.id,
                    span: b.span,
                    customer: b.customer.clone(),
                });
                if b.status != BookingStatus::Pending {
                    events.push(Event::BookingStatusChanged {
                        id: b.id,
                        equipment_id: guard.id,
                        status: b.status,
                    });
                }
            }
            if let Some(m) = &guard.maintenance {
                events.push(Event::MaintenanceStarted {
                    id: guard.id,
                    reason: m.reason.clone(),
                });
            }
            if !guard.active {
                events.push(Event::EquipmentRetired { id: guard.id });
            }
        }

        for b in self.blackouts.iter() {
            events.push(Event::BlackoutAdded {
                id: b.id,
                span: b.span,
                equipment: b.equipment.clone(),
                title: b.title.clone(),
            });
        }
        for c in self.closed_days.iter() {
            events.push(Event::DayClosed {
                date: c.date,
                reason: c.reason.clone(),
            });
        }
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        info!("journal compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
