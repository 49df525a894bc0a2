use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// All units, retired included, ordered by name.
    pub async fn list_equipment(&self) -> Vec<EquipmentInfo> {
        let units: Vec<_> = self.equipment.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(units.len());
        for unit in units {
            out.push(unit.read().await.info());
        }
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        out
    }

    pub async fn get_equipment(&self, id: Ulid) -> Option<EquipmentInfo> {
        let unit = self.get_unit(&id)?;
        let guard = unit.read().await;
        Some(guard.info())
    }

    /// Every booking of a unit, any status, by start.
    pub async fn get_bookings(&self, equipment_id: Ulid) -> Result<Vec<BookingInfo>, EngineError> {
        let unit = self
            .get_unit(&equipment_id)
            .ok_or(EngineError::NotFound(equipment_id))?;
        let guard = unit.read().await;
        Ok(guard.bookings.iter().map(|b| b.info(equipment_id)).collect())
    }

    pub async fn get_booking(&self, id: Ulid) -> Option<BookingInfo> {
        let equipment_id = self.equipment_for_booking(&id)?;
        let unit = self.get_unit(&equipment_id)?;
        let guard = unit.read().await;
        guard.booking(id).map(|b| b.info(equipment_id))
    }

    /// Bookings overlapping `window` that still hold time.
    pub async fn occupying_bookings(
        &self,
        equipment_id: Ulid,
        window: &Span,
    ) -> Result<Vec<BookingInfo>, EngineError> {
        let unit = self
            .get_unit(&equipment_id)
            .ok_or(EngineError::NotFound(equipment_id))?;
        let guard = unit.read().await;
        Ok(guard
            .occupying(window)
            .map(|b| b.info(equipment_id))
            .collect())
    }

    /// All blackouts, by start.
    pub fn list_blackouts(&self) -> Vec<Blackout> {
        let mut out: Vec<Blackout> = self.blackouts.iter().map(|b| b.value().clone()).collect();
        out.sort_by_key(|b| (b.span.start, b.id));
        out
    }

    /// Blackouts listing `equipment_id` that overlap `window`.
    pub fn blackouts_for(&self, equipment_id: Ulid, window: &Span) -> Vec<Blackout> {
        let mut out: Vec<Blackout> = self
            .blackouts
            .iter()
            .filter(|b| b.blocks(&equipment_id) && b.span.overlaps(window))
            .map(|b| b.value().clone())
            .collect();
        out.sort_by_key(|b| (b.span.start, b.id));
        out
    }

    pub fn closed_day(&self, date: NaiveDate) -> Option<ClosedDay> {
        self.closed_days.get(&date).map(|c| c.value().clone())
    }

    pub fn list_closed_days(&self) -> Vec<ClosedDay> {
        let mut out: Vec<ClosedDay> = self.closed_days.iter().map(|c| c.value().clone()).collect();
        out.sort_by_key(|c| c.date);
        out
    }
}
