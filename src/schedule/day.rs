use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::calendar::LocalNow;
use super::filter::bookable_slots;
use super::grid::OperatingHours;
use super::occupancy::{CellState, DayOccupancy};
use super::run::{extension_fits, max_duration, selectable_durations};

/// Everything the pipeline reads for one (equipment, date), fetched together.
#[derive(Debug, Clone)]
pub struct DaySnapshot {
    pub date: NaiveDate,
    pub window: Span,
    pub equipment: EquipmentInfo,
    pub bookings: Vec<BookingInfo>,
    pub blackouts: Vec<Blackout>,
    pub closed: Option<ClosedDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAvailability {
    pub hour: u8,
    pub max_hours: u8,
}

/// Resolved availability of one unit on one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
    pub equipment_id: Ulid,
    pub date: NaiveDate,
    /// Bookable starts in grid order with their longest session.
    pub slots: Vec<SlotAvailability>,
    pub closed: Option<ClosedDay>,
    pub occupancy: DayOccupancy,
}

impl DayAvailability {
    pub fn retained(&self) -> Vec<u8> {
        self.slots.iter().map(|s| s.hour).collect()
    }

    pub fn max_hours(&self, start: u8) -> u8 {
        self.slots
            .iter()
            .find(|s| s.hour == start)
            .map_or(0, |s| s.max_hours)
    }

    pub fn durations(&self, start: u8) -> Vec<u8> {
        selectable_durations(self.max_hours(start))
    }

    /// Whether `hours` starting at `start` fits in the current run.
    pub fn admits(&self, start: u8, hours: u8) -> bool {
        hours >= 1 && hours <= self.max_hours(start)
    }

    pub fn classify(&self, hour: u8) -> CellState {
        self.occupancy.classify(hour)
    }

    pub fn admits_extension(&self, hours: &OperatingHours, start: u8, end: u8, extra: u8) -> bool {
        self.closed.is_none() && extension_fits(hours, &self.retained(), start, end, extra)
    }
}

/// Interval model, then filter, then run resolver.
pub fn resolve_day(hours: &OperatingHours, snapshot: &DaySnapshot, now: LocalNow) -> DayAvailability {
    let occupancy = DayOccupancy::build(
        snapshot.date,
        &snapshot.window,
        &snapshot.equipment,
        &snapshot.bookings,
        &snapshot.blackouts,
    );
    let retained = bookable_slots(hours, &occupancy, snapshot.closed.is_some(), now);
    let slots = retained
        .iter()
        .map(|&hour| SlotAvailability {
            hour,
            max_hours: max_duration(hours, &retained, snapshot.date, hour, now),
        })
        .collect();
    DayAvailability {
        equipment_id: snapshot.equipment.id,
        date: snapshot.date,
        slots,
        closed: snapshot.closed.clone(),
        occupancy,
    }
}
