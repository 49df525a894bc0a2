use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;

use crate::model::*;

/// Display classification of one (equipment, date, hour) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Available,
    Reserved,
    EventBlocked,
    UnderMaintenance,
}

impl CellState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellState::Available => "available",
            CellState::Reserved => "reserved",
            CellState::EventBlocked => "event",
            CellState::UnderMaintenance => "maintenance",
        }
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Walk `span` one hour at a time and collect each hour-of-day it touches
/// inside `day`. A partial hour counts as the whole hour.
pub fn touched_hours(span: &Span, day: &Span) -> Vec<u8> {
    let start = span.start.max(day.start);
    let end = span.end.min(day.end);
    let mut hours = Vec::new();
    if start >= end {
        return hours;
    }
    let mut t = day.start + (start - day.start) / HOUR_MS * HOUR_MS;
    while t < end {
        hours.push(((t - day.start) / HOUR_MS) as u8);
        t += HOUR_MS;
    }
    hours
}

/// Occupied hours of one unit on one day, by cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOccupancy {
    pub date: NaiveDate,
    reserved: BTreeSet<u8>,
    blocked: BTreeSet<u8>,
    /// Day-wide; set while the unit is in maintenance or retired.
    pub maintenance: Option<Maintenance>,
}

impl DayOccupancy {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            reserved: BTreeSet::new(),
            blocked: BTreeSet::new(),
            maintenance: None,
        }
    }

    /// Expand the day's bookings and blackouts into hour buckets.
    ///
    /// Bookings count when they hold time and start inside `day`; blackouts
    /// count when they list the unit and overlap `day` at all.
    pub fn build(
        date: NaiveDate,
        day: &Span,
        equipment: &EquipmentInfo,
        bookings: &[BookingInfo],
        blackouts: &[Blackout],
    ) -> Self {
        let mut occupancy = Self::new(date);
        for booking in bookings {
            if booking.equipment_id == equipment.id
                && booking.status.occupies()
                && day.contains_instant(booking.start)
            {
                occupancy.reserved.extend(touched_hours(&booking.span(), day));
            }
        }
        for blackout in blackouts {
            if blackout.blocks(&equipment.id) && blackout.span.overlaps(day) {
                occupancy.blocked.extend(touched_hours(&blackout.span, day));
            }
        }
        occupancy.maintenance = match (&equipment.maintenance, equipment.active) {
            (Some(m), _) => Some(m.clone()),
            (None, false) => Some(Maintenance {
                reason: Some("retired".into()),
            }),
            (None, true) => None,
        };
        occupancy
    }

    pub fn is_occupied(&self, hour: u8) -> bool {
        self.maintenance.is_some() || self.reserved.contains(&hour) || self.blocked.contains(&hour)
    }

    /// Maintenance, then event, then reserved.
    pub fn classify(&self, hour: u8) -> CellState {
        if self.maintenance.is_some() {
            CellState::UnderMaintenance
        } else if self.blocked.contains(&hour) {
            CellState::EventBlocked
        } else if self.reserved.contains(&hour) {
            CellState::Reserved
        } else {
            CellState::Available
        }
    }

    /// Hours covered by a booking or blackout. Maintenance is not included.
    pub fn occupied_hours(&self) -> BTreeSet<u8> {
        self.reserved.union(&self.blocked).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    const DAY: Span = Span {
        start: 10 * DAY_MS,
        end: 11 * DAY_MS,
    };

    fn at(hour: Ms, minute: Ms) -> Ms {
        DAY.start + hour * HOUR_MS + minute * 60_000
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(1970, 1, 11).unwrap()
    }

    fn unit() -> EquipmentInfo {
        EquipmentInfo {
            id: Ulid::from_parts(1, 1),
            name: "PS5-2".into(),
            kind: EquipmentKind::Console,
            active: true,
            maintenance: None,
        }
    }

    fn booking(eq: &EquipmentInfo, start: Ms, end: Ms, status: BookingStatus) -> BookingInfo {
        BookingInfo {
            id: Ulid::new(),
            equipment_id: eq.id,
            start,
            end,
            status,
            customer: None,
        }
    }

    fn blackout(start: Ms, end: Ms, equipment: Vec<Ulid>) -> Blackout {
        Blackout {
            id: Ulid::new(),
            span: Span::new(start, end),
            equipment,
            title: Some("Tournament".into()),
        }
    }

    #[test]
    fn whole_hours_are_walked() {
        let hours = touched_hours(&Span::new(at(14, 0), at(16, 0)), &DAY);
        assert_eq!(hours, vec![14, 15]);
    }

    #[test]
    fn partial_hours_count_fully() {
        let hours = touched_hours(&Span::new(at(14, 30), at(15, 10)), &DAY);
        assert_eq!(hours, vec![14, 15]);
    }

    #[test]
    fn walk_is_clipped_to_the_day() {
        let overnight = Span::new(at(18, 0), at(26, 0));
        assert_eq!(touched_hours(&overnight, &DAY), vec![18, 19, 20, 21, 22, 23]);
        let next_day = Span::new(DAY.end, DAY.end + DAY_MS);
        assert_eq!(touched_hours(&overnight, &next_day), vec![0, 1]);
    }

    #[test]
    fn disjoint_span_touches_nothing() {
        assert!(touched_hours(&Span::new(0, HOUR_MS), &DAY).is_empty());
    }

    #[test]
    fn historical_bookings_do_not_occupy() {
        let eq = unit();
        let bookings = vec![
            booking(&eq, at(13, 0), at(14, 0), BookingStatus::Completed),
            booking(&eq, at(15, 0), at(16, 0), BookingStatus::Cancelled),
            booking(&eq, at(17, 0), at(18, 0), BookingStatus::Active),
        ];
        let occ = DayOccupancy::build(date(), &DAY, &eq, &bookings, &[]);
        assert_eq!(occ.occupied_hours(), BTreeSet::from([17]));
    }

    #[test]
    fn bookings_starting_outside_the_day_are_ignored() {
        let eq = unit();
        let bookings = vec![booking(&eq, at(-1, 0), at(1, 0), BookingStatus::Confirmed)];
        let occ = DayOccupancy::build(date(), &DAY, &eq, &bookings, &[]);
        assert!(!occ.is_occupied(0));
    }

    #[test]
    fn blackout_only_blocks_listed_units() {
        let eq = unit();
        let blackouts = vec![blackout(at(18, 0), at(20, 0), vec![Ulid::from_parts(9, 9)])];
        let occ = DayOccupancy::build(date(), &DAY, &eq, &[], &blackouts);
        assert!(occ.occupied_hours().is_empty());
    }

    #[test]
    fn event_label_wins_over_reserved() {
        let eq = unit();
        let bookings = vec![booking(&eq, at(19, 0), at(21, 0), BookingStatus::Pending)];
        let blackouts = vec![blackout(at(20, 0), at(22, 0), vec![eq.id])];
        let occ = DayOccupancy::build(date(), &DAY, &eq, &bookings, &blackouts);
        assert_eq!(occ.classify(19), CellState::Reserved);
        assert_eq!(occ.classify(20), CellState::EventBlocked);
        assert_eq!(occ.classify(21), CellState::EventBlocked);
        assert_eq!(occ.classify(22), CellState::Available);
        assert!(occ.is_occupied(20));
    }

    #[test]
    fn maintenance_blocks_every_hour() {
        let mut eq = unit();
        eq.maintenance = Some(Maintenance {
            reason: Some("controller drift".into()),
        });
        let occ = DayOccupancy::build(date(), &DAY, &eq, &[], &[]);
        assert!((0..24).all(|h| occ.is_occupied(h)));
        assert_eq!(occ.classify(12), CellState::UnderMaintenance);
        assert!(occ.occupied_hours().is_empty());
    }

    #[test]
    fn retired_unit_reads_as_out_of_service() {
        let mut eq = unit();
        eq.active = false;
        let occ = DayOccupancy::build(date(), &DAY, &eq, &[], &[]);
        assert_eq!(occ.classify(15), CellState::UnderMaintenance);
        assert_eq!(
            occ.maintenance.and_then(|m| m.reason).as_deref(),
            Some("retired")
        );
    }
}
