//! Pure availability pipeline: occupancy, grid filter, run resolution and
//! selection reconciliation. Nothing here touches the store or the clock.

pub mod calendar;
pub mod day;
pub mod filter;
pub mod grid;
pub mod occupancy;
pub mod run;
pub mod selection;

pub use calendar::{Clock, LocalNow, ManualClock, SystemClock, VenueCalendar};
pub use day::{resolve_day, DayAvailability, DaySnapshot, SlotAvailability};
pub use grid::{slot_label, OperatingHours};
pub use occupancy::{CellState, DayOccupancy};
pub use selection::{AvailabilityView, SelectionContext};

use chrono::{Days, NaiveDate};

use crate::model::{HOUR_MS, Ms, Span};

/// Venue-wide scheduling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Venue {
    pub hours: OperatingHours,
    pub calendar: VenueCalendar,
    /// Days after today that can still be booked.
    pub horizon_days: u32,
}

impl Default for Venue {
    fn default() -> Self {
        Self {
            hours: OperatingHours::default(),
            calendar: VenueCalendar::default(),
            horizon_days: 3,
        }
    }
}

impl Venue {
    pub fn local_now(&self, clock: &dyn Clock) -> LocalNow {
        self.calendar.local_now(clock.now_ms())
    }

    /// Last bookable date relative to `today`.
    pub fn horizon_end(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(self.horizon_days as u64))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn within_horizon(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date <= self.horizon_end(today)
    }

    pub fn slot_span(&self, date: NaiveDate, hour: u8, hours: u8) -> Span {
        self.calendar.slot_span(date, hour, hours)
    }

    /// Grid hour of an instant on `date`, when it falls on a whole hour of
    /// that day.
    pub fn hour_on(&self, date: NaiveDate, t: Ms) -> Option<u8> {
        let window = self.calendar.day_window(date);
        let offset = t - window.start;
        if !(0..=24 * HOUR_MS).contains(&offset) || offset % HOUR_MS != 0 {
            return None;
        }
        Some((offset / HOUR_MS) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    #[test]
    fn horizon_is_inclusive() {
        let venue = Venue::default();
        assert!(venue.within_horizon(d(16), d(16)));
        assert!(venue.within_horizon(d(19), d(16)));
        assert!(!venue.within_horizon(d(20), d(16)));
    }

    #[test]
    fn hour_on_round_trips_slot_boundaries() {
        let venue = Venue::default();
        let span = venue.slot_span(d(18), 14, 3);
        assert_eq!(venue.hour_on(d(18), span.start), Some(14));
        assert_eq!(venue.hour_on(d(18), span.end), Some(17));
        assert_eq!(venue.hour_on(d(18), span.start + 1), None);
        assert_eq!(venue.hour_on(d(17), span.start), None);
    }

    #[test]
    fn local_now_uses_the_clock() {
        let venue = Venue::default();
        let clock = ManualClock::new(venue.slot_span(d(16), 15, 1).start + 30 * 60_000);
        assert_eq!(venue.local_now(&clock), LocalNow { date: d(16), hour: 15 });
    }
}
