use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate, NaiveTime};

use crate::model::{DAY_MS, HOUR_MS, Ms, Span};

/// Source of "now". Injected so the today cutoff can be tested.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Ms;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Ms {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as Ms)
            .unwrap_or(0)
    }
}

/// Settable clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: Ms) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: Ms) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Ms) {
        self.0.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Ms {
        self.0.load(Ordering::SeqCst)
    }
}

/// Venue-local date and hour of an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNow {
    pub date: NaiveDate,
    pub hour: u8,
}

/// Maps instants to venue-local calendar days with one fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VenueCalendar {
    offset_ms: Ms,
}

impl VenueCalendar {
    pub fn new(utc_offset_minutes: i32) -> Self {
        Self {
            offset_ms: utc_offset_minutes as Ms * 60_000,
        }
    }

    /// Instant of local midnight starting `date`.
    pub fn day_start(&self, date: NaiveDate) -> Ms {
        date.and_time(NaiveTime::MIN).and_utc().timestamp_millis() - self.offset_ms
    }

    /// `[local midnight, +24h)` of `date`.
    pub fn day_window(&self, date: NaiveDate) -> Span {
        let start = self.day_start(date);
        Span::new(start, start + DAY_MS)
    }

    /// Span of `hours` whole hours starting at grid hour `hour` on `date`.
    pub fn slot_span(&self, date: NaiveDate, hour: u8, hours: u8) -> Span {
        let start = self.day_start(date) + hour as Ms * HOUR_MS;
        Span::new(start, start + hours as Ms * HOUR_MS)
    }

    pub fn local_date(&self, t: Ms) -> NaiveDate {
        DateTime::from_timestamp_millis(t + self.offset_ms)
            .map(|dt| dt.date_naive())
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn local_hour(&self, t: Ms) -> u8 {
        ((t + self.offset_ms).rem_euclid(DAY_MS) / HOUR_MS) as u8
    }

    pub fn local_now(&self, now: Ms) -> LocalNow {
        LocalNow {
            date: self.local_date(now),
            hour: self.local_hour(now),
        }
    }
}
