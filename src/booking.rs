use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::MAX_EXTENSION_HOURS;
use crate::model::*;
use crate::observability;
use crate::schedule::{resolve_day, Clock, DayAvailability, LocalNow, Venue};
use crate::source::{fetch_day, BookingDraft, BookingWriter, IntervalSource};

/// A customer's booking attempt. Fields are optional so that missing input
/// is reported as such instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingRequest {
    pub id: Option<Ulid>,
    pub equipment_id: Option<Ulid>,
    pub date: Option<NaiveDate>,
    pub start_hour: Option<u8>,
    pub hours: Option<u8>,
    pub customer: Option<String>,
}

#[derive(Debug)]
pub enum BookingError {
    MissingInput(&'static str),
    InvalidInput(String),
    UnknownEquipment(Ulid),
    UnknownBooking(Ulid),
    /// The requested hours were free when offered but are not any more.
    SlotUnavailable {
        equipment_id: Ulid,
        date: NaiveDate,
        start_hour: u8,
        hours: u8,
    },
    /// The store could not be read or written. Nothing was committed.
    Upstream(EngineError),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::MissingInput(what) => write!(f, "missing {what}"),
            BookingError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            BookingError::UnknownEquipment(id) => write!(f, "unknown equipment: {id}"),
            BookingError::UnknownBooking(id) => write!(f, "unknown booking: {id}"),
            BookingError::SlotUnavailable {
                date,
                start_hour,
                hours,
                ..
            } => write!(
                f,
                "slot no longer available ({date} {start_hour:02}:00 for {hours}h), choose another time"
            ),
            BookingError::Upstream(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}

/// Validate-then-commit booking path over any interval store.
pub struct BookingDesk<S> {
    store: Arc<S>,
    venue: Venue,
    clock: Arc<dyn Clock>,
}

impl<S: IntervalSource + BookingWriter> BookingDesk<S> {
    pub fn new(store: Arc<S>, venue: Venue, clock: Arc<dyn Clock>) -> Self {
        Self { store, venue, clock }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn now(&self) -> LocalNow {
        self.venue.local_now(self.clock.as_ref())
    }

    fn check_horizon(&self, date: NaiveDate, now: LocalNow) -> Result<(), BookingError> {
        if self.venue.within_horizon(date, now.date) {
            return Ok(());
        }
        Err(BookingError::InvalidInput(format!(
            "{date} is beyond the booking horizon (last bookable date {})",
            self.venue.horizon_end(now.date)
        )))
    }

    async fn resolve(
        &self,
        equipment_id: Ulid,
        date: NaiveDate,
        now: LocalNow,
    ) -> Result<DayAvailability, BookingError> {
        let snapshot = fetch_day(self.store.as_ref(), &self.venue.calendar, equipment_id, date)
            .await
            .map_err(|e| match e {
                EngineError::NotFound(id) if id == equipment_id => {
                    BookingError::UnknownEquipment(id)
                }
                other => {
                    warn!(equipment = %equipment_id, %date, "interval fetch failed: {other}");
                    BookingError::Upstream(other)
                }
            })?;
        Ok(resolve_day(&self.venue.hours, &snapshot, now))
    }

    /// Fresh availability for one unit and date.
    pub async fn day(
        &self,
        equipment_id: Option<Ulid>,
        date: Option<NaiveDate>,
    ) -> Result<DayAvailability, BookingError> {
        let equipment_id = equipment_id.ok_or(BookingError::MissingInput("equipment"))?;
        let date = date.ok_or(BookingError::MissingInput("date"))?;
        let now = self.now();
        self.check_horizon(date, now)?;
        self.resolve(equipment_id, date, now).await
    }

    fn rejected(
        &self,
        stage: &'static str,
        equipment_id: Ulid,
        date: NaiveDate,
        start_hour: u8,
        hours: u8,
    ) -> BookingError {
        metrics::counter!(observability::BOOKING_REJECTIONS_TOTAL, "stage" => stage).increment(1);
        info!(equipment = %equipment_id, %date, start_hour, hours, stage, "slot no longer available");
        BookingError::SlotUnavailable {
            equipment_id,
            date,
            start_hour,
            hours,
        }
    }

    /// Re-run the pipeline on freshly fetched data, then write. Never retries.
    pub async fn submit(&self, request: BookingRequest) -> Result<BookingInfo, BookingError> {
        let equipment_id = request
            .equipment_id
            .ok_or(BookingError::MissingInput("equipment"))?;
        let date = request.date.ok_or(BookingError::MissingInput("date"))?;
        let start_hour = request
            .start_hour
            .ok_or(BookingError::MissingInput("start hour"))?;
        let hours = request.hours.ok_or(BookingError::MissingInput("duration"))?;
        if start_hour > 23 {
            return Err(BookingError::InvalidInput(format!(
                "start hour {start_hour} out of range 0..=23"
            )));
        }
        if hours == 0 {
            return Err(BookingError::InvalidInput("duration must be at least 1 hour".into()));
        }

        let now = self.now();
        self.check_horizon(date, now)?;
        let day = self.resolve(equipment_id, date, now).await?;
        if !day.admits(start_hour, hours) {
            return Err(self.rejected("revalidate", equipment_id, date, start_hour, hours));
        }

        let draft = BookingDraft {
            id: request.id.unwrap_or_else(Ulid::new),
            equipment_id,
            span: self.venue.slot_span(date, start_hour, hours),
            customer: request.customer,
        };
        let booking = BookingInfo {
            id: draft.id,
            equipment_id,
            start: draft.span.start,
            end: draft.span.end,
            status: BookingStatus::Pending,
            customer: draft.customer.clone(),
        };
        match self.store.write_booking(draft).await {
            Ok(_) => {}
            Err(EngineError::Conflict(_) | EngineError::Retired(_)) => {
                return Err(self.rejected("commit", equipment_id, date, start_hour, hours));
            }
            Err(e) => return Err(BookingError::Upstream(e)),
        }

        metrics::counter!(observability::BOOKINGS_COMMITTED_TOTAL).increment(1);
        info!(booking = %booking.id, equipment = %equipment_id, %date, start_hour, hours, "booking committed");
        Ok(booking)
    }

    /// Push a live booking's end forward by `extra_hours`, re-validated the
    /// same way as a new booking.
    pub async fn extend(&self, booking_id: Ulid, extra_hours: u8) -> Result<BookingInfo, BookingError> {
        if extra_hours == 0 || extra_hours > MAX_EXTENSION_HOURS {
            return Err(BookingError::InvalidInput(format!(
                "extension must be 1..={MAX_EXTENSION_HOURS} hours"
            )));
        }
        let booking = self.store.booking(booking_id).await.map_err(|e| match e {
            EngineError::NotFound(_) => BookingError::UnknownBooking(booking_id),
            other => BookingError::Upstream(other),
        })?;
        if !booking.status.occupies() {
            return Err(BookingError::InvalidInput(format!(
                "booking {booking_id} is {} and cannot be extended",
                booking.status
            )));
        }
        let date = self.venue.calendar.local_date(booking.start);
        let (Some(start_hour), Some(end_hour)) = (
            self.venue.hour_on(date, booking.start),
            self.venue.hour_on(date, booking.end),
        ) else {
            return Err(BookingError::InvalidInput(format!(
                "booking {booking_id} is not aligned to whole hours"
            )));
        };

        let now = self.now();
        let day = self.resolve(booking.equipment_id, date, now).await?;
        if !day.admits_extension(&self.venue.hours, start_hour, end_hour, extra_hours) {
            return Err(self.rejected("revalidate", booking.equipment_id, date, end_hour, extra_hours));
        }

        let new_end = booking.end + extra_hours as Ms * HOUR_MS;
        match self.store.extend_booking(booking_id, new_end).await {
            Ok(extended) => {
                metrics::counter!(observability::BOOKING_EXTENSIONS_TOTAL).increment(1);
                info!(booking = %booking_id, extra_hours, "booking extended");
                Ok(extended)
            }
            Err(EngineError::Conflict(_)) => {
                Err(self.rejected("commit", booking.equipment_id, date, end_hour, extra_hours))
            }
            Err(e) => Err(BookingError::Upstream(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::notify::NotifyHub;
    use crate::schedule::{ManualClock, VenueCalendar};
    use async_trait::async_trait;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("rigslot_test_booking");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn tomorrow() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    /// Desk over a fresh engine with one PC registered, clock at 10:00 today.
    async fn desk(name: &str) -> (BookingDesk<Engine>, Ulid, Arc<ManualClock>) {
        let engine = Arc::new(Engine::new(test_wal_path(name), Arc::new(NotifyHub::new())).unwrap());
        let eq = Ulid::new();
        engine
            .register_equipment(eq, "PC-01".into(), EquipmentKind::Pc)
            .await
            .unwrap();
        let cal = VenueCalendar::default();
        let clock = Arc::new(ManualClock::new(cal.slot_span(today(), 10, 1).start));
        (BookingDesk::new(engine, Venue::default(), clock.clone()), eq, clock)
    }

    fn request(eq: Ulid, date: NaiveDate, start: u8, hours: u8) -> BookingRequest {
        BookingRequest {
            id: None,
            equipment_id: Some(eq),
            date: Some(date),
            start_hour: Some(start),
            hours: Some(hours),
            customer: Some("nova".into()),
        }
    }

    #[tokio::test]
    async fn commit_then_slot_disappears() {
        let (desk, eq, _) = desk("commit.wal").await;
        let booking = desk.submit(request(eq, tomorrow(), 14, 2)).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.end - booking.start, 2 * HOUR_MS);

        let day = desk.day(Some(eq), Some(tomorrow())).await.unwrap();
        assert!(!day.retained().contains(&14));
        assert!(!day.retained().contains(&15));
        assert_eq!(day.max_hours(13), 1);
        assert_eq!(day.max_hours(16), 8);
    }

    #[tokio::test]
    async fn overlapping_submit_is_rejected() {
        let (desk, eq, _) = desk("overlap.wal").await;
        desk.submit(request(eq, tomorrow(), 14, 2)).await.unwrap();
        let err = desk.submit(request(eq, tomorrow(), 13, 2)).await.unwrap_err();
        assert!(matches!(err, BookingError::SlotUnavailable { start_hour: 13, .. }));
    }

    #[tokio::test]
    async fn store_conflict_surfaces_as_unavailable() {
        let (desk, eq, _) = desk("store_conflict.wal").await;
        let slot = desk.venue().slot_span(tomorrow(), 18, 1);
        // Starts at 23:00 the day before, so tomorrow's hour walk skips it
        // and only the store's own overlap check can catch it.
        let late_start = desk.venue().slot_span(today(), 23, 1).start;
        desk.store()
            .place_booking(Ulid::new(), eq, Span::new(late_start, slot.end), None)
            .await
            .unwrap();
        let err = desk.submit(request(eq, tomorrow(), 18, 1)).await.unwrap_err();
        assert!(matches!(err, BookingError::SlotUnavailable { .. }));
    }

    #[tokio::test]
    async fn missing_inputs_are_named() {
        let (desk, eq, _) = desk("missing.wal").await;
        let mut req = request(eq, tomorrow(), 14, 1);
        req.equipment_id = None;
        assert!(matches!(desk.submit(req).await, Err(BookingError::MissingInput("equipment"))));
        let mut req = request(eq, tomorrow(), 14, 1);
        req.date = None;
        assert!(matches!(desk.submit(req).await, Err(BookingError::MissingInput("date"))));
        let mut req = request(eq, tomorrow(), 14, 1);
        req.hours = None;
        assert!(matches!(desk.submit(req).await, Err(BookingError::MissingInput("duration"))));
    }

    #[tokio::test]
    async fn unknown_equipment_is_an_input_error() {
        let (desk, _, _) = desk("unknown.wal").await;
        let ghost = Ulid::new();
        let err = desk.submit(request(ghost, tomorrow(), 14, 1)).await.unwrap_err();
        assert!(matches!(err, BookingError::UnknownEquipment(id) if id == ghost));
    }

    #[tokio::test]
    async fn beyond_horizon_is_rejected() {
        let (desk, eq, _) = desk("horizon.wal").await;
        let far = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        assert!(matches!(
            desk.submit(request(eq, far, 14, 1)).await,
            Err(BookingError::InvalidInput(_))
        ));
        let edge = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(desk.submit(request(eq, edge, 14, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn past_hour_today_is_unavailable() {
        let (desk, eq, clock) = desk("today.wal").await;
        clock.set(VenueCalendar::default().slot_span(today(), 15, 1).start + 5 * 60_000);
        let err = desk.submit(request(eq, today(), 15, 1)).await.unwrap_err();
        assert!(matches!(err, BookingError::SlotUnavailable { .. }));
        assert!(desk.submit(request(eq, today(), 16, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn too_long_is_unavailable() {
        let (desk, eq, _) = desk("too_long.wal").await;
        let err = desk.submit(request(eq, tomorrow(), 20, 5)).await.unwrap_err();
        assert!(matches!(err, BookingError::SlotUnavailable { hours: 5, .. }));
    }

    #[tokio::test]
    async fn closed_day_rejects_submission() {
        let (desk, eq, _) = desk("closed.wal").await;
        desk.store()
            .close_day(tomorrow(), "Tournament".into())
            .await
            .unwrap();
        assert!(matches!(
            desk.submit(request(eq, tomorrow(), 14, 1)).await,
            Err(BookingError::SlotUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn extension_grows_until_the_next_booking() {
        let (desk, eq, _) = desk("extend.wal").await;
        let first = desk.submit(request(eq, tomorrow(), 14, 2)).await.unwrap();
        desk.submit(request(eq, tomorrow(), 18, 1)).await.unwrap();

        let grown = desk.extend(first.id, 2).await.unwrap();
        assert_eq!(grown.end - grown.start, 4 * HOUR_MS);

        let err = desk.extend(first.id, 1).await.unwrap_err();
        assert!(matches!(err, BookingError::SlotUnavailable { start_hour: 18, .. }));
    }

    #[tokio::test]
    async fn cancelled_booking_cannot_be_extended() {
        let (desk, eq, _) = desk("extend_cancelled.wal").await;
        let b = desk.submit(request(eq, tomorrow(), 14, 1)).await.unwrap();
        desk.store()
            .set_booking_status(b.id, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert!(matches!(desk.extend(b.id, 1).await, Err(BookingError::InvalidInput(_))));
        assert!(matches!(
            desk.extend(Ulid::new(), 1).await,
            Err(BookingError::UnknownBooking(_))
        ));
    }

    struct Unreachable;

    #[async_trait]
    impl IntervalSource for Unreachable {
        async fn equipment(&self, _: Ulid) -> Result<EquipmentInfo, EngineError> {
            Err(EngineError::WalError("connection reset".into()))
        }
        async fn occupying_bookings(&self, _: Ulid, _: Span) -> Result<Vec<BookingInfo>, EngineError> {
            Err(EngineError::WalError("connection reset".into()))
        }
        async fn blackouts_for(&self, _: Ulid, _: Span) -> Result<Vec<Blackout>, EngineError> {
            Err(EngineError::WalError("connection reset".into()))
        }
        async fn closed_day(&self, _: NaiveDate) -> Result<Option<ClosedDay>, EngineError> {
            Err(EngineError::WalError("connection reset".into()))
        }
        async fn booking(&self, id: Ulid) -> Result<BookingInfo, EngineError> {
            Err(EngineError::NotFound(id))
        }
    }

    #[async_trait]
    impl BookingWriter for Unreachable {
        async fn write_booking(&self, _: BookingDraft) -> Result<Ulid, EngineError> {
            panic!("write must not be attempted when the read failed");
        }
        async fn extend_booking(&self, _: Ulid, _: Ms) -> Result<BookingInfo, EngineError> {
            panic!("write must not be attempted when the read failed");
        }
    }

    #[tokio::test]
    async fn fetch_failure_fails_closed() {
        let clock = Arc::new(ManualClock::new(VenueCalendar::default().slot_span(today(), 10, 1).start));
        let desk = BookingDesk::new(Arc::new(Unreachable), Venue::default(), clock);
        let err = desk
            .submit(request(Ulid::new(), tomorrow(), 14, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Upstream(_)));
    }
}
