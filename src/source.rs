use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::schedule::{DaySnapshot, VenueCalendar};

/// Read side the availability pipeline depends on.
#[async_trait]
pub trait IntervalSource: Send + Sync {
    async fn equipment(&self, id: Ulid) -> Result<EquipmentInfo, EngineError>;

    async fn occupying_bookings(
        &self,
        equipment_id: Ulid,
        window: Span,
    ) -> Result<Vec<BookingInfo>, EngineError>;

    async fn blackouts_for(
        &self,
        equipment_id: Ulid,
        window: Span,
    ) -> Result<Vec<Blackout>, EngineError>;

    async fn closed_day(&self, date: NaiveDate) -> Result<Option<ClosedDay>, EngineError>;

    async fn booking(&self, id: Ulid) -> Result<BookingInfo, EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDraft {
    pub id: Ulid,
    pub equipment_id: Ulid,
    pub span: Span,
    pub customer: Option<String>,
}

/// Write side. Both calls fail with `EngineError::Conflict` when the store
/// already holds an overlapping booking.
#[async_trait]
pub trait BookingWriter: Send + Sync {
    async fn write_booking(&self, draft: BookingDraft) -> Result<Ulid, EngineError>;

    async fn extend_booking(&self, id: Ulid, new_end: Ms) -> Result<BookingInfo, EngineError>;
}

/// Everything the pipeline needs for one (equipment, date), fetched fresh.
pub async fn fetch_day<S: IntervalSource + ?Sized>(
    source: &S,
    calendar: &VenueCalendar,
    equipment_id: Ulid,
    date: NaiveDate,
) -> Result<DaySnapshot, EngineError> {
    let window = calendar.day_window(date);
    let equipment = source.equipment(equipment_id).await?;
    let bookings = source.occupying_bookings(equipment_id, window).await?;
    let blackouts = source.blackouts_for(equipment_id, window).await?;
    let closed = source.closed_day(date).await?;
    Ok(DaySnapshot {
        date,
        window,
        equipment,
        bookings,
        blackouts,
        closed,
    })
}

#[async_trait]
impl IntervalSource for Engine {
    async fn equipment(&self, id: Ulid) -> Result<EquipmentInfo, EngineError> {
        self.get_equipment(id).await.ok_or(EngineError::NotFound(id))
    }

    async fn occupying_bookings(
        &self,
        equipment_id: Ulid,
        window: Span,
    ) -> Result<Vec<BookingInfo>, EngineError> {
        Engine::occupying_bookings(self, equipment_id, &window).await
    }

    async fn blackouts_for(
        &self,
        equipment_id: Ulid,
        window: Span,
    ) -> Result<Vec<Blackout>, EngineError> {
        Ok(Engine::blackouts_for(self, equipment_id, &window))
    }

    async fn closed_day(&self, date: NaiveDate) -> Result<Option<ClosedDay>, EngineError> {
        Ok(Engine::closed_day(self, date))
    }

    async fn booking(&self, id: Ulid) -> Result<BookingInfo, EngineError> {
        self.get_booking(id).await.ok_or(EngineError::NotFound(id))
    }
}

#[async_trait]
impl BookingWriter for Engine {
    async fn write_booking(&self, draft: BookingDraft) -> Result<Ulid, EngineError> {
        self.place_booking(draft.id, draft.equipment_id, draft.span, draft.customer)
            .await?;
        Ok(draft.id)
    }

    async fn extend_booking(&self, id: Ulid, new_end: Ms) -> Result<BookingInfo, EngineError> {
        Engine::extend_booking(self, id, new_end).await
    }
}
