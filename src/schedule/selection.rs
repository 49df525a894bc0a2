use chrono::NaiveDate;
use ulid::Ulid;

use super::calendar::LocalNow;
use super::day::{resolve_day, DayAvailability, DaySnapshot};
use super::grid::OperatingHours;

/// What the caller has picked so far. Every field is optional; later fields
/// only make sense once earlier ones are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionContext {
    pub equipment_id: Option<Ulid>,
    pub date: Option<NaiveDate>,
    pub start_hour: Option<u8>,
    pub hours: Option<u8>,
}

impl SelectionContext {
    /// Equipment and date, the two inputs the pipeline needs.
    pub fn target(&self) -> Option<(Ulid, NaiveDate)> {
        Some((self.equipment_id?, self.date?))
    }
}

/// Latest availability for a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityView {
    pub selection: SelectionContext,
    /// `None` until equipment and date are both chosen, or when degraded.
    pub day: Option<DayAvailability>,
    /// Durations for the selected start; empty without one.
    pub durations: Vec<u8>,
    /// Interval data could not be fetched; nothing is offered.
    pub degraded: bool,
    /// The selected unit does not exist. Bad input, not an outage.
    pub unknown_equipment: bool,
}

/// Drop choices the new result no longer supports. A start that fell out of
/// the retained set takes the duration with it; a duration beyond the new
/// maximum is cleared alone.
pub fn reconcile(ctx: &mut SelectionContext, day: &DayAvailability) {
    let Some(start) = ctx.start_hour else {
        ctx.hours = None;
        return;
    };
    let max = day.max_hours(start);
    if max == 0 {
        ctx.start_hour = None;
        ctx.hours = None;
    } else if ctx.hours.is_some_and(|h| h > max) {
        ctx.hours = None;
    }
}

pub fn recompute(
    ctx: &mut SelectionContext,
    snapshot: &DaySnapshot,
    now: LocalNow,
    hours: &OperatingHours,
) -> AvailabilityView {
    let day = resolve_day(hours, snapshot, now);
    reconcile(ctx, &day);
    let durations = ctx.start_hour.map(|s| day.durations(s)).unwrap_or_default();
    AvailabilityView {
        selection: ctx.clone(),
        day: Some(day),
        durations,
        degraded: false,
        unknown_equipment: false,
    }
}

/// View published when the interval source failed: no slots, flagged.
pub fn degraded(ctx: &SelectionContext) -> AvailabilityView {
    AvailabilityView {
        selection: ctx.clone(),
        day: None,
        durations: Vec::new(),
        degraded: true,
        unknown_equipment: false,
    }
}

/// View published when the selected unit is not in the store.
pub fn unknown_equipment(ctx: &SelectionContext) -> AvailabilityView {
    AvailabilityView {
        selection: ctx.clone(),
        unknown_equipment: true,
        ..AvailabilityView::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::schedule::calendar::VenueCalendar;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn now() -> LocalNow {
        LocalNow {
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            hour: 11,
        }
    }

    fn snapshot() -> DaySnapshot {
        DaySnapshot {
            date: date(),
            window: VenueCalendar::default().day_window(date()),
            equipment: EquipmentInfo {
                id: Ulid::from_parts(5, 5),
                name: "PC-12".into(),
                kind: EquipmentKind::Pc,
                active: true,
                maintenance: None,
            },
            bookings: Vec::new(),
            blackouts: Vec::new(),
            closed: None,
        }
    }

    fn book(snap: &mut DaySnapshot, hour: u8, hours: u8) {
        let span = VenueCalendar::default().slot_span(snap.date, hour, hours);
        snap.bookings.push(BookingInfo {
            id: Ulid::new(),
            equipment_id: snap.equipment.id,
            start: span.start,
            end: span.end,
            status: BookingStatus::Confirmed,
            customer: None,
        });
    }

    fn selected(start: u8, hours: u8) -> SelectionContext {
        SelectionContext {
            equipment_id: Some(Ulid::from_parts(5, 5)),
            date: Some(date()),
            start_hour: Some(start),
            hours: Some(hours),
        }
    }

    #[test]
    fn durations_follow_the_start() {
        let mut ctx = selected(20, 2);
        let view = recompute(&mut ctx, &snapshot(), now(), &OperatingHours::default());
        assert_eq!(view.durations, vec![1, 2, 3, 4]);
        assert_eq!(view.selection, selected(20, 2));
        assert!(!view.degraded);
    }

    #[test]
    fn taken_start_clears_start_and_duration() {
        let mut snap = snapshot();
        book(&mut snap, 20, 1);
        let mut ctx = selected(20, 2);
        let view = recompute(&mut ctx, &snap, now(), &OperatingHours::default());
        assert_eq!(ctx.start_hour, None);
        assert_eq!(ctx.hours, None);
        assert!(view.durations.is_empty());
        assert_eq!(ctx.equipment_id, Some(Ulid::from_parts(5, 5)));
    }

    #[test]
    fn shrunk_run_clears_only_duration() {
        let mut snap = snapshot();
        book(&mut snap, 22, 1);
        let mut ctx = selected(18, 5);
        let view = recompute(&mut ctx, &snap, now(), &OperatingHours::default());
        assert_eq!(ctx.start_hour, Some(18));
        assert_eq!(ctx.hours, None);
        assert_eq!(view.durations, vec![1, 2, 3, 4]);
    }

    #[test]
    fn fitting_duration_is_kept() {
        let mut snap = snapshot();
        book(&mut snap, 22, 1);
        let mut ctx = selected(18, 4);
        recompute(&mut ctx, &snap, now(), &OperatingHours::default());
        assert_eq!(ctx.hours, Some(4));
    }

    #[test]
    fn repeated_recompute_is_stable() {
        let mut snap = snapshot();
        book(&mut snap, 15, 2);
        let mut ctx = selected(13, 2);
        let hours = OperatingHours::default();
        let first = recompute(&mut ctx, &snap, now(), &hours);
        let second = recompute(&mut ctx, &snap, now(), &hours);
        assert_eq!(first, second);
    }

    #[test]
    fn degraded_offers_nothing() {
        let ctx = selected(13, 2);
        let view = degraded(&ctx);
        assert!(view.degraded);
        assert!(view.day.is_none());
        assert!(view.durations.is_empty());
        assert_eq!(view.selection, ctx);
    }

    #[test]
    fn unknown_unit_is_not_degraded() {
        let ctx = selected(13, 2);
        let view = unknown_equipment(&ctx);
        assert!(view.unknown_equipment);
        assert!(!view.degraded);
        assert!(view.day.is_none());
        assert!(view.durations.is_empty());
    }

    #[test]
    fn target_needs_both_fields() {
        let mut ctx = SelectionContext::default();
        assert!(ctx.target().is_none());
        ctx.equipment_id = Some(Ulid::from_parts(1, 2));
        assert!(ctx.target().is_none());
        ctx.date = Some(date());
        assert!(ctx.target().is_some());
    }
}
