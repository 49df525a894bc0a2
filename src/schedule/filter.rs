use super::calendar::LocalNow;
use super::grid::OperatingHours;
use super::occupancy::DayOccupancy;

/// Grid hours that can still be booked on `occupancy.date`, in grid order.
///
/// Closed days and past dates are empty. On today only hours strictly after
/// the current hour survive; minutes are ignored.
pub fn bookable_slots(
    hours: &OperatingHours,
    occupancy: &DayOccupancy,
    closed: bool,
    now: LocalNow,
) -> Vec<u8> {
    if closed || occupancy.date < now.date {
        return Vec::new();
    }
    let today = occupancy.date == now.date;
    hours
        .slot_grid()
        .into_iter()
        .filter(|&h| hours.contains(h))
        .filter(|&h| !occupancy.is_occupied(h))
        .filter(|&h| !today || h > now.hour)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn unit() -> EquipmentInfo {
        EquipmentInfo {
            id: Ulid::from_parts(7, 7),
            name: "PC-03".into(),
            kind: EquipmentKind::Pc,
            active: true,
            maintenance: None,
        }
    }

    fn empty(d: NaiveDate) -> DayOccupancy {
        DayOccupancy::new(d)
    }

    fn early(d: NaiveDate) -> LocalNow {
        LocalNow { date: d, hour: 9 }
    }

    #[test]
    fn future_day_without_data_is_the_whole_grid() {
        let hours = OperatingHours::default();
        let slots = bookable_slots(&hours, &empty(date(20)), false, early(date(16)));
        assert_eq!(slots, hours.slot_grid());
        assert_eq!(slots.len(), 13);
    }

    #[test]
    fn today_drops_current_and_earlier_hours() {
        let hours = OperatingHours::default();
        let now = LocalNow { date: date(16), hour: 15 };
        let slots = bookable_slots(&hours, &empty(date(16)), false, now);
        assert_eq!(slots, (16..=23).collect::<Vec<u8>>());
    }

    #[test]
    fn today_before_opening_keeps_afternoon() {
        let hours = OperatingHours::default();
        let slots = bookable_slots(&hours, &empty(date(16)), false, early(date(16)));
        assert_eq!(slots, (12..=23).collect::<Vec<u8>>());
    }

    #[test]
    fn closed_day_is_empty() {
        let hours = OperatingHours::default();
        assert!(bookable_slots(&hours, &empty(date(18)), true, early(date(16))).is_empty());
    }

    #[test]
    fn past_day_is_empty() {
        let hours = OperatingHours::default();
        assert!(bookable_slots(&hours, &empty(date(15)), false, early(date(16))).is_empty());
    }

    #[test]
    fn occupied_hours_are_removed() {
        let hours = OperatingHours::default();
        let cal = crate::schedule::calendar::VenueCalendar::default();
        let eq = unit();
        let d = date(20);
        let booking = BookingInfo {
            id: Ulid::new(),
            equipment_id: eq.id,
            start: cal.slot_span(d, 14, 2).start,
            end: cal.slot_span(d, 14, 2).end,
            status: BookingStatus::Confirmed,
            customer: None,
        };
        let occ = DayOccupancy::build(d, &cal.day_window(d), &eq, &[booking], &[]);
        let slots = bookable_slots(&hours, &occ, false, early(date(16)));
        assert!(!slots.contains(&14));
        assert!(!slots.contains(&15));
        assert!(slots.contains(&13));
        assert!(slots.contains(&16));
        assert_eq!(slots.len(), 11);
    }

    #[test]
    fn maintenance_empties_the_day() {
        let hours = OperatingHours::default();
        let cal = crate::schedule::calendar::VenueCalendar::default();
        let mut eq = unit();
        eq.maintenance = Some(Maintenance { reason: None });
        let d = date(20);
        let occ = DayOccupancy::build(d, &cal.day_window(d), &eq, &[], &[]);
        assert!(bookable_slots(&hours, &occ, false, early(date(16))).is_empty());
    }
}
