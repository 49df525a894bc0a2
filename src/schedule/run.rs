use chrono::NaiveDate;

use super::calendar::LocalNow;
use super::grid::OperatingHours;

/// Consecutive retained hours starting at `start`, walking forward modulo 24.
pub fn contiguous_run(retained: &[u8], start: u8) -> u8 {
    let mut run = 0u8;
    while run < 24 && retained.contains(&((start + run) % 24)) {
        run += 1;
    }
    run
}

/// Hours between `start` and closing time. Zero once the start hour has
/// passed on today.
pub fn closing_cap(hours: &OperatingHours, date: NaiveDate, start: u8, now: LocalNow) -> u8 {
    if date == now.date && start <= now.hour {
        return 0;
    }
    hours.close_hour.saturating_sub(start)
}

/// Longest session that can start at `start`. Zero rejects the start.
pub fn max_duration(
    hours: &OperatingHours,
    retained: &[u8],
    date: NaiveDate,
    start: u8,
    now: LocalNow,
) -> u8 {
    if !retained.contains(&start) {
        return 0;
    }
    contiguous_run(retained, start)
        .min(closing_cap(hours, date, start, now))
        .min(hours.max_session_hours)
}

pub fn selectable_durations(max: u8) -> Vec<u8> {
    (1..=max).collect()
}

/// Whether a session occupying `[start, end)` hours can grow by `extra`.
///
/// The added hours must all be retained, stay before closing and keep the
/// whole session within the maximum length.
pub fn extension_fits(
    hours: &OperatingHours,
    retained: &[u8],
    start: u8,
    end: u8,
    extra: u8,
) -> bool {
    if extra == 0 || end < start {
        return false;
    }
    let new_end = end as u16 + extra as u16;
    if new_end > hours.close_hour as u16 {
        return false;
    }
    if new_end - start as u16 > hours.max_session_hours as u16 {
        return false;
    }
    (end..end + extra).all(|h| retained.contains(&h))
}
