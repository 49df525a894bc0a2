use crate::model::{DAY_MS, HOUR_MS, Ms};

pub const MAX_EQUIPMENT: usize = 10_000;
pub const MAX_BOOKINGS_PER_EQUIPMENT: usize = 100_000;

pub const MAX_NAME_LEN: usize = 64;
pub const MAX_REASON_LEN: usize = 256;
pub const MAX_CUSTOMER_LEN: usize = 128;
pub const MAX_TITLE_LEN: usize = 256;

pub const MAX_BLACKOUT_EQUIPMENT: usize = 256;
pub const MAX_BLACKOUT_SPAN_MS: Ms = 14 * DAY_MS;

/// Longest single booking span the store accepts.
pub const MAX_BOOKING_SPAN_MS: Ms = 24 * HOUR_MS;

/// Largest single extension request, in hours.
pub const MAX_EXTENSION_HOURS: u8 = 12;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

pub const MAX_SQL_LEN: usize = 16 * 1024;
