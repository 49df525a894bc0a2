/// The venue's fixed daily operating window.
///
/// The grid starts at `open_hour` and runs for `slot_count` hourly slots,
/// wrapping through midnight (12 + 13 slots ends on hour 0). `close_hour` is
/// the boundary used to cap session length, independent of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingHours {
    pub open_hour: u8,
    pub slot_count: u8,
    pub close_hour: u8,
    pub max_session_hours: u8,
}

impl Default for OperatingHours {
    fn default() -> Self {
        Self {
            open_hour: 12,
            slot_count: 13,
            close_hour: 24,
            max_session_hours: 12,
        }
    }
}

impl OperatingHours {
    pub fn validate(&self) -> Result<(), String> {
        if self.open_hour > 23 {
            return Err(format!("open hour {} out of range 0..=23", self.open_hour));
        }
        if self.slot_count == 0 || self.slot_count > 24 {
            return Err(format!("slot count {} out of range 1..=24", self.slot_count));
        }
        if self.close_hour == 0 || self.close_hour > 24 {
            return Err(format!("close hour {} out of range 1..=24", self.close_hour));
        }
        if self.close_hour <= self.open_hour {
            return Err(format!(
                "close hour {} must be after open hour {}",
                self.close_hour, self.open_hour
            ));
        }
        if self.max_session_hours == 0 {
            return Err("max session hours must be at least 1".into());
        }
        Ok(())
    }

    /// Hour-of-day slot starts in grid order. Same output for every date.
    pub fn slot_grid(&self) -> Vec<u8> {
        (0..self.slot_count)
            .map(|i| (self.open_hour + i) % 24)
            .collect()
    }

    pub fn contains(&self, hour: u8) -> bool {
        hour < 24 && (hour + 24 - self.open_hour) % 24 < self.slot_count
    }
}

/// `HH:00` label for an hour-of-day.
pub fn slot_label(hour: u8) -> String {
    format!("{hour:02}:00")
}
