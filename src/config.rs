use std::path::PathBuf;

use crate::schedule::{OperatingHours, Venue, VenueCalendar};

/// Server settings, read once from `RIGSLOT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub hours: OperatingHours,
    pub horizon_days: u32,
    pub utc_offset_minutes: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "rigslot".into(),
            max_connections: 256,
            compact_threshold: 1000,
            metrics_port: None,
            hours: OperatingHours::default(),
            horizon_days: 3,
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but did not parse.
    Invalid { var: &'static str, value: String },
    Hours(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { var, value } => write!(f, "invalid {var}: {value:?}"),
            ConfigError::Hours(msg) => write!(f, "invalid operating hours: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Unset variables take their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let metrics_port = match lookup("RIGSLOT_METRICS_PORT") {
            None => None,
            Some(value) => Some(value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "RIGSLOT_METRICS_PORT",
                value,
            })?),
        };
        let config = Self {
            port: parsed(&lookup, "RIGSLOT_PORT", d.port)?,
            bind: lookup("RIGSLOT_BIND").unwrap_or(d.bind),
            data_dir: lookup("RIGSLOT_DATA_DIR").map_or(d.data_dir, PathBuf::from),
            password: lookup("RIGSLOT_PASSWORD").unwrap_or(d.password),
            max_connections: parsed(&lookup, "RIGSLOT_MAX_CONNECTIONS", d.max_connections)?,
            compact_threshold: parsed(&lookup, "RIGSLOT_COMPACT_THRESHOLD", d.compact_threshold)?,
            metrics_port,
            hours: OperatingHours {
                open_hour: parsed(&lookup, "RIGSLOT_OPEN_HOUR", d.hours.open_hour)?,
                slot_count: parsed(&lookup, "RIGSLOT_SLOT_COUNT", d.hours.slot_count)?,
                close_hour: parsed(&lookup, "RIGSLOT_CLOSE_HOUR", d.hours.close_hour)?,
                max_session_hours: parsed(
                    &lookup,
                    "RIGSLOT_MAX_SESSION_HOURS",
                    d.hours.max_session_hours,
                )?,
            },
            horizon_days: parsed(&lookup, "RIGSLOT_HORIZON_DAYS", d.horizon_days)?,
            utc_offset_minutes: parsed(&lookup, "RIGSLOT_UTC_OFFSET_MINUTES", d.utc_offset_minutes)?,
        };
        config.hours.validate().map_err(ConfigError::Hours)?;
        if config.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid {
                var: "RIGSLOT_UTC_OFFSET_MINUTES",
                value: config.utc_offset_minutes.to_string(),
            });
        }
        Ok(config)
    }

    pub fn venue(&self) -> Venue {
        Venue {
            hours: self.hours,
            calendar: VenueCalendar::new(self.utc_offset_minutes),
            horizon_days: self.horizon_days,
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("rigslot.wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.venue(), Venue::default());
        assert_eq!(config.wal_path(), PathBuf::from("./data/rigslot.wal"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("RIGSLOT_PORT", "6000"),
            ("RIGSLOT_METRICS_PORT", "9100"),
            ("RIGSLOT_OPEN_HOUR", "10"),
            ("RIGSLOT_SLOT_COUNT", "14"),
            ("RIGSLOT_HORIZON_DAYS", "7"),
            ("RIGSLOT_UTC_OFFSET_MINUTES", "-300"),
        ]))
        .unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.hours.open_hour, 10);
        assert_eq!(config.hours.slot_count, 14);
        let venue = config.venue();
        assert_eq!(venue.horizon_days, 7);
        assert_eq!(venue.calendar, VenueCalendar::new(-300));
    }

    #[test]
    fn garbage_is_reported() {
        let err = Config::from_lookup(lookup(&[("RIGSLOT_MAX_CONNECTIONS", "lots")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "RIGSLOT_MAX_CONNECTIONS",
                value: "lots".into(),
            }
        );
    }

    #[test]
    fn impossible_hours_abort() {
        let err = Config::from_lookup(lookup(&[("RIGSLOT_SLOT_COUNT", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Hours(_)));
        let err = Config::from_lookup(lookup(&[("RIGSLOT_OPEN_HOUR", "30")])).unwrap_err();
        assert!(matches!(err, ConfigError::Hours(_)));
        let err = Config::from_lookup(lookup(&[("RIGSLOT_CLOSE_HOUR", "10")])).unwrap_err();
        assert!(matches!(err, ConfigError::Hours(_)));
    }

    #[test]
    fn offset_beyond_a_day_is_rejected() {
        let err = Config::from_lookup(lookup(&[("RIGSLOT_UTC_OFFSET_MINUTES", "1500")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
