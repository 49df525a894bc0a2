use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::BookingStatus;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Overlaps an occupying booking on the same unit.
    Conflict(Ulid),
    Retired(Ulid),
    NotInMaintenance(Ulid),
    /// Booking no longer holds time and cannot be changed that way.
    Inactive(Ulid),
    InvalidTransition {
        id: Ulid,
        from: BookingStatus,
        to: BookingStatus,
    },
    InvalidBlackout(&'static str),
    DateNotFound(NaiveDate),
    DateAlreadyClosed(NaiveDate),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            EngineError::Retired(id) => write!(f, "equipment retired: {id}"),
            EngineError::NotInMaintenance(id) => write!(f, "equipment not in maintenance: {id}"),
            EngineError::Inactive(id) => write!(f, "booking no longer active: {id}"),
            EngineError::InvalidTransition { id, from, to } => {
                write!(f, "booking {id} cannot go from {from} to {to}")
            }
            EngineError::InvalidBlackout(msg) => write!(f, "invalid blackout: {msg}"),
            EngineError::DateNotFound(date) => write!(f, "date not closed: {date}"),
            EngineError::DateAlreadyClosed(date) => write!(f, "date already closed: {date}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
