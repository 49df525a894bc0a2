use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn validate_span(span: &Span, max_width: Ms) -> Result<(), EngineError> {
    if span.start >= span.end {
        return Err(EngineError::LimitExceeded("span end must be after start"));
    }
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > max_width {
        return Err(EngineError::LimitExceeded("span too wide"));
    }
    Ok(())
}

/// Reject `span` if it overlaps any booking on the unit that still holds
/// time. `except` skips one booking, used when extending it.
pub(crate) fn check_no_conflict(
    eq: &EquipmentState,
    span: &Span,
    except: Option<ulid::Ulid>,
) -> Result<(), EngineError> {
    match eq.occupying(span).find(|b| Some(b.id) != except) {
        Some(b) => Err(EngineError::Conflict(b.id)),
        None => Ok(()),
    }
}
