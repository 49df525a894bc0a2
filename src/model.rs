use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the only instant type.
pub type Ms = i64;

pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 24 * HOUR_MS;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Equipment category. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipmentKind {
    Pc,
    Console,
    Vr,
}

impl EquipmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentKind::Pc => "pc",
            EquipmentKind::Console => "console",
            EquipmentKind::Vr => "vr",
        }
    }
}

impl FromStr for EquipmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pc" => Ok(EquipmentKind::Pc),
            "console" => Ok(EquipmentKind::Console),
            "vr" => Ok(EquipmentKind::Vr),
            other => Err(format!("unknown equipment kind: {other}")),
        }
    }
}

impl fmt::Display for EquipmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking lifecycle. Only pending/confirmed/active hold time on the equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn occupies(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Active
        )
    }

    pub fn can_become(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Active)
                | (Pending, Cancelled)
                | (Confirmed, Active)
                | (Confirmed, Cancelled)
                | (Active, Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            // "arrived" is what the front desk calls it
            "active" | "arrived" => Ok(BookingStatus::Active),
            "completed" | "released" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Present while the unit is in maintenance mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintenance {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Ulid,
    pub span: Span,
    pub status: BookingStatus,
    pub customer: Option<String>,
}

impl Booking {
    pub fn info(&self, equipment_id: Ulid) -> BookingInfo {
        BookingInfo {
            id: self.id,
            equipment_id,
            start: self.span.start,
            end: self.span.end,
            status: self.status,
            customer: self.customer.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EquipmentState {
    pub id: Ulid,
    pub name: String,
    pub kind: EquipmentKind,
    pub maintenance: Option<Maintenance>,
    /// Retired units stay around for historical bookings but offer no slots.
    pub active: bool,
    /// All bookings regardless of status, sorted by `span.start`.
    pub bookings: Vec<Booking>,
}

impl EquipmentState {
    pub fn new(id: Ulid, name: String, kind: EquipmentKind) -> Self {
        Self {
            id,
            name,
            kind,
            maintenance: None,
            active: true,
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Bookings whose span overlaps the query window, any status.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self.bookings.partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start)
    }

    /// Overlapping bookings that still hold time.
    pub fn occupying(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        self.overlapping(query).filter(|b| b.status.occupies())
    }

    pub fn info(&self) -> EquipmentInfo {
        EquipmentInfo {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            active: self.active,
            maintenance: self.maintenance.clone(),
        }
    }
}

/// Event-based blackout. Independent of the operating window and may span days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blackout {
    pub id: Ulid,
    pub span: Span,
    /// Sorted, deduplicated, never empty.
    pub equipment: Vec<Ulid>,
    pub title: Option<String>,
}

impl Blackout {
    pub fn blocks(&self, equipment_id: &Ulid) -> bool {
        self.equipment.binary_search(equipment_id).is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedDay {
    pub date: NaiveDate,
    pub reason: String,
}

/// Journal record and change-feed payload. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    EquipmentRegistered {
        id: Ulid,
        name: String,
        kind: EquipmentKind,
    },
    EquipmentRetired {
        id: Ulid,
    },
    MaintenanceStarted {
        id: Ulid,
        reason: Option<String>,
    },
    MaintenanceEnded {
        id: Ulid,
    },
    BookingPlaced {
        id: Ulid,
        equipment_id: Ulid,
        span: Span,
        customer: Option<String>,
    },
    BookingStatusChanged {
        id: Ulid,
        equipment_id: Ulid,
        status: BookingStatus,
    },
    BookingExtended {
        id: Ulid,
        equipment_id: Ulid,
        end: Ms,
    },
    BlackoutAdded {
        id: Ulid,
        span: Span,
        equipment: Vec<Ulid>,
        title: Option<String>,
    },
    BlackoutRemoved {
        id: Ulid,
        span: Span,
        equipment: Vec<Ulid>,
    },
    DayClosed {
        date: NaiveDate,
        reason: String,
    },
    DayReopened {
        date: NaiveDate,
    },
}

impl Event {
    /// Whether this change can alter availability of `equipment_id` on the day
    /// `date` spanning `window`.
    pub fn touches(&self, equipment_id: Ulid, date: NaiveDate, window: &Span) -> bool {
        match self {
            Event::EquipmentRegistered { id, .. }
            | Event::EquipmentRetired { id }
            | Event::MaintenanceStarted { id, .. }
            | Event::MaintenanceEnded { id } => *id == equipment_id,
            Event::BookingPlaced {
                equipment_id: eq,
                span,
                ..
            } => *eq == equipment_id && span.overlaps(window),
            // Span not carried; any status change or extension on the unit counts.
            Event::BookingStatusChanged { equipment_id: eq, .. }
            | Event::BookingExtended { equipment_id: eq, .. } => *eq == equipment_id,
            Event::BlackoutAdded { span, equipment, .. }
            | Event::BlackoutRemoved { span, equipment, .. } => {
                equipment.contains(&equipment_id) && span.overlaps(window)
            }
            Event::DayClosed { date: d, .. } | Event::DayReopened { date: d } => *d == date,
        }
    }

    /// Equipment channels this event is delivered on. Empty means venue-wide.
    pub fn equipment_scope(&self) -> Vec<Ulid> {
        match self {
            Event::EquipmentRegistered { id, .. }
            | Event::EquipmentRetired { id }
            | Event::MaintenanceStarted { id, .. }
            | Event::MaintenanceEnded { id } => vec![*id],
            Event::BookingPlaced { equipment_id, .. }
            | Event::BookingStatusChanged { equipment_id, .. }
            | Event::BookingExtended { equipment_id, .. } => vec![*equipment_id],
            Event::BlackoutAdded { equipment, .. } | Event::BlackoutRemoved { equipment, .. } => {
                equipment.clone()
            }
            Event::DayClosed { .. } | Event::DayReopened { .. } => Vec::new(),
        }
    }
}

// ── Query result types ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentInfo {
    pub id: Ulid,
    pub name: String,
    pub kind: EquipmentKind,
    pub active: bool,
    pub maintenance: Option<Maintenance>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingInfo {
    pub id: Ulid,
    pub equipment_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub status: BookingStatus,
    pub customer: Option<String>,
}

impl BookingInfo {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}
