use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: statements executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "rigslot_queries_total";

/// Histogram: statement latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "rigslot_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: open client connections.
pub const CONNECTIONS_ACTIVE: &str = "rigslot_connections_active";

/// Counter: connections accepted.
pub const CONNECTIONS_TOTAL: &str = "rigslot_connections_total";

/// Counter: connections turned away at the limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "rigslot_connections_rejected_total";

/// Histogram: journal group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "rigslot_wal_flush_duration_seconds";

/// Histogram: events per journal flush.
pub const WAL_FLUSH_BATCH_SIZE: &str = "rigslot_wal_flush_batch_size";

// ── Booking domain ──────────────────────────────────────────────

/// Counter: bookings written.
pub const BOOKINGS_COMMITTED_TOTAL: &str = "rigslot_bookings_committed_total";

/// Counter: submits refused as no longer available. Labels: stage
/// (`revalidate` or `commit`).
pub const BOOKING_REJECTIONS_TOTAL: &str = "rigslot_booking_rejections_total";

/// Counter: accepted session extensions.
pub const BOOKING_EXTENSIONS_TOTAL: &str = "rigslot_booking_extensions_total";

/// Counter: availability recomputes. Labels: trigger.
pub const RECOMPUTES_TOTAL: &str = "rigslot_recomputes_total";

/// Counter: recomputes that fell back to the empty view after a failed read.
pub const DEGRADED_READS_TOTAL: &str = "rigslot_degraded_reads_total";

/// Install the Prometheus exporter on `bind:port`. No-op if port is None.
pub fn init(bind: &str, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://{addr}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertEquipment { .. } => "insert_equipment",
        Command::RetireEquipment { .. } => "retire_equipment",
        Command::StartMaintenance { .. } => "start_maintenance",
        Command::EndMaintenance { .. } => "end_maintenance",
        Command::InsertBooking(_) => "insert_booking",
        Command::TransitionBooking { .. } => "transition_booking",
        Command::ExtendBooking { .. } => "extend_booking",
        Command::InsertBlackout { .. } => "insert_blackout",
        Command::DeleteBlackout { .. } => "delete_blackout",
        Command::CloseDay { .. } => "close_day",
        Command::ReopenDay { .. } => "reopen_day",
        Command::SelectSlots { .. } => "select_slots",
        Command::SelectDurations { .. } => "select_durations",
        Command::SelectSchedule { .. } => "select_schedule",
        Command::SelectEquipment => "select_equipment",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectBlackouts => "select_blackouts",
        Command::SelectClosedDays { .. } => "select_closed_days",
    }
}
