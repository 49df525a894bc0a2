use chrono::{DateTime, NaiveDate};
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::booking::BookingRequest;
use crate::limits::MAX_SQL_LEN;
use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertEquipment {
        id: Ulid,
        name: String,
        kind: EquipmentKind,
    },
    RetireEquipment {
        id: Ulid,
    },
    StartMaintenance {
        equipment_id: Ulid,
        reason: Option<String>,
    },
    EndMaintenance {
        equipment_id: Ulid,
    },
    InsertBooking(BookingRequest),
    TransitionBooking {
        booking_id: Ulid,
        status: BookingStatus,
    },
    ExtendBooking {
        booking_id: Ulid,
        hours: u8,
    },
    InsertBlackout {
        id: Ulid,
        start: Ms,
        end: Ms,
        equipment: Vec<Ulid>,
        title: Option<String>,
    },
    DeleteBlackout {
        id: Ulid,
    },
    CloseDay {
        date: NaiveDate,
        reason: String,
    },
    ReopenDay {
        date: NaiveDate,
    },
    // Availability filters stay optional: a missing one is an input error
    // reported by the booking desk, not a syntax error.
    SelectSlots {
        equipment_id: Option<Ulid>,
        date: Option<NaiveDate>,
    },
    SelectDurations {
        equipment_id: Option<Ulid>,
        date: Option<NaiveDate>,
        start_hour: Option<u8>,
    },
    SelectSchedule {
        date: Option<NaiveDate>,
        equipment_id: Option<Ulid>,
    },
    SelectEquipment,
    SelectBookings {
        equipment_id: Ulid,
    },
    SelectBlackouts,
    SelectClosedDays {
        date: Option<NaiveDate>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    if sql.len() > MAX_SQL_LEN {
        return Err(SqlError::Unsupported("statement too long".into()));
    }
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Default column order for INSERTs written without a column list.
fn default_columns(table: &str) -> Option<&'static [&'static str]> {
    Some(match table {
        "equipment" => &["id", "name", "kind"],
        "maintenance" => &["equipment_id", "reason"],
        "bookings" => &["id", "equipment_id", "date", "start_hour", "hours", "customer"],
        "booking_transitions" => &["booking_id", "status"],
        "booking_extensions" => &["booking_id", "hours"],
        "blackouts" => &["id", "start", "end", "equipment_ids", "title"],
        "closed_days" => &["date", "reason"],
        _ => return None,
    })
}

/// One VALUES row keyed by column name.
struct Row<'a> {
    table: String,
    cells: Vec<(String, &'a Expr)>,
}

impl<'a> Row<'a> {
    /// Present and not NULL.
    fn get(&self, col: &str) -> Option<&'a Expr> {
        self.cells
            .iter()
            .find(|(name, _)| name == col)
            .map(|(_, expr)| *expr)
            .filter(|expr| !is_null(expr))
    }

    fn require(&self, col: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(col)
            .ok_or_else(|| SqlError::MissingColumn(self.table.clone(), col))
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let defaults = default_columns(&table).ok_or_else(|| SqlError::UnknownTable(table.clone()))?;
    let values = extract_insert_values(insert)?;

    let columns: Vec<String> = if insert.columns.is_empty() {
        defaults.iter().map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    };
    if values.len() != columns.len() {
        return Err(SqlError::WrongArity(table, columns.len(), values.len()));
    }
    let row = Row {
        table: table.clone(),
        cells: columns.into_iter().zip(values.iter()).collect(),
    };

    match table.as_str() {
        "equipment" => Ok(Command::InsertEquipment {
            id: parse_ulid(row.require("id")?)?,
            name: parse_string(row.require("name")?)?,
            kind: parse_string(row.require("kind")?)?
                .parse()
                .map_err(SqlError::Parse)?,
        }),
        "maintenance" => Ok(Command::StartMaintenance {
            equipment_id: parse_ulid(row.require("equipment_id")?)?,
            reason: row.get("reason").map(parse_string).transpose()?,
        }),
        "bookings" => Ok(Command::InsertBooking(BookingRequest {
            id: row.get("id").map(parse_ulid).transpose()?,
            equipment_id: row.get("equipment_id").map(parse_ulid).transpose()?,
            date: row.get("date").map(parse_date).transpose()?,
            start_hour: row.get("start_hour").map(parse_u8).transpose()?,
            hours: row.get("hours").map(parse_u8).transpose()?,
            customer: row.get("customer").map(parse_string).transpose()?,
        })),
        "booking_transitions" => Ok(Command::TransitionBooking {
            booking_id: parse_ulid(row.require("booking_id")?)?,
            status: parse_string(row.require("status")?)?
                .parse()
                .map_err(SqlError::Parse)?,
        }),
        "booking_extensions" => Ok(Command::ExtendBooking {
            booking_id: parse_ulid(row.require("booking_id")?)?,
            hours: parse_u8(row.require("hours")?)?,
        }),
        "blackouts" => {
            let start = parse_instant(row.require("start")?)?;
            let end = parse_instant(row.require("end")?)?;
            if end <= start {
                return Err(SqlError::Parse("blackout end must be after start".into()));
            }
            Ok(Command::InsertBlackout {
                id: parse_ulid(row.require("id")?)?,
                start,
                end,
                equipment: parse_ulid_list(row.require("equipment_ids")?)?,
                title: row.get("title").map(parse_string).transpose()?,
            })
        }
        "closed_days" => Ok(Command::CloseDay {
            date: parse_date(row.require("date")?)?,
            reason: parse_string(row.require("reason")?)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = collect_filters(delete.selection.as_ref())?;
    let require = |col: &'static str| filter(&filters, col).ok_or(SqlError::MissingFilter(col));

    match table.as_str() {
        "equipment" => Ok(Command::RetireEquipment {
            id: parse_ulid(require("id")?)?,
        }),
        "maintenance" => Ok(Command::EndMaintenance {
            equipment_id: parse_ulid(require("equipment_id")?)?,
        }),
        "blackouts" => Ok(Command::DeleteBlackout {
            id: parse_ulid(require("id")?)?,
        }),
        "closed_days" => Ok(Command::ReopenDay {
            date: parse_date(require("date")?)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;
    let filters = collect_filters(select.selection.as_ref())?;
    let ulid_filter = |col| filter(&filters, col).map(parse_ulid).transpose();
    let date_filter = |col| filter(&filters, col).map(parse_date).transpose();

    match table.as_str() {
        "slots" => Ok(Command::SelectSlots {
            equipment_id: ulid_filter("equipment_id")?,
            date: date_filter("date")?,
        }),
        "durations" => Ok(Command::SelectDurations {
            equipment_id: ulid_filter("equipment_id")?,
            date: date_filter("date")?,
            start_hour: filter(&filters, "start_hour").map(parse_u8).transpose()?,
        }),
        "schedule" => Ok(Command::SelectSchedule {
            date: date_filter("date")?,
            equipment_id: ulid_filter("equipment_id")?,
        }),
        "equipment" => Ok(Command::SelectEquipment),
        "bookings" => Ok(Command::SelectBookings {
            equipment_id: ulid_filter("equipment_id")?
                .ok_or(SqlError::MissingFilter("equipment_id"))?,
        }),
        "blackouts" => Ok(Command::SelectBlackouts),
        "closed_days" => Ok(Command::SelectClosedDays {
            date: date_filter("date")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Flatten `a = x AND b = y AND ...` into column/value pairs.
fn collect_filters(selection: Option<&Expr>) -> Result<Vec<(String, &Expr)>, SqlError> {
    let mut out = Vec::new();
    if let Some(expr) = selection {
        collect_eq(expr, &mut out)?;
    }
    Ok(out)
}

fn collect_eq<'a>(expr: &'a Expr, out: &mut Vec<(String, &'a Expr)>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_eq(left, out)?;
            collect_eq(right, out)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.push((col, right.as_ref()));
            Ok(())
        }
        Expr::Nested(inner) => collect_eq(inner, out),
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

fn filter<'a>(filters: &[(String, &'a Expr)], col: &str) -> Option<&'a Expr> {
    filters.iter().find(|(c, _)| c == col).map(|(_, e)| *e)
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<&[Expr], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.as_slice()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

/// Text of a string or bare number literal.
fn literal_text(expr: &Expr) -> Result<&str, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s) | Value::Number(s, _)) => Ok(s.as_str()),
        Some(other) => Err(SqlError::Parse(format!("expected literal, got {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        _ => Err(SqlError::Parse(format!("expected string, got {expr}"))),
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = literal_text(expr)?;
    Ulid::from_string(s.trim()).map_err(|e| SqlError::Parse(format!("bad ULID {s:?}: {e}")))
}

/// Comma-separated ULIDs in one string.
fn parse_ulid_list(expr: &Expr) -> Result<Vec<Ulid>, SqlError> {
    parse_string(expr)?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID {s:?}: {e}"))))
        .collect()
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return Ok(-parse_i64(expr)?);
    }
    let s = literal_text(expr)?;
    s.parse().map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}")))
}

fn parse_u8(expr: &Expr) -> Result<u8, SqlError> {
    let v = parse_i64(expr)?;
    u8::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of range 0..=255")))
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = literal_text(expr)?;
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

/// Unix milliseconds, or an RFC 3339 timestamp string.
fn parse_instant(expr: &Expr) -> Result<Ms, SqlError> {
    if let Some(Value::SingleQuotedString(s)) = extract_value(expr) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s.trim()) {
            return Ok(dt.timestamp_millis());
        }
    }
    parse_i64(expr)
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(String, usize, usize),
    MissingColumn(String, &'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(t, col) => write!(f, "{t}: missing column {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const EQ: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const EQ2: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    fn ulid(s: &str) -> Ulid {
        Ulid::from_string(s).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn insert_equipment_with_columns() {
        let sql = format!("INSERT INTO equipment (id, name, kind) VALUES ('{EQ}', 'PC-01', 'pc')");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertEquipment {
                id: ulid(EQ),
                name: "PC-01".into(),
                kind: EquipmentKind::Pc,
            }
        );
    }

    #[test]
    fn insert_equipment_positional_and_reordered() {
        let positional = format!("INSERT INTO equipment VALUES ('{EQ}', 'Quest 3', 'vr')");
        let reordered = format!("INSERT INTO equipment (kind, id, name) VALUES ('vr', '{EQ}', 'Quest 3')");
        assert_eq!(parse_sql(&positional).unwrap(), parse_sql(&reordered).unwrap());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let sql = format!("INSERT INTO equipment (id, name, kind) VALUES ('{EQ}', 'Cab', 'arcade')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn retire_equipment() {
        let sql = format!("DELETE FROM equipment WHERE id = '{EQ}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::RetireEquipment { id: ulid(EQ) });
    }

    #[test]
    fn maintenance_on_and_off() {
        let on = format!("INSERT INTO maintenance (equipment_id, reason) VALUES ('{EQ}', 'GPU swap')");
        assert_eq!(
            parse_sql(&on).unwrap(),
            Command::StartMaintenance {
                equipment_id: ulid(EQ),
                reason: Some("GPU swap".into()),
            }
        );
        let no_reason = format!("INSERT INTO maintenance (equipment_id, reason) VALUES ('{EQ}', NULL)");
        assert!(matches!(
            parse_sql(&no_reason).unwrap(),
            Command::StartMaintenance { reason: None, .. }
        ));
        let off = format!("DELETE FROM maintenance WHERE equipment_id = '{EQ}'");
        assert_eq!(parse_sql(&off).unwrap(), Command::EndMaintenance { equipment_id: ulid(EQ) });
    }

    #[test]
    fn insert_booking_request() {
        let sql = format!(
            "INSERT INTO bookings (equipment_id, date, start_hour, hours, customer) \
             VALUES ('{EQ}', '2026-10-17', 14, 2, 'nova')"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertBooking(BookingRequest {
                id: None,
                equipment_id: Some(ulid(EQ)),
                date: Some(date("2026-10-17")),
                start_hour: Some(14),
                hours: Some(2),
                customer: Some("nova".into()),
            })
        );
    }

    #[test]
    fn booking_missing_fields_stay_empty() {
        let sql = format!("INSERT INTO bookings (equipment_id, start_hour) VALUES ('{EQ}', 14)");
        match parse_sql(&sql).unwrap() {
            Command::InsertBooking(req) => {
                assert_eq!(req.date, None);
                assert_eq!(req.hours, None);
            }
            other => panic!("expected InsertBooking, got {other:?}"),
        }
    }

    #[test]
    fn booking_status_and_extension() {
        let sql = format!("INSERT INTO booking_transitions (booking_id, status) VALUES ('{EQ}', 'arrived')");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::TransitionBooking {
                booking_id: ulid(EQ),
                status: BookingStatus::Active,
            }
        );
        let sql = format!("INSERT INTO booking_extensions (booking_id, hours) VALUES ('{EQ}', 2)");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::ExtendBooking {
                booking_id: ulid(EQ),
                hours: 2,
            }
        );
    }

    #[test]
    fn insert_blackout_with_equipment_list() {
        let sql = format!(
            r#"INSERT INTO blackouts (id, start, "end", equipment_ids, title) VALUES ('{EQ}', 1000, 2000, '{EQ}, {EQ2}', 'Finals')"#
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertBlackout {
                id: ulid(EQ),
                start: 1000,
                end: 2000,
                equipment: vec![ulid(EQ), ulid(EQ2)],
                title: Some("Finals".into()),
            }
        );
    }

    #[test]
    fn blackout_accepts_rfc3339() {
        let sql = format!(
            r#"INSERT INTO blackouts (id, start, "end", equipment_ids) VALUES ('{EQ}', '2026-10-17T18:00:00Z', '2026-10-18T02:00:00Z', '{EQ}')"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBlackout { start, end, .. } => assert_eq!(end - start, 8 * HOUR_MS),
            other => panic!("expected InsertBlackout, got {other:?}"),
        }
    }

    #[test]
    fn inverted_blackout_is_rejected() {
        let sql = format!(r#"INSERT INTO blackouts (id, start, "end", equipment_ids) VALUES ('{EQ}', 2000, 1000, '{EQ}')"#);
        assert!(parse_sql(&sql).is_err());
    }

    #[test]
    fn closed_days() {
        let close = "INSERT INTO closed_days (date, reason) VALUES ('2026-12-24', 'Holiday')";
        assert_eq!(
            parse_sql(close).unwrap(),
            Command::CloseDay {
                date: date("2026-12-24"),
                reason: "Holiday".into(),
            }
        );
        let reopen = "DELETE FROM closed_days WHERE date = '2026-12-24'";
        assert_eq!(parse_sql(reopen).unwrap(), Command::ReopenDay { date: date("2026-12-24") });
        let list = "SELECT * FROM closed_days";
        assert_eq!(parse_sql(list).unwrap(), Command::SelectClosedDays { date: None });
    }

    #[test]
    fn select_slots_and_durations() {
        let sql = format!("SELECT * FROM slots WHERE equipment_id = '{EQ}' AND date = '2026-10-17'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectSlots {
                equipment_id: Some(ulid(EQ)),
                date: Some(date("2026-10-17")),
            }
        );
        let sql = format!(
            "SELECT * FROM durations WHERE equipment_id = '{EQ}' AND date = '2026-10-17' AND start_hour = 16"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectDurations {
                equipment_id: Some(ulid(EQ)),
                date: Some(date("2026-10-17")),
                start_hour: Some(16),
            }
        );
    }

    #[test]
    fn select_slots_without_filters_defers_the_error() {
        assert_eq!(
            parse_sql("SELECT * FROM slots").unwrap(),
            Command::SelectSlots {
                equipment_id: None,
                date: None,
            }
        );
    }

    #[test]
    fn select_schedule_and_lists() {
        assert_eq!(
            parse_sql("SELECT * FROM schedule WHERE date = '2026-10-18'").unwrap(),
            Command::SelectSchedule {
                date: Some(date("2026-10-18")),
                equipment_id: None,
            }
        );
        assert_eq!(parse_sql("SELECT * FROM equipment").unwrap(), Command::SelectEquipment);
        assert_eq!(parse_sql("SELECT * FROM blackouts").unwrap(), Command::SelectBlackouts);
        let sql = format!("SELECT * FROM bookings WHERE equipment_id = '{EQ}'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectBookings { equipment_id: ulid(EQ) }
        );
        assert!(matches!(
            parse_sql("SELECT * FROM bookings"),
            Err(SqlError::MissingFilter("equipment_id"))
        ));
    }

    #[test]
    fn bad_date_is_a_parse_error() {
        let sql = format!("SELECT * FROM slots WHERE equipment_id = '{EQ}' AND date = '17/10/2026'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn arity_mismatch() {
        let sql = format!("INSERT INTO equipment (id, name) VALUES ('{EQ}', 'PC', 'pc')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::WrongArity(_, 2, 3))));
    }

    #[test]
    fn unknown_table_errors() {
        let sql = format!("INSERT INTO foobar (id) VALUES ('{EQ}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
