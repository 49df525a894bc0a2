use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::Sink;
use futures::stream;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{
    AuthSource, DefaultServerParameterProvider, LoginInfo, Password, StartupHandler,
};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use tokio::net::TcpStream;
use ulid::Ulid;

use crate::booking::{BookingDesk, BookingError};
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability::{self, command_label};
use crate::schedule::slot_label;
use crate::sql::{self, Command, SqlError};

pub struct RigslotHandler {
    desk: Arc<BookingDesk<Engine>>,
    query_parser: Arc<RigslotQueryParser>,
}

impl RigslotHandler {
    pub fn new(desk: Arc<BookingDesk<Engine>>) -> Self {
        Self {
            desk,
            query_parser: Arc::new(RigslotQueryParser),
        }
    }

    fn engine(&self) -> &Engine {
        self.desk.store()
    }

    /// Parse, run and record one statement.
    async fn run(&self, query: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Response> {
        let engine = self.engine();
        match cmd {
            Command::InsertEquipment { id, name, kind } => {
                engine
                    .register_equipment(id, name, kind)
                    .await
                    .map_err(engine_err)?;
                Ok(inserted(1))
            }
            Command::RetireEquipment { id } => {
                engine.retire_equipment(id).await.map_err(engine_err)?;
                Ok(deleted(1))
            }
            Command::StartMaintenance {
                equipment_id,
                reason,
            } => {
                engine
                    .start_maintenance(equipment_id, reason)
                    .await
                    .map_err(engine_err)?;
                Ok(inserted(1))
            }
            Command::EndMaintenance { equipment_id } => {
                engine
                    .end_maintenance(equipment_id)
                    .await
                    .map_err(engine_err)?;
                Ok(deleted(1))
            }
            Command::InsertBooking(request) => {
                self.desk.submit(request).await.map_err(booking_err)?;
                Ok(inserted(1))
            }
            Command::TransitionBooking { booking_id, status } => {
                engine
                    .set_booking_status(booking_id, status)
                    .await
                    .map_err(engine_err)?;
                Ok(inserted(1))
            }
            Command::ExtendBooking { booking_id, hours } => {
                self.desk
                    .extend(booking_id, hours)
                    .await
                    .map_err(booking_err)?;
                Ok(inserted(1))
            }
            Command::InsertBlackout {
                id,
                start,
                end,
                equipment,
                title,
            } => {
                engine
                    .add_blackout(id, Span::new(start, end), equipment, title)
                    .await
                    .map_err(engine_err)?;
                Ok(inserted(1))
            }
            Command::DeleteBlackout { id } => {
                engine.remove_blackout(id).await.map_err(engine_err)?;
                Ok(deleted(1))
            }
            Command::CloseDay { date, reason } => {
                engine.close_day(date, reason).await.map_err(engine_err)?;
                Ok(inserted(1))
            }
            Command::ReopenDay { date } => {
                engine.reopen_day(date).await.map_err(engine_err)?;
                Ok(deleted(1))
            }
            Command::SelectSlots { equipment_id, date } => {
                let day = self.desk.day(equipment_id, date).await.map_err(booking_err)?;
                let schema = Arc::new(slots_schema());
                let eq = day.equipment_id.to_string();
                let date = day.date.to_string();
                let rows: Vec<PgWireResult<_>> = day
                    .slots
                    .iter()
                    .map(|slot| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&eq)?;
                        encoder.encode_field(&date)?;
                        encoder.encode_field(&(slot.hour as i32))?;
                        encoder.encode_field(&slot_label(slot.hour))?;
                        encoder.encode_field(&(slot.max_hours as i32))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectDurations {
                equipment_id,
                date,
                start_hour,
            } => {
                let day = self.desk.day(equipment_id, date).await.map_err(booking_err)?;
                let start = start_hour
                    .ok_or(BookingError::MissingInput("start hour"))
                    .map_err(booking_err)?;
                let schema = Arc::new(durations_schema());
                let rows: Vec<PgWireResult<_>> = day
                    .durations(start)
                    .into_iter()
                    .map(|hours| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&(hours as i32))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectSchedule { date, equipment_id } => {
                let units: Vec<EquipmentInfo> = match equipment_id {
                    Some(id) => vec![
                        engine
                            .get_equipment(id)
                            .await
                            .ok_or(BookingError::UnknownEquipment(id))
                            .map_err(booking_err)?,
                    ],
                    None => engine
                        .list_equipment()
                        .await
                        .into_iter()
                        .filter(|e| e.active)
                        .collect(),
                };
                let grid = self.desk.venue().hours.slot_grid();
                let schema = Arc::new(schedule_schema());
                let mut rows: Vec<PgWireResult<_>> = Vec::new();
                for unit in units {
                    let day = self.desk.day(Some(unit.id), date).await.map_err(booking_err)?;
                    let eq = unit.id.to_string();
                    let closed_reason = day.closed.as_ref().map(|c| c.reason.clone());
                    rows.extend(grid.iter().map(|&hour| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&eq)?;
                        encoder.encode_field(&unit.name)?;
                        encoder.encode_field(&(hour as i32))?;
                        encoder.encode_field(&slot_label(hour))?;
                        encoder.encode_field(&day.classify(hour).as_str())?;
                        encoder.encode_field(&closed_reason)?;
                        Ok(encoder.take_row())
                    }));
                }
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectEquipment => {
                let schema = Arc::new(equipment_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .list_equipment()
                    .await
                    .into_iter()
                    .map(|unit| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&unit.id.to_string())?;
                        encoder.encode_field(&unit.name)?;
                        encoder.encode_field(&unit.kind.as_str())?;
                        encoder.encode_field(&unit.active)?;
                        encoder.encode_field(&unit.maintenance.is_some())?;
                        encoder.encode_field(&unit.maintenance.and_then(|m| m.reason))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectBookings { equipment_id } => {
                let bookings = engine.get_bookings(equipment_id).await.map_err(engine_err)?;
                let schema = Arc::new(bookings_schema());
                let rows: Vec<PgWireResult<_>> = bookings
                    .into_iter()
                    .map(|b| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&b.id.to_string())?;
                        encoder.encode_field(&b.equipment_id.to_string())?;
                        encoder.encode_field(&b.start)?;
                        encoder.encode_field(&b.end)?;
                        encoder.encode_field(&b.status.as_str())?;
                        encoder.encode_field(&b.customer)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectBlackouts => {
                let schema = Arc::new(blackouts_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .list_blackouts()
                    .into_iter()
                    .map(|b| {
                        let ids: Vec<String> = b.equipment.iter().map(Ulid::to_string).collect();
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&b.id.to_string())?;
                        encoder.encode_field(&b.span.start)?;
                        encoder.encode_field(&b.span.end)?;
                        encoder.encode_field(&ids.join(","))?;
                        encoder.encode_field(&b.title)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectClosedDays { date } => {
                let closed = match date {
                    Some(date) => engine.closed_day(date).into_iter().collect(),
                    None => engine.list_closed_days(),
                };
                let schema = Arc::new(closed_days_schema());
                let rows: Vec<PgWireResult<_>> = closed
                    .into_iter()
                    .map(|c| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&c.date.to_string())?;
                        encoder.encode_field(&c.reason)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
        }
    }
}

fn inserted(rows: usize) -> Response {
    Response::Execution(Tag::new("INSERT").with_rows(rows))
}

fn deleted(rows: usize) -> Response {
    Response::Execution(Tag::new("DELETE").with_rows(rows))
}

// ── Result schemas ───────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn slots_schema() -> Vec<FieldInfo> {
    vec![
        field("equipment_id", Type::VARCHAR),
        field("date", Type::VARCHAR),
        field("start_hour", Type::INT4),
        field("label", Type::VARCHAR),
        field("max_hours", Type::INT4),
    ]
}

fn durations_schema() -> Vec<FieldInfo> {
    vec![field("hours", Type::INT4)]
}

fn schedule_schema() -> Vec<FieldInfo> {
    vec![
        field("equipment_id", Type::VARCHAR),
        field("name", Type::VARCHAR),
        field("hour", Type::INT4),
        field("label", Type::VARCHAR),
        field("state", Type::VARCHAR),
        field("closed_reason", Type::VARCHAR),
    ]
}

fn equipment_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("name", Type::VARCHAR),
        field("kind", Type::VARCHAR),
        field("active", Type::BOOL),
        field("maintenance", Type::BOOL),
        field("reason", Type::VARCHAR),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("equipment_id", Type::VARCHAR),
        field("start", Type::INT8),
        field("end", Type::INT8),
        field("status", Type::VARCHAR),
        field("customer", Type::VARCHAR),
    ]
}

fn blackouts_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("start", Type::INT8),
        field("end", Type::INT8),
        field("equipment_ids", Type::VARCHAR),
        field("title", Type::VARCHAR),
    ]
}

fn closed_days_schema() -> Vec<FieldInfo> {
    vec![field("date", Type::VARCHAR), field("reason", Type::VARCHAR)]
}

/// Row shape of a statement, judged from the table after FROM. Writes have
/// no rows.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let lower = sql.to_lowercase();
    let mut words = lower
        .split(|c: char| c.is_whitespace() || c == ';' || c == '(')
        .filter(|w| !w.is_empty());
    if words.next() != Some("select") {
        return vec![];
    }
    let table = words
        .skip_while(|w| *w != "from")
        .nth(1)
        .map(|t| t.trim_matches('"').rsplit('.').next().unwrap_or(t).to_string());
    match table.as_deref() {
        Some("slots") => slots_schema(),
        Some("durations") => durations_schema(),
        Some("schedule") => schedule_schema(),
        Some("equipment") => equipment_schema(),
        Some("bookings") => bookings_schema(),
        Some("blackouts") => blackouts_schema(),
        Some("closed_days") => closed_days_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for RigslotHandler {
    async fn do_query<C>(&self, _client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(vec![self.run(query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RigslotQueryParser;

#[async_trait]
impl QueryParser for RigslotQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for RigslotHandler {
    type Statement = String;
    type QueryParser = RigslotQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.run(&substitute_params(portal)).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Byte ranges and indexes of `$N` placeholders outside quoted literals.
fn placeholders(sql: &str) -> Vec<(usize, usize, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quoted = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                quoted = !quoted;
                i += 1;
            }
            b'$' if !quoted => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if let Ok(n) = sql[start + 1..i].parse::<usize>() {
                    found.push((start, i, n));
                }
            }
            _ => i += 1,
        }
    }
    found
}

/// Highest `$N` placeholder in the statement.
fn count_params(sql: &str) -> usize {
    placeholders(sql).into_iter().map(|(_, _, n)| n).max().unwrap_or(0)
}

/// Inline bound text parameters as quoted literals in one pass, so text inside
/// an inlined value is never rescanned.
fn inline_params<P: AsRef<[u8]>>(sql: &str, params: &[Option<P>]) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut copied = 0;
    for (start, end, n) in placeholders(sql) {
        let Some(param) = n.checked_sub(1).and_then(|i| params.get(i)) else {
            continue;
        };
        result.push_str(&sql[copied..start]);
        match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes.as_ref());
                result.push('\'');
                result.push_str(&text.replace('\'', "''"));
                result.push('\'');
            }
            None => result.push_str("NULL"),
        }
        copied = end;
    }
    result.push_str(&sql[copied..]);
    result
}

fn substitute_params(portal: &Portal<String>) -> String {
    inline_params(&portal.statement.statement, &portal.parameters)
}

// ── Auth and factory ─────────────────────────────────────────────

/// One shared password for every user name.
#[derive(Debug)]
pub struct SharedPassword(String);

#[async_trait]
impl AuthSource for SharedPassword {
    async fn get_password(&self, _login: &LoginInfo) -> PgWireResult<Password> {
        Ok(Password::new(None, self.0.as_bytes().to_vec()))
    }
}

pub struct RigslotFactory {
    handler: Arc<RigslotHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<SharedPassword, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl RigslotFactory {
    pub fn new(desk: Arc<BookingDesk<Engine>>, password: String) -> Self {
        Self {
            handler: Arc::new(RigslotHandler::new(desk)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                SharedPassword(password),
                DefaultServerParameterProvider::default(),
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RigslotFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client until it disconnects.
pub async fn process_connection(
    socket: TcpStream,
    desk: Arc<BookingDesk<Engine>>,
    password: String,
) -> std::io::Result<()> {
    let factory = RigslotFactory::new(desk, password);
    pgwire::tokio::process_socket(socket, None, factory).await
}

// ── Error mapping ────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

fn engine_err(e: EngineError) -> PgWireError {
    let code = match e {
        EngineError::Conflict(_) => "23P01",
        _ => "P0001",
    };
    user_error(code, e.to_string())
}

fn booking_code(e: &BookingError) -> &'static str {
    match e {
        BookingError::SlotUnavailable { .. } => "40001",
        BookingError::Upstream(EngineError::Conflict(_)) => "23P01",
        BookingError::Upstream(_) => "P0001",
        BookingError::MissingInput(_)
        | BookingError::InvalidInput(_)
        | BookingError::UnknownEquipment(_)
        | BookingError::UnknownBooking(_) => "22023",
    }
}

fn booking_err(e: BookingError) -> PgWireError {
    user_error(booking_code(&e), e.to_string())
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error("42601", e.to_string())
}
