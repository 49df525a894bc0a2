use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::Event;
use crate::notify::NotifyHub;
use crate::observability;
use crate::schedule::selection::{degraded, recompute, unknown_equipment};
use crate::schedule::{AvailabilityView, Clock, SelectionContext, Venue};
use crate::source::{fetch_day, IntervalSource};

const TICK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCommand {
    Equipment(Option<Ulid>),
    Date(Option<NaiveDate>),
    Start(Option<u8>),
    Hours(Option<u8>),
    Refresh,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Selection,
    Change,
    Tick,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Trigger::Selection => "selection",
            Trigger::Change => "change",
            Trigger::Tick => "tick",
        }
    }
}

/// The controller task has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchClosed;

impl std::fmt::Display for WatchClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("availability watch stopped")
    }
}

impl std::error::Error for WatchClosed {}

/// Live availability for one caller's selection.
///
/// A background task re-runs the pipeline when the selection changes, when
/// the change feed reports something touching the selected unit and day, and
/// once a minute while the selected day is today. Dropping the handle stops
/// the task.
pub struct AvailabilityWatch {
    commands: mpsc::Sender<SelectionCommand>,
    view: watch::Receiver<AvailabilityView>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AvailabilityWatch {
    pub fn spawn<S: IntervalSource + 'static>(
        source: Arc<S>,
        notify: Arc<NotifyHub>,
        venue: Venue,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(32);
        let (view_tx, view) = watch::channel(AvailabilityView::default());
        let cancel = CancellationToken::new();
        let controller = Controller {
            source,
            notify,
            venue,
            clock,
            ctx: SelectionContext::default(),
            view: view_tx,
        };
        let task = tokio::spawn(controller.run(command_rx, cancel.clone()));
        Self {
            commands,
            view,
            cancel,
            task: Some(task),
        }
    }

    pub async fn send(&self, cmd: SelectionCommand) -> Result<(), WatchClosed> {
        self.commands.send(cmd).await.map_err(|_| WatchClosed)
    }

    pub async fn select_equipment(&self, id: Ulid) -> Result<(), WatchClosed> {
        self.send(SelectionCommand::Equipment(Some(id))).await
    }

    pub async fn select_date(&self, date: NaiveDate) -> Result<(), WatchClosed> {
        self.send(SelectionCommand::Date(Some(date))).await
    }

    pub async fn select_start(&self, hour: u8) -> Result<(), WatchClosed> {
        self.send(SelectionCommand::Start(Some(hour))).await
    }

    pub async fn select_hours(&self, hours: u8) -> Result<(), WatchClosed> {
        self.send(SelectionCommand::Hours(Some(hours))).await
    }

    /// Latest published view.
    pub fn current(&self) -> AvailabilityView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AvailabilityView> {
        self.view.clone()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for AvailabilityWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Controller<S> {
    source: Arc<S>,
    notify: Arc<NotifyHub>,
    venue: Venue,
    clock: Arc<dyn Clock>,
    ctx: SelectionContext,
    view: watch::Sender<AvailabilityView>,
}

/// Next event from an optional receiver; pending forever when there is none.
async fn next_event(rx: &mut Option<broadcast::Receiver<Event>>) -> Result<Event, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl<S: IntervalSource> Controller<S> {
    async fn run(mut self, mut commands: mpsc::Receiver<SelectionCommand>, cancel: CancellationToken) {
        let mut unit_rx: Option<broadcast::Receiver<Event>> = None;
        let mut venue_rx = Some(self.notify.subscribe_venue());
        let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + TICK, TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.refresh(Trigger::Selection).await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.apply(cmd) {
                        unit_rx = self.ctx.equipment_id.map(|id| self.notify.subscribe(id));
                    }
                    self.refresh(Trigger::Selection).await;
                }
                event = next_event(&mut unit_rx) => {
                    if self.should_refresh(&event) {
                        self.refresh(Trigger::Change).await;
                    }
                    if matches!(event, Err(RecvError::Closed)) {
                        unit_rx = None;
                    }
                }
                event = next_event(&mut venue_rx) => {
                    if self.should_refresh(&event) {
                        self.refresh(Trigger::Change).await;
                    }
                    if matches!(event, Err(RecvError::Closed)) {
                        venue_rx = None;
                    }
                }
                _ = tick.tick() => {
                    if self.selected_today() {
                        self.refresh(Trigger::Tick).await;
                    }
                }
            }
        }
        debug!("availability watch stopped");
    }

    /// Apply a selection change. Returns true when the unit changed.
    fn apply(&mut self, cmd: SelectionCommand) -> bool {
        match cmd {
            SelectionCommand::Equipment(id) => {
                let changed = self.ctx.equipment_id != id;
                self.ctx.equipment_id = id;
                return changed;
            }
            SelectionCommand::Date(date) => self.ctx.date = date,
            SelectionCommand::Start(hour) => self.ctx.start_hour = hour,
            SelectionCommand::Hours(hours) => self.ctx.hours = hours,
            SelectionCommand::Refresh => {}
        }
        false
    }

    fn should_refresh(&self, event: &Result<Event, RecvError>) -> bool {
        let Some((equipment_id, date)) = self.ctx.target() else {
            return false;
        };
        match event {
            Ok(event) => {
                let window = self.venue.calendar.day_window(date);
                event.touches(equipment_id, date, &window)
            }
            // Missed some changes; assume one of them mattered.
            Err(RecvError::Lagged(_)) => true,
            Err(RecvError::Closed) => false,
        }
    }

    fn selected_today(&self) -> bool {
        self.ctx.date == Some(self.venue.local_now(self.clock.as_ref()).date)
    }

    async fn refresh(&mut self, trigger: Trigger) {
        metrics::counter!(observability::RECOMPUTES_TOTAL, "trigger" => trigger.as_str()).increment(1);
        let view = match self.ctx.target() {
            None => AvailabilityView {
                selection: self.ctx.clone(),
                ..AvailabilityView::default()
            },
            Some((equipment_id, date)) => {
                let fetched =
                    fetch_day(self.source.as_ref(), &self.venue.calendar, equipment_id, date).await;
                match fetched {
                    Ok(snapshot) => {
                        let now = self.venue.local_now(self.clock.as_ref());
                        recompute(&mut self.ctx, &snapshot, now, &self.venue.hours)
                    }
                    Err(EngineError::NotFound(id)) if id == equipment_id => {
                        debug!(equipment = %equipment_id, "selected equipment does not exist");
                        unknown_equipment(&self.ctx)
                    }
                    Err(e) => {
                        warn!(equipment = %equipment_id, %date, "availability degraded: {e}");
                        metrics::counter!(observability::DEGRADED_READS_TOTAL).increment(1);
                        degraded(&self.ctx)
                    }
                }
            }
        };
        let slots = view.day.as_ref().map_or(0, |d| d.slots.len());
        debug!(trigger = trigger.as_str(), slots, "recomputed");
        self.view.send_replace(view);
    }
}
