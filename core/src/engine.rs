//! The simulation engine: runs the stage loop.
//!
//! STAGE LOOP (fixed):
//!   1. begin_stage: compute wager, pick asset, start a fresh operation
//!   2. operation runs on timers until it delivers its result
//!   3. controller settles the balance; the operation is discarded
//!   4. acknowledge_stage_complete: advance, or complete on the last stage
//!
//! RULES:
//!   - At most one operation is live. Starting another, restarting or
//!     tearing down cancels every timer the old one owns.
//!   - Timers whose owner is not the live operation are dropped.
//!   - Every event is logged, then dispatched to collaborators, then a
//!     snapshot is published once per batch.
//!   - Inbound actions that do not apply are silent no-ops.
//!   - The notification feed runs on its own timer from start until
//!     completion and never touches the controller.

use crate::{
    clock::SimClock,
    collaborator::{
        ChartRenderer, Collaborators, CompletionTarget, CuePlayer, NotificationSink, SimObserver,
    },
    command::PlayerCommand,
    config::SimConfig,
    controller::{Advance, SimulationController, SimulationState},
    error::{SimError, SimResult},
    event::{EventLog, SimEvent},
    market::{MarketFeed, MarketPoint, MarketSeriesGenerator},
    notification::NotificationFeed,
    operation::{OperationState, OperationStateMachine, StageContext, StageOutput, StageView},
    rng::RngBank,
    snapshot::{OperationSnapshot, SimSnapshot},
    timer::{FiredTimer, StageToken, TimerKind, TimerQueue, FEED_TOKEN},
    types::{Amount, Direction, RunId, StageIndex, Tick},
};

pub struct SimEngine {
    pub run_id:    RunId,
    pub clock:     SimClock,
    seed:          u64,
    config:        SimConfig,
    controller:    SimulationController,
    operation:     Option<OperationStateMachine>,
    timers:        TimerQueue,
    feed:          MarketFeed,
    notifications: NotificationFeed,
    next_token:    u64,
    started:       bool,
    event_log:     EventLog,
    collaborators: Collaborators,
}

impl SimEngine {
    /// Build an engine from a validated config. The simulation does not
    /// run until `start()`.
    pub fn build(run_id: RunId, seed: u64, config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let controller = SimulationController::new(
            config.outcome_table()?,
            config.calculator(),
            config.settlement,
            config.initial_balance,
            config.target_balance,
        );
        let feed = MarketFeed::new(MarketSeriesGenerator::new(config.market), RngBank::new(seed));
        let notifications = NotificationFeed::new(config.notifications, RngBank::new(seed));

        Ok(Self {
            clock: SimClock::new(),
            seed,
            config,
            controller,
            operation: None,
            timers: TimerQueue::new(),
            feed,
            notifications,
            next_token: 0,
            started: false,
            event_log: EventLog::new(),
            collaborators: Collaborators::default(),
            run_id,
        })
    }

    /// Default scenario with short timings.
    pub fn build_test(run_id: RunId, seed: u64) -> SimResult<Self> {
        Self::build(run_id, seed, SimConfig::default_test())
    }

    // ── Collaborators ───────────────────────────────────────────

    pub fn add_observer(&mut self, observer: Box<dyn SimObserver>) {
        self.collaborators.observers.push(observer);
    }

    pub fn set_cue_player(&mut self, player: Box<dyn CuePlayer>) {
        self.collaborators.cue_player = Some(player);
    }

    pub fn set_chart_renderer(&mut self, chart: Box<dyn ChartRenderer>) {
        self.collaborators.chart = Some(chart);
    }

    pub fn set_completion_target(&mut self, target: Box<dyn CompletionTarget>) {
        self.collaborators.completion = Some(target);
    }

    pub fn set_notification_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.collaborators.notifications = Some(sink);
    }

    // ── Inbound ─────────────────────────────────────────────────

    /// Reset state and begin stage 0. On a running engine this is a restart.
    pub fn start(&mut self) -> SimResult<Vec<SimEvent>> {
        if self.started {
            return self.restart();
        }
        let mut out = Vec::new();
        if self.event_log.is_empty() {
            let init = SimEvent::RunInitialized { run_id: self.run_id.clone(), seed: self.seed };
            self.emit("engine", init, &mut out)?;
        }

        self.controller.start();
        self.started = true;
        self.clock.resume();

        let started = SimEvent::SimulationStarted {
            tick: self.clock.current_tick,
            initial_balance: self.controller.initial_balance(),
            stage_count: self.stage_count(),
        };
        self.emit("controller", started, &mut out)?;
        self.begin_stage(&mut out)?;
        self.arm_notifications();
        self.publish_snapshot(&out);
        Ok(out)
    }

    pub fn make_selection(&mut self, direction: Direction) -> SimResult<Vec<SimEvent>> {
        let mut out = Vec::new();
        let now = self.clock.current_tick;
        let Some(op) = self.operation.as_mut() else {
            log::debug!("tick={now} selection {direction:?} ignored: no live operation");
            return Ok(out);
        };
        let stage_index = op.view().stage_index;
        let mut ctx = StageContext { now, timers: &mut self.timers, feed: &mut self.feed };
        let outputs = op.select(direction, &mut ctx);
        self.apply_outputs(stage_index, outputs, &mut out)?;
        self.publish_snapshot(&out);
        Ok(out)
    }

    /// Move on from a settled stage.
    pub fn acknowledge_stage_complete(&mut self) -> SimResult<Vec<SimEvent>> {
        let mut out = Vec::new();
        let tick = self.clock.current_tick;
        if !self.started {
            log::debug!("tick={tick} acknowledge ignored: run not started");
            return Ok(out);
        }

        match self.controller.advance() {
            None => return Ok(out),
            Some(Advance::NextStage { stage_index }) => {
                let advanced = SimEvent::StageAdvanced {
                    tick,
                    stage_index,
                    balance: self.controller.state().balance,
                };
                self.emit("controller", advanced, &mut out)?;
                self.begin_stage(&mut out)?;
            }
            Some(Advance::Completed { final_balance }) => {
                log::info!("tick={tick} simulation complete: final_balance={final_balance}");
                self.cancel_operation();
                self.timers.cancel_owner(FEED_TOKEN);
                self.emit("controller", SimEvent::SimulationCompleted { tick, final_balance }, &mut out)?;
            }
        }
        self.publish_snapshot(&out);
        Ok(out)
    }

    /// Discard everything in flight and begin again from stage 0.
    pub fn restart(&mut self) -> SimResult<Vec<SimEvent>> {
        if !self.started {
            return self.start();
        }
        let mut out = Vec::new();
        let cancelled = self.cancel_operation() + self.timers.clear();
        self.controller.restart();
        self.clock.resume();
        log::info!("tick={} restart: cancelled {cancelled} pending timers", self.clock.current_tick);

        let restarted = SimEvent::SimulationRestarted {
            tick: self.clock.current_tick,
            cancelled_timers: cancelled,
        };
        self.emit("controller", restarted, &mut out)?;
        self.begin_stage(&mut out)?;
        self.arm_notifications();
        self.publish_snapshot(&out);
        Ok(out)
    }

    /// Stop everything without resetting state. Returns cancelled timer count.
    pub fn teardown(&mut self) -> usize {
        let cancelled = self.cancel_operation() + self.timers.clear();
        self.started = false;
        self.clock.pause();
        log::debug!("tick={} teardown: cancelled {cancelled} timers", self.clock.current_tick);
        cancelled
    }

    pub fn apply_command(&mut self, command: PlayerCommand) -> SimResult<Vec<SimEvent>> {
        log::debug!("tick={} command: {}", self.clock.current_tick, command.name());
        match command {
            PlayerCommand::Pause => {
                self.clock.pause();
                Ok(vec![])
            }
            PlayerCommand::Resume => {
                if self.started {
                    self.clock.resume();
                }
                Ok(vec![])
            }
            PlayerCommand::SetSpeed { speed } => {
                self.clock.set_speed(speed);
                Ok(vec![])
            }
            PlayerCommand::Start            => self.start(),
            PlayerCommand::Select { direction } => self.make_selection(direction),
            PlayerCommand::AcknowledgeStage => self.acknowledge_stage_complete(),
            PlayerCommand::Restart          => self.restart(),
        }
    }

    // ── Time ────────────────────────────────────────────────────

    /// Advance one tick and fire every due timer. No-op while paused.
    pub fn tick(&mut self) -> SimResult<Vec<SimEvent>> {
        let mut out = Vec::new();
        if self.clock.paused {
            return Ok(out);
        }
        let now = self.clock.advance();
        for fired in self.timers.drain_due(now) {
            self.dispatch_timer(fired, &mut out)?;
        }
        self.publish_snapshot(&out);
        Ok(out)
    }

    /// Run n ticks. Used for testing and fast-forward.
    pub fn run_ticks(&mut self, n: u64) -> SimResult<Vec<SimEvent>> {
        let mut out = Vec::new();
        for _ in 0..n {
            out.extend(self.tick()?);
        }
        Ok(out)
    }

    /// Tick until the current stage settles or the budget runs out.
    pub fn run_until_settled(&mut self, max_ticks: u64) -> SimResult<Vec<SimEvent>> {
        if !self.started {
            return Err(SimError::RunNotStarted);
        }
        let mut out = Vec::new();
        for _ in 0..max_ticks {
            let state = self.controller.state();
            if state.stage_complete || state.simulation_complete || self.clock.paused {
                break;
            }
            out.extend(self.tick()?);
        }
        Ok(out)
    }

    /// Upper bound on ticks from stage start to result when nobody selects.
    pub fn stage_tick_budget(&self) -> Tick {
        let t = &self.config.timings;
        t.countdown_interval() * u64::from(t.countdown_steps)
            + t.resolve_delay()
            + t.reveal_delay()
            + t.result_delay()
            + 1
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn seed(&self) -> u64                         { self.seed }
    pub fn config(&self) -> &SimConfig                { &self.config }
    pub fn state(&self) -> &SimulationState           { self.controller.state() }
    pub fn event_log(&self) -> &EventLog              { &self.event_log }
    pub fn is_started(&self) -> bool                  { self.started }
    pub fn pending_timers(&self) -> usize             { self.timers.pending_count() }
    pub fn stage_count(&self) -> usize                { self.controller.table().stage_count() }
    pub fn current_wager(&self) -> Amount             { self.controller.current_wager() }

    pub fn operation_state(&self) -> Option<&OperationState> {
        self.operation.as_ref().map(|op| op.state())
    }

    pub fn current_series(&self) -> Option<&[MarketPoint]> {
        self.operation.as_ref().map(|op| op.series())
    }

    pub fn live_token(&self) -> Option<StageToken> {
        self.operation.as_ref().map(|op| op.token())
    }

    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            run_id:      self.run_id.clone(),
            tick:        self.clock.current_tick,
            stage_count: self.stage_count(),
            simulation:  self.controller.state().clone(),
            operation:   self.operation.as_ref().map(|op| OperationSnapshot {
                state: op.state().clone(),
                wager: op.view().wager,
                asset: op.view().asset.clone(),
            }),
        }
    }

    // ── Internals ───────────────────────────────────────────────

    fn begin_stage(&mut self, out: &mut Vec<SimEvent>) -> SimResult<()> {
        self.cancel_operation();

        let stage_index = self.controller.state().stage_index;
        let directive = *self.controller.current_directive()?;
        let wager = self.controller.current_wager();
        let asset = self
            .feed
            .pick_asset(&self.config.assets)
            .ok_or_else(|| SimError::config("asset catalog is empty"))?;

        self.next_token += 1;
        let token = StageToken(self.next_token);
        let now = self.clock.current_tick;
        log::debug!("tick={now} stage {stage_index}: begin wager={wager} asset={}", asset.symbol);

        let started = SimEvent::StageStarted {
            tick: now,
            stage_index,
            wager,
            asset_symbol: asset.symbol.clone(),
            asset_price: asset.price,
        };
        self.emit("controller", started, out)?;

        let view = StageView { stage_index, directive, wager, asset };
        let mut ctx = StageContext { now, timers: &mut self.timers, feed: &mut self.feed };
        let (machine, outputs) = OperationStateMachine::start(token, view, self.config.timings, &mut ctx);
        self.operation = Some(machine);
        self.apply_outputs(stage_index, outputs, out)
    }

    fn dispatch_timer(&mut self, fired: FiredTimer, out: &mut Vec<SimEvent>) -> SimResult<()> {
        let now = self.clock.current_tick;
        if fired.owner == FEED_TOKEN {
            return self.post_notification(out);
        }
        let Some(op) = self.operation.as_mut() else {
            log::debug!("tick={now} dropping {:?}: no live operation", fired.kind);
            return Ok(());
        };
        if op.token() != fired.owner {
            log::debug!(
                "tick={now} dropping stale {:?} from {:?} (live {:?})",
                fired.kind, fired.owner, op.token()
            );
            return Ok(());
        }
        let stage_index = op.view().stage_index;
        let mut ctx = StageContext { now, timers: &mut self.timers, feed: &mut self.feed };
        let outputs = op.on_timer(&fired, &mut ctx);
        self.apply_outputs(stage_index, outputs, out)
    }

    fn apply_outputs(
        &mut self,
        stage_index: StageIndex,
        outputs: Vec<StageOutput>,
        out: &mut Vec<SimEvent>,
    ) -> SimResult<()> {
        let tick = self.clock.current_tick;
        for output in outputs {
            let event = match output {
                StageOutput::Countdown { time_remaining } => {
                    SimEvent::CountdownTicked { tick, stage_index, time_remaining }
                }
                StageOutput::Selected { direction, forced } => {
                    SimEvent::SelectionMade { tick, stage_index, direction, forced }
                }
                StageOutput::Series { direction, points } => {
                    SimEvent::SeriesUpdated { tick, stage_index, direction, points }
                }
                StageOutput::Revealed { success, cue } => {
                    SimEvent::ResultRevealed { tick, stage_index, success, cue }
                }
                StageOutput::Result { success, wager } => {
                    // The operation is finished; discard it before settling.
                    self.cancel_operation();
                    let Some(settled) = self.controller.resolve_stage(success, wager)? else {
                        continue;
                    };
                    log::info!(
                        "tick={tick} stage {stage_index}: success={success} wager={wager} balance {} -> {}",
                        settled.balance_before, settled.balance_after
                    );
                    SimEvent::StageResolved {
                        tick,
                        stage_index,
                        success,
                        wager,
                        balance_after: settled.balance_after,
                    }
                }
            };
            self.emit("operation", event, out)?;
        }
        Ok(())
    }

    /// (Re)schedule the next feed roll. Does nothing when the feed is off.
    fn arm_notifications(&mut self) {
        let settings = *self.notifications.settings();
        if !settings.enabled {
            return;
        }
        self.timers.cancel_owner(FEED_TOKEN);
        self.timers.schedule(
            self.clock.current_tick,
            settings.interval(),
            FEED_TOKEN,
            TimerKind::NotificationTick,
        );
    }

    fn post_notification(&mut self, out: &mut Vec<SimEvent>) -> SimResult<()> {
        let tick = self.clock.current_tick;
        if self.controller.state().simulation_complete {
            log::debug!("tick={tick} notification feed stopped: simulation complete");
            return Ok(());
        }
        if let Some(notification) = self.notifications.roll() {
            log::debug!("tick={tick} notification from {}", notification.username);
            self.emit("notifications", SimEvent::NotificationPosted { tick, notification }, out)?;
        }
        self.arm_notifications();
        Ok(())
    }

    fn cancel_operation(&mut self) -> usize {
        match self.operation.take() {
            Some(mut op) => op.cancel(&mut self.timers),
            None => 0,
        }
    }

    fn emit(&mut self, source: &str, event: SimEvent, out: &mut Vec<SimEvent>) -> SimResult<()> {
        self.event_log.append(&self.run_id, self.clock.current_tick, source, &event)?;
        self.collaborators.dispatch_event(&event);
        out.push(event);
        Ok(())
    }

    fn publish_snapshot(&mut self, batch: &[SimEvent]) {
        if batch.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.collaborators.dispatch_snapshot(&snapshot);
    }
}
