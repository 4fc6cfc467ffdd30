//! Per-stage interactive flow.
//!
//!   AwaitingSelection ──select / countdown expiry──▶ Resolving
//!   Resolving ──resolve delay──▶ Revealing      (outcome fixed, series redrawn)
//!   Revealing ──reveal delay──▶ cue played     (revealed = true)
//!   Revealing ──result delay──▶ Done           (result delivered, once)
//!
//! RULES:
//!   - Success is the stage directive's `should_win`. The user's
//!     selection only steers which way the chart is drawn.
//!   - A selection is accepted at most once; later attempts are no-ops.
//!   - Every timer is owned by this instance's StageToken and is
//!     cancelled when the instance is torn down.

use crate::{
    market::{Asset, MarketFeed, MarketPoint},
    outcome::OutcomeDirective,
    timer::{FiredTimer, StageToken, TimerId, TimerKind, TimerQueue},
    types::{ms_to_ticks, Amount, Direction, StageIndex, Tick},
};
use serde::{Deserialize, Serialize};

/// Direction the chart trends before any selection is made.
pub const PREVIEW_DIRECTION: Direction = Direction::Up;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationTimings {
    /// Countdown length in whole decrements.
    pub countdown_steps:       u32,
    pub countdown_interval_ms: u64,
    pub resolve_delay_ms:      u64,
    pub reveal_delay_ms:       u64,
    pub result_delay_ms:       u64,
}

impl Default for OperationTimings {
    fn default() -> Self {
        Self {
            countdown_steps:       15,
            countdown_interval_ms: 1_000,
            resolve_delay_ms:      3_000,
            reveal_delay_ms:       500,
            result_delay_ms:       2_000,
        }
    }
}

impl OperationTimings {
    pub fn countdown_interval(&self) -> Tick { ms_to_ticks(self.countdown_interval_ms) }
    pub fn resolve_delay(&self)      -> Tick { ms_to_ticks(self.resolve_delay_ms) }
    pub fn reveal_delay(&self)       -> Tick { ms_to_ticks(self.reveal_delay_ms) }
    pub fn result_delay(&self)       -> Tick { ms_to_ticks(self.result_delay_ms) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationPhase {
    AwaitingSelection,
    Resolving,
    Revealing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationState {
    pub phase:          OperationPhase,
    pub selection:      Option<Direction>,
    pub time_remaining: u32,
    pub resolved:       bool,
    pub revealed:       bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    Win,
    Lose,
}

impl CueKind {
    pub fn for_success(success: bool) -> Self {
        if success { Self::Win } else { Self::Lose }
    }
}

/// The narrow slice of controller state an operation is allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageView {
    pub stage_index: StageIndex,
    pub directive:   OutcomeDirective,
    pub wager:       Amount,
    pub asset:       Asset,
}

/// Borrowed engine services for one call into the machine.
pub struct StageContext<'a> {
    pub now:    Tick,
    pub timers: &'a mut TimerQueue,
    pub feed:   &'a mut MarketFeed,
}

/// What happened during one call. The engine turns these into events.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Countdown { time_remaining: u32 },
    Selected { direction: Direction, forced: bool },
    Series { direction: Direction, points: Vec<MarketPoint> },
    Revealed { success: bool, cue: CueKind },
    Result { success: bool, wager: Amount },
}

pub struct OperationStateMachine {
    token:           StageToken,
    view:            StageView,
    timings:         OperationTimings,
    state:           OperationState,
    success:         Option<bool>,
    series:          Vec<MarketPoint>,
    countdown_timer: Option<TimerId>,
}

impl OperationStateMachine {
    /// Enter AwaitingSelection: draw the preview series and arm the countdown.
    pub fn start(
        token: StageToken,
        view: StageView,
        timings: OperationTimings,
        ctx: &mut StageContext<'_>,
    ) -> (Self, Vec<StageOutput>) {
        let points = ctx.feed.draw_series(view.asset.price, PREVIEW_DIRECTION);
        let mut machine = Self {
            token,
            view,
            timings,
            state: OperationState {
                phase:          OperationPhase::AwaitingSelection,
                selection:      None,
                time_remaining: timings.countdown_steps,
                resolved:       false,
                revealed:       false,
            },
            success: None,
            series: points.clone(),
            countdown_timer: None,
        };

        let mut out = vec![StageOutput::Series { direction: PREVIEW_DIRECTION, points }];
        if timings.countdown_steps == 0 {
            out.extend(machine.force_selection(ctx));
        } else {
            machine.arm_countdown(ctx);
        }
        (machine, out)
    }

    pub fn token(&self) -> StageToken         { self.token }
    pub fn view(&self) -> &StageView          { &self.view }
    pub fn state(&self) -> &OperationState    { &self.state }
    pub fn series(&self) -> &[MarketPoint]    { &self.series }
    pub fn success(&self) -> Option<bool>     { self.success }
    pub fn is_done(&self) -> bool             { self.state.phase == OperationPhase::Done }

    /// The direction a forced selection takes: the winning side when the
    /// directive wins, the losing side otherwise.
    pub fn forced_direction(&self) -> Direction {
        if self.view.directive.should_win {
            PREVIEW_DIRECTION
        } else {
            PREVIEW_DIRECTION.opposite()
        }
    }

    /// User selection. Ignored unless still awaiting the first one.
    pub fn select(&mut self, direction: Direction, ctx: &mut StageContext<'_>) -> Vec<StageOutput> {
        if !self.accepts_selection() {
            log::debug!(
                "tick={} stage {}: selection {direction:?} ignored in {:?}",
                ctx.now, self.view.stage_index, self.state.phase
            );
            return vec![];
        }
        self.lock_selection(direction, false, ctx)
    }

    pub fn accepts_selection(&self) -> bool {
        self.state.phase == OperationPhase::AwaitingSelection && self.state.selection.is_none()
    }

    /// Dispatch a fired timer. Timers owned by another instance, or that
    /// no longer match the current phase, are no-ops.
    pub fn on_timer(&mut self, fired: &FiredTimer, ctx: &mut StageContext<'_>) -> Vec<StageOutput> {
        if fired.owner != self.token {
            log::debug!(
                "tick={} stage {}: dropping timer {:?} owned by {:?}",
                ctx.now, self.view.stage_index, fired.kind, fired.owner
            );
            return vec![];
        }

        match (fired.kind, self.state.phase) {
            (TimerKind::CountdownTick, OperationPhase::AwaitingSelection) => {
                self.countdown_timer = None;
                self.state.time_remaining = self.state.time_remaining.saturating_sub(1);
                let mut out = vec![StageOutput::Countdown { time_remaining: self.state.time_remaining }];
                if self.state.time_remaining == 0 {
                    out.extend(self.force_selection(ctx));
                } else {
                    self.arm_countdown(ctx);
                }
                out
            }
            (TimerKind::ResolveDelay, OperationPhase::Resolving) => self.resolve(ctx),
            (TimerKind::RevealDelay, OperationPhase::Revealing) if !self.state.revealed => {
                self.state.revealed = true;
                let success = self.success.unwrap_or(self.view.directive.should_win);
                ctx.timers.schedule(ctx.now, self.timings.result_delay(), self.token, TimerKind::ResultDelay);
                vec![StageOutput::Revealed { success, cue: CueKind::for_success(success) }]
            }
            (TimerKind::ResultDelay, OperationPhase::Revealing) if self.state.revealed => {
                self.state.phase = OperationPhase::Done;
                let success = self.success.unwrap_or(self.view.directive.should_win);
                log::debug!(
                    "tick={} stage {}: result success={success} wager={}",
                    ctx.now, self.view.stage_index, self.view.wager
                );
                vec![StageOutput::Result { success, wager: self.view.wager }]
            }
            (kind, phase) => {
                log::debug!(
                    "tick={} stage {}: timer {kind:?} has no effect in {phase:?}",
                    ctx.now, self.view.stage_index
                );
                vec![]
            }
        }
    }

    /// Cancel all pending timers. Returns how many were removed.
    pub fn cancel(&mut self, timers: &mut TimerQueue) -> usize {
        self.countdown_timer = None;
        timers.cancel_owner(self.token)
    }

    fn arm_countdown(&mut self, ctx: &mut StageContext<'_>) {
        let id = ctx.timers.schedule(
            ctx.now,
            self.timings.countdown_interval(),
            self.token,
            TimerKind::CountdownTick,
        );
        self.countdown_timer = Some(id);
    }

    fn force_selection(&mut self, ctx: &mut StageContext<'_>) -> Vec<StageOutput> {
        let direction = self.forced_direction();
        log::debug!(
            "tick={} stage {}: countdown expired, forcing {direction:?}",
            ctx.now, self.view.stage_index
        );
        self.lock_selection(direction, true, ctx)
    }

    fn lock_selection(&mut self, direction: Direction, forced: bool, ctx: &mut StageContext<'_>) -> Vec<StageOutput> {
        if let Some(id) = self.countdown_timer.take() {
            ctx.timers.cancel(id);
        }
        self.state.selection = Some(direction);
        self.state.phase = OperationPhase::Resolving;
        ctx.timers.schedule(ctx.now, self.timings.resolve_delay(), self.token, TimerKind::ResolveDelay);
        vec![StageOutput::Selected { direction, forced }]
    }

    fn resolve(&mut self, ctx: &mut StageContext<'_>) -> Vec<StageOutput> {
        let success = self.view.directive.should_win;
        let selection = self.state.selection.unwrap_or_else(|| self.forced_direction());
        let trend = if success { selection } else { selection.opposite() };

        self.success = Some(success);
        self.state.resolved = true;
        self.state.phase = OperationPhase::Revealing;
        self.series = ctx.feed.draw_series(self.view.asset.price, trend);
        ctx.timers.schedule(ctx.now, self.timings.reveal_delay(), self.token, TimerKind::RevealDelay);

        vec![StageOutput::Series { direction: trend, points: self.series.clone() }]
    }
}
