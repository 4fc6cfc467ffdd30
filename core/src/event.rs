//! Outbound events: everything the presentation layer can observe.
//!
//! RULE: the engine is the only producer. Every event is appended to the
//! run's EventLog before observers see it.

use crate::{
    market::MarketPoint,
    notification::Notification,
    operation::CueKind,
    types::{Amount, Direction, RunId, StageIndex, Tick},
};
use serde::{Deserialize, Serialize};

/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Run lifecycle ──────────────────────────────
    RunInitialized {
        run_id: RunId,
        seed: u64,
    },
    SimulationStarted {
        tick: Tick,
        initial_balance: Amount,
        stage_count: usize,
    },
    SimulationRestarted {
        tick: Tick,
        cancelled_timers: usize,
    },
    SimulationCompleted {
        tick: Tick,
        final_balance: Amount,
    },

    // ── Stage flow ─────────────────────────────────
    StageStarted {
        tick: Tick,
        stage_index: StageIndex,
        wager: Amount,
        asset_symbol: String,
        asset_price: f64,
    },
    CountdownTicked {
        tick: Tick,
        stage_index: StageIndex,
        time_remaining: u32,
    },
    SelectionMade {
        tick: Tick,
        stage_index: StageIndex,
        direction: Direction,
        forced: bool,
    },
    SeriesUpdated {
        tick: Tick,
        stage_index: StageIndex,
        direction: Direction,
        points: Vec<MarketPoint>,
    },
    ResultRevealed {
        tick: Tick,
        stage_index: StageIndex,
        success: bool,
        cue: CueKind,
    },
    StageResolved {
        tick: Tick,
        stage_index: StageIndex,
        success: bool,
        wager: Amount,
        balance_after: Amount,
    },
    StageAdvanced {
        tick: Tick,
        stage_index: StageIndex,
        balance: Amount,
    },

    // ── Decoration ─────────────────────────────────
    NotificationPosted {
        tick: Tick,
        notification: Notification,
    },
}

impl SimEvent {
    /// Stable name for the `event_type` column of the log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. }      => "run_initialized",
            Self::SimulationStarted { .. }   => "simulation_started",
            Self::SimulationRestarted { .. } => "simulation_restarted",
            Self::SimulationCompleted { .. } => "simulation_completed",
            Self::StageStarted { .. }        => "stage_started",
            Self::CountdownTicked { .. }     => "countdown_ticked",
            Self::SelectionMade { .. }       => "selection_made",
            Self::SeriesUpdated { .. }       => "series_updated",
            Self::ResultRevealed { .. }      => "result_revealed",
            Self::StageResolved { .. }       => "stage_resolved",
            Self::StageAdvanced { .. }       => "stage_advanced",
            Self::NotificationPosted { .. }  => "notification_posted",
        }
    }
}

/// One persisted event. In-memory only; nothing outlives the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub seq: u64,
    pub run_id: RunId,
    pub tick: Tick,
    pub source: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}

#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<EventLogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, run_id: &str, tick: Tick, source: &str, event: &SimEvent) -> serde_json::Result<()> {
        let entry = EventLogEntry {
            seq: self.entries.len() as u64,
            run_id: run_id.to_string(),
            tick,
            source: source.to_string(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
        };
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[EventLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_tick(&self, tick: Tick) -> impl Iterator<Item = &EventLogEntry> {
        self.entries.iter().filter(move |e| e.tick == tick)
    }

    pub fn count_of(&self, event_type: &str) -> usize {
        self.entries.iter().filter(|e| e.event_type == event_type).count()
    }
}
