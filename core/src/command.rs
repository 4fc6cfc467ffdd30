use serde::{Deserialize, Serialize};
use crate::{
    clock::SimSpeed,
    types::{Direction, RunId, Tick},
};

/// All inbound commands from the presentation layer.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    // ── Clock control ─────────────────────────────
    Pause,
    Resume,
    SetSpeed { speed: SimSpeed },

    // ── Simulation ────────────────────────────────
    Start,
    Select { direction: Direction },
    AcknowledgeStage,
    Restart,
}

impl PlayerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pause              => "pause",
            Self::Resume             => "resume",
            Self::SetSpeed { .. }    => "set_speed",
            Self::Start              => "start",
            Self::Select { .. }      => "select",
            Self::AcknowledgeStage   => "acknowledge_stage",
            Self::Restart            => "restart",
        }
    }
}

/// A player command with its submission tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub run_id:     RunId,
    pub queued_at:  Tick,
    pub command_id: String,
    pub command:    PlayerCommand,
}

impl QueuedCommand {
    pub fn new(run_id: RunId, queued_at: Tick, command: PlayerCommand) -> Self {
        Self {
            run_id,
            queued_at,
            command_id: uuid::Uuid::new_v4().to_string(),
            command,
        }
    }
}
