//! Point-in-time view handed to observers after every state change.
//!
//! Carries what the presentation layer may show. Never includes the
//! stage directive.

use crate::{
    controller::SimulationState,
    market::Asset,
    operation::OperationState,
    types::{Amount, RunId, Tick},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub run_id:      RunId,
    pub tick:        Tick,
    pub stage_count: usize,
    pub simulation:  SimulationState,
    pub operation:   Option<OperationSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub state: OperationState,
    pub wager: Amount,
    pub asset: Asset,
}
