//! Balance and stage bookkeeping.
//!
//! The controller owns SimulationState and the outcome table. It never
//! schedules anything; the engine drives it from operation results and
//! inbound commands.
//!
//! INVARIANT: the only place the balance is forced to the target is the
//! terminal `advance()`. Intermediate stages may drift from the authored
//! trajectory; the terminal clamp absorbs it.

use crate::{
    error::SimResult,
    outcome::{OutcomeDirective, OutcomeTable},
    types::{Amount, StageIndex},
    wager::{SettlementRules, StageAmountCalculator},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationState {
    pub balance:             Amount,
    pub stage_index:         StageIndex,
    pub stage_complete:      bool,
    pub simulation_complete: bool,
}

/// Result of applying one stage outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSettlement {
    pub stage_index:    StageIndex,
    pub success:        bool,
    pub wager:          Amount,
    pub balance_before: Amount,
    pub balance_after:  Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advance {
    NextStage { stage_index: StageIndex },
    Completed { final_balance: Amount },
}

pub struct SimulationController {
    table:           OutcomeTable,
    calculator:      StageAmountCalculator,
    rules:           SettlementRules,
    initial_balance: Amount,
    target_balance:  Amount,
    state:           SimulationState,
}

impl SimulationController {
    pub fn new(
        table: OutcomeTable,
        calculator: StageAmountCalculator,
        rules: SettlementRules,
        initial_balance: Amount,
        target_balance: Amount,
    ) -> Self {
        Self {
            table,
            calculator,
            rules,
            initial_balance,
            target_balance,
            state: Self::fresh_state(initial_balance),
        }
    }

    fn fresh_state(initial_balance: Amount) -> SimulationState {
        SimulationState {
            balance:             initial_balance,
            stage_index:         0,
            stage_complete:      false,
            simulation_complete: false,
        }
    }

    pub fn start(&mut self) {
        self.state = Self::fresh_state(self.initial_balance);
    }

    pub fn restart(&mut self) {
        self.start();
    }

    pub fn state(&self) -> &SimulationState   { &self.state }
    pub fn table(&self) -> &OutcomeTable      { &self.table }
    pub fn initial_balance(&self) -> Amount   { self.initial_balance }
    pub fn target_balance(&self) -> Amount    { self.target_balance }

    pub fn current_directive(&self) -> SimResult<&OutcomeDirective> {
        self.table.directive_for(self.state.stage_index)
    }

    pub fn current_wager(&self) -> Amount {
        self.calculator.amount_for(self.state.balance, self.state.stage_index)
    }

    /// Apply a stage result. Returns `None` (no-op) if the current stage
    /// was already settled or the simulation is over.
    pub fn resolve_stage(&mut self, success: bool, wager: Amount) -> SimResult<Option<StageSettlement>> {
        if self.state.stage_complete || self.state.simulation_complete {
            log::debug!(
                "stage {}: resolve ignored (stage_complete={} simulation_complete={})",
                self.state.stage_index, self.state.stage_complete, self.state.simulation_complete
            );
            return Ok(None);
        }

        let directive = *self.current_directive()?;
        let before = self.state.balance;
        let after = self.rules.settle(before, wager, success, directive.multiplier);

        self.state.balance = after;
        self.state.stage_complete = true;

        Ok(Some(StageSettlement {
            stage_index:    self.state.stage_index,
            success,
            wager,
            balance_before: before,
            balance_after:  after,
        }))
    }

    /// Move past a settled stage. On the last stage this pins the balance
    /// to the target and completes the simulation. Returns `None` if the
    /// current stage has not been settled yet.
    pub fn advance(&mut self) -> Option<Advance> {
        if !self.state.stage_complete || self.state.simulation_complete {
            log::debug!(
                "stage {}: advance ignored (stage_complete={} simulation_complete={})",
                self.state.stage_index, self.state.stage_complete, self.state.simulation_complete
            );
            return None;
        }

        if self.state.stage_index >= self.table.last_index() {
            self.state.balance = self.target_balance;
            self.state.simulation_complete = true;
            Some(Advance::Completed { final_balance: self.target_balance })
        } else {
            self.state.stage_index += 1;
            self.state.stage_complete = false;
            Some(Advance::NextStage { stage_index: self.state.stage_index })
        }
    }
}
