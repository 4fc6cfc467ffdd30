//! Stake and payoff arithmetic.
//!
//! Everything here is pure: the same inputs always produce the same
//! output, and nothing touches simulation state.

use crate::types::{Amount, StageIndex};
use serde::{Deserialize, Serialize};

/// How much of the current balance is put at risk each stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskPolicy {
    Constant { fraction: f64 },
    /// One fraction per stage. Stages past the end reuse the last entry.
    PerStage { fractions: Vec<f64> },
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self::Constant { fraction: 0.8 }
    }
}

impl RiskPolicy {
    pub fn fraction_for(&self, stage: StageIndex) -> f64 {
        match self {
            Self::Constant { fraction } => *fraction,
            Self::PerStage { fractions } => fractions
                .get(stage)
                .or_else(|| fractions.last())
                .copied()
                .unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageAmountCalculator {
    policy: RiskPolicy,
}

impl StageAmountCalculator {
    pub fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// `floor(balance * fraction)`, never negative and never above `balance`.
    pub fn amount_for(&self, balance: Amount, stage: StageIndex) -> Amount {
        if balance <= 0 {
            return 0;
        }
        let fraction = self.policy.fraction_for(stage).clamp(0.0, 1.0);
        let raw = (balance as f64 * fraction).floor() as Amount;
        raw.clamp(0, balance)
    }
}

/// Balance deltas applied when a stage resolves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementRules {
    /// Share of the wager forfeited on a losing stage.
    pub loss_fraction: f64,
    /// A losing stage never leaves the balance below this.
    pub balance_floor: Amount,
}

impl Default for SettlementRules {
    fn default() -> Self {
        Self {
            loss_fraction: 0.5,
            balance_floor: 5,
        }
    }
}

impl SettlementRules {
    /// Payout for a won stage, saturating at `Amount::MAX`.
    pub fn win_payout(&self, wager: Amount, multiplier: f64) -> Amount {
        let payout = (wager as f64 * multiplier).floor();
        if payout.is_nan() || payout <= 0.0 {
            0
        } else if payout >= Amount::MAX as f64 {
            Amount::MAX
        } else {
            payout as Amount
        }
    }

    pub fn loss_amount(&self, wager: Amount) -> Amount {
        (wager as f64 * self.loss_fraction).floor() as Amount
    }

    /// Balance after a stage, given whether it was won.
    pub fn settle(&self, balance: Amount, wager: Amount, success: bool, multiplier: f64) -> Amount {
        if success {
            balance.saturating_add(self.win_payout(wager, multiplier))
        } else {
            balance.saturating_sub(self.loss_amount(wager)).max(self.balance_floor)
        }
    }
}
