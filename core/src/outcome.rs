//! The outcome table: the scripted result of every stage.
//!
//! The table is fixed when the engine is built and never mutated.
//! Whether a stage wins is read from here and nowhere else.

use crate::{
    error::{SimError, SimResult},
    types::{Amount, StageIndex},
    wager::{SettlementRules, StageAmountCalculator},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDirective {
    pub should_win: bool,
    pub multiplier: f64,
}

impl OutcomeDirective {
    pub const fn win(multiplier: f64) -> Self {
        Self { should_win: true, multiplier }
    }

    pub const fn lose(multiplier: f64) -> Self {
        Self { should_win: false, multiplier }
    }
}

/// Where the directives come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeStrategy {
    Scripted { directives: Vec<OutcomeDirective> },
    /// Every stage wins with the same multiplier.
    AlwaysWin { stages: usize, multiplier: f64 },
}

impl Default for OutcomeStrategy {
    fn default() -> Self {
        Self::Scripted {
            directives: vec![
                OutcomeDirective::win(2.0),
                OutcomeDirective::win(2.0),
                OutcomeDirective::win(1.5),
                OutcomeDirective::lose(0.5),
                OutcomeDirective::win(4.56),
            ],
        }
    }
}

impl OutcomeStrategy {
    pub fn build_table(&self) -> SimResult<OutcomeTable> {
        match self {
            Self::Scripted { directives } => OutcomeTable::new(directives.clone()),
            Self::AlwaysWin { stages, multiplier } => {
                OutcomeTable::new(vec![OutcomeDirective::win(*multiplier); *stages])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeTable {
    directives: Vec<OutcomeDirective>,
}

impl OutcomeTable {
    /// Validates length and multipliers. A malformed table is fatal.
    pub fn new(directives: Vec<OutcomeDirective>) -> SimResult<Self> {
        if directives.is_empty() {
            return Err(SimError::config("outcome table has no stages"));
        }
        if let Some((i, d)) = directives
            .iter()
            .enumerate()
            .find(|(_, d)| !d.multiplier.is_finite() || d.multiplier <= 0.0)
        {
            return Err(SimError::config(format!(
                "stage {i} multiplier must be positive, got {}",
                d.multiplier
            )));
        }
        Ok(Self { directives })
    }

    pub fn stage_count(&self) -> usize {
        self.directives.len()
    }

    pub fn last_index(&self) -> StageIndex {
        self.directives.len() - 1
    }

    pub fn directive_for(&self, stage: StageIndex) -> SimResult<&OutcomeDirective> {
        self.directives.get(stage).ok_or(SimError::IndexOutOfRange {
            index: stage,
            len: self.directives.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutcomeDirective> {
        self.directives.iter()
    }

    /// Balance after each stage if every directive plays out as written.
    /// Design-time check for table authors; the terminal clamp in the
    /// controller makes the last entry irrelevant at runtime.
    pub fn project(
        &self,
        initial_balance: Amount,
        calculator: &StageAmountCalculator,
        rules: &SettlementRules,
    ) -> Vec<Amount> {
        let mut balance = initial_balance;
        self.directives
            .iter()
            .enumerate()
            .map(|(stage, d)| {
                let wager = calculator.amount_for(balance, stage);
                balance = rules.settle(balance, wager, d.should_win, d.multiplier);
                balance
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_script_projection() {
        let table = OutcomeStrategy::default().build_table().unwrap();
        let projected = table.project(
            30,
            &StageAmountCalculator::default(),
            &SettlementRules::default(),
        );
        assert_eq!(&projected[..4], &[78, 202, 443, 266]);
    }

    #[test]
    fn empty_table_is_rejected() {
        let err = OutcomeTable::new(vec![]).unwrap_err();
        assert!(matches!(err, SimError::Configuration { .. }));
    }

    #[test]
    fn non_positive_multiplier_is_rejected() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = OutcomeTable::new(vec![
                OutcomeDirective::win(2.0),
                OutcomeDirective::lose(bad),
            ]);
            assert!(result.is_err(), "multiplier {bad} should be rejected");
        }
    }

    #[test]
    fn lookup_past_end_is_out_of_range() {
        let table = OutcomeStrategy::default().build_table().unwrap();
        assert!(table.directive_for(4).is_ok());
        match table.directive_for(5) {
            Err(SimError::IndexOutOfRange { index, len }) => {
                assert_eq!((index, len), (5, 5));
            }
            other => panic!("expected IndexOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn always_win_is_a_degenerate_table() {
        let table = OutcomeStrategy::AlwaysWin { stages: 3, multiplier: 1.0 }
            .build_table()
            .unwrap();
        assert_eq!(table.stage_count(), 3);
        assert!(table.iter().all(|d| d.should_win));
    }
}
