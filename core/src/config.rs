//! Scenario configuration.
//!
//! A scenario is loaded from JSON with every field optional, then
//! validated before an engine is built. Anything `validate` accepts
//! must run to completion without panicking.

use crate::{
    error::{SimError, SimResult},
    market::{default_assets, Asset, MarketSettings},
    notification::NotificationSettings,
    operation::OperationTimings,
    outcome::{OutcomeStrategy, OutcomeTable},
    types::Amount,
    wager::{RiskPolicy, SettlementRules, StageAmountCalculator},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub initial_balance: Amount,
    pub target_balance:  Amount,
    pub outcome:         OutcomeStrategy,
    pub risk:            RiskPolicy,
    pub settlement:      SettlementRules,
    pub timings:         OperationTimings,
    pub market:          MarketSettings,
    pub assets:          Vec<Asset>,
    pub notifications:   NotificationSettings,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_balance: 30,
            target_balance:  500,
            outcome:         OutcomeStrategy::default(),
            risk:            RiskPolicy::default(),
            settlement:      SettlementRules::default(),
            timings:         OperationTimings::default(),
            market:          MarketSettings::default(),
            assets:          default_assets(),
            notifications:   NotificationSettings::default(),
        }
    }
}

impl SimConfig {
    /// Load a scenario file. Missing fields fall back to the defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Default scenario with near-zero delays for unit tests. The
    /// notification feed is off so timer counts stay exact.
    pub fn default_test() -> Self {
        Self {
            timings: OperationTimings {
                countdown_steps:       3,
                countdown_interval_ms: 100,
                resolve_delay_ms:      300,
                reveal_delay_ms:       100,
                result_delay_ms:       200,
            },
            notifications: NotificationSettings { enabled: false, ..Default::default() },
            ..Self::default()
        }
    }

    pub fn outcome_table(&self) -> SimResult<OutcomeTable> {
        self.outcome.build_table()
    }

    pub fn calculator(&self) -> StageAmountCalculator {
        StageAmountCalculator::new(self.risk.clone())
    }

    /// Reject anything that would let a malformed simulation start.
    pub fn validate(&self) -> SimResult<()> {
        let table = self.outcome_table()?;

        if self.initial_balance <= 0 {
            return Err(SimError::config(format!(
                "initial_balance must be positive, got {}", self.initial_balance
            )));
        }
        if self.target_balance <= 0 {
            return Err(SimError::config(format!(
                "target_balance must be positive, got {}", self.target_balance
            )));
        }

        match &self.risk {
            RiskPolicy::Constant { fraction } => check_fraction("risk fraction", *fraction)?,
            RiskPolicy::PerStage { fractions } => {
                if fractions.len() != table.stage_count() {
                    return Err(SimError::config(format!(
                        "per-stage risk has {} entries for {} stages",
                        fractions.len(), table.stage_count()
                    )));
                }
                for f in fractions {
                    check_fraction("risk fraction", *f)?;
                }
            }
        }

        check_fraction("loss_fraction", self.settlement.loss_fraction)?;
        if self.settlement.balance_floor < 0 {
            return Err(SimError::config("balance_floor must not be negative"));
        }

        let market = &self.market;
        if market.tick_count == 0 {
            return Err(SimError::config("market tick_count must be at least 1"));
        }
        check_finite("base_step", market.base_step)?;
        check_finite("jitter_min", market.jitter_min)?;
        check_finite("jitter_max", market.jitter_max)?;
        check_finite("price_floor", market.price_floor)?;
        if market.jitter_min > market.jitter_max {
            return Err(SimError::config(format!(
                "jitter_min {} exceeds jitter_max {}",
                market.jitter_min, market.jitter_max
            )));
        }
        // Every step must move the price in the requested direction.
        if market.base_step + market.jitter_min <= 0.0 {
            return Err(SimError::config(format!(
                "base_step {} + jitter_min {} must be positive",
                market.base_step, market.jitter_min
            )));
        }
        if market.price_floor <= 0.0 {
            return Err(SimError::config("price_floor must be positive"));
        }

        if self.assets.is_empty() {
            return Err(SimError::config("asset catalog is empty"));
        }
        if let Some(a) = self.assets.iter().find(|a| !a.price.is_finite() || a.price <= 0.0) {
            return Err(SimError::config(format!(
                "asset {} has invalid price {}", a.symbol, a.price
            )));
        }

        check_fraction("notification probability", self.notifications.probability)?;
        if self.notifications.enabled && self.notifications.interval_ms == 0 {
            return Err(SimError::config("notification interval_ms must be positive"));
        }

        Ok(())
    }
}

fn check_finite(what: &str, value: f64) -> SimResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::config(format!("{what} must be finite, got {value}")))
    }
}

fn check_fraction(what: &str, value: f64) -> SimResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::config(format!("{what} must be within [0, 1], got {value}")))
    }
}
