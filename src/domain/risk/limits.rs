//! Hard exposure limits (spec §4.H.2).
//!
//! Caps a proposed position against per-symbol, aggregate, correlated, and
//! portfolio-heat limits, plus a hard cap on concurrent open positions. On
//! rejection it also reports the largest size that would have passed.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_per_symbol_pct: Decimal,
    pub max_aggregate_pct: Decimal,
    pub max_correlated_pct: Decimal,
    pub correlation_threshold: Decimal,
    pub max_concurrent_positions: usize,
    pub max_portfolio_heat_pct: Decimal,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_per_symbol_pct: dec!(0.05),
            max_aggregate_pct: dec!(0.10),
            max_correlated_pct: dec!(0.07),
            correlation_threshold: dec!(0.7),
            max_concurrent_positions: 1,
            max_portfolio_heat_pct: dec!(0.10),
        }
    }
}

impl LimitsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_positions == 0 {
            return Err("max_concurrent_positions must be at least 1".to_string());
        }
        for (name, pct) in [
            ("max_per_symbol_pct", self.max_per_symbol_pct),
            ("max_aggregate_pct", self.max_aggregate_pct),
            ("max_correlated_pct", self.max_correlated_pct),
            ("max_portfolio_heat_pct", self.max_portfolio_heat_pct),
        ] {
            if pct <= Decimal::ZERO {
                return Err(format!("{name} must be positive"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OpenPosition {
    pub symbol: String,
    pub value: Decimal,
    pub stop_distance_fraction: Decimal,
}

#[derive(Debug, Clone)]
pub struct ProposedPosition {
    pub symbol: String,
    pub value: Decimal,
    pub stop_distance_fraction: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitRejectionReason {
    MaxPositionsExceeded,
    PerSymbolExceeded,
    AggregateExposureExceeded,
    CorrelatedExposureExceeded,
    PortfolioHeatExceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LimitCheckResult {
    Approved,
    Rejected {
        reason: LimitRejectionReason,
        /// Largest position value that would have passed every check, or
        /// zero when the binding constraint isn't size-reducible (the
        /// concurrent-position cap).
        adjusted_size: Decimal,
    },
}

/// Tracks open positions and the correlation matrix used to cap correlated
/// exposure. Owned by a single capital-manager instance.
#[derive(Debug, Default)]
pub struct RiskLimitsChecker {
    config: LimitsConfigHolder,
    open_positions: HashMap<String, OpenPosition>,
    correlations: HashMap<(String, String), Decimal>,
}

#[derive(Debug)]
struct LimitsConfigHolder(LimitsConfig);

impl Default for LimitsConfigHolder {
    fn default() -> Self {
        Self(LimitsConfig::default())
    }
}

impl RiskLimitsChecker {
    pub fn new(config: LimitsConfig) -> Self {
        Self {
            config: LimitsConfigHolder(config),
            open_positions: HashMap::new(),
            correlations: HashMap::new(),
        }
    }

    pub fn set_correlation(&mut self, a: &str, b: &str, correlation: Decimal) {
        let key = Self::pair_key(a, b);
        self.correlations.insert(key, correlation);
    }

    fn pair_key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    fn correlation_of(&self, a: &str, b: &str) -> Decimal {
        if a == b {
            return Decimal::ONE;
        }
        self.correlations.get(&Self::pair_key(a, b)).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn add_position(&mut self, position: OpenPosition) {
        self.open_positions.insert(position.symbol.clone(), position);
    }

    pub fn remove_position(&mut self, symbol: &str) {
        self.open_positions.remove(symbol);
    }

    pub fn open_position_count(&self) -> usize {
        self.open_positions.len()
    }

    fn aggregate_exposure(&self) -> Decimal {
        self.open_positions.values().map(|p| p.value).sum()
    }

    fn correlated_exposure(&self, symbol: &str) -> Decimal {
        self.open_positions
            .values()
            .filter(|p| p.symbol != symbol && self.correlation_of(&p.symbol, symbol) >= self.config.0.correlation_threshold)
            .map(|p| p.value)
            .sum()
    }

    fn portfolio_heat(&self) -> Decimal {
        self.open_positions.iter().map(|(_, p)| p.value * p.stop_distance_fraction).sum()
    }

    /// Check a proposed position against every limit. Does not mutate
    /// tracked state; callers add the position themselves once approved.
    pub fn check(&self, capital: Decimal, proposed: &ProposedPosition) -> LimitCheckResult {
        let already_open = self.open_positions.contains_key(&proposed.symbol);
        if !already_open && self.open_positions.len() >= self.config.0.max_concurrent_positions {
            return LimitCheckResult::Rejected {
                reason: LimitRejectionReason::MaxPositionsExceeded,
                adjusted_size: Decimal::ZERO,
            };
        }

        let max_symbol = capital * self.config.0.max_per_symbol_pct;
        let existing_symbol_value = self.open_positions.get(&proposed.symbol).map(|p| p.value).unwrap_or(Decimal::ZERO);
        let per_symbol_headroom = (max_symbol - existing_symbol_value).max(Decimal::ZERO);

        let max_aggregate = capital * self.config.0.max_aggregate_pct;
        let aggregate_headroom = (max_aggregate - (self.aggregate_exposure() - existing_symbol_value)).max(Decimal::ZERO);

        let max_correlated = capital * self.config.0.max_correlated_pct;
        let correlated_headroom = (max_correlated - self.correlated_exposure(&proposed.symbol)).max(Decimal::ZERO);

        // The adjusted-size headroom is the minimum of exactly these three —
        // portfolio heat is checked separately below and doesn't contribute
        // a size suggestion of its own.
        let headrooms: [(LimitRejectionReason, Decimal); 3] = [
            (LimitRejectionReason::PerSymbolExceeded, per_symbol_headroom),
            (LimitRejectionReason::AggregateExposureExceeded, aggregate_headroom),
            (LimitRejectionReason::CorrelatedExposureExceeded, correlated_headroom),
        ];

        let (binding_reason, min_headroom) = headrooms
            .into_iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .expect("non-empty headroom list");

        if proposed.value > min_headroom {
            return LimitCheckResult::Rejected {
                reason: binding_reason,
                adjusted_size: min_headroom.max(Decimal::ZERO),
            };
        }

        let max_heat = capital * self.config.0.max_portfolio_heat_pct;
        let heat_so_far = self.portfolio_heat()
            - existing_symbol_value * self.open_positions.get(&proposed.symbol).map(|p| p.stop_distance_fraction).unwrap_or(Decimal::ZERO);
        let proposed_heat = proposed.value * proposed.stop_distance_fraction;
        if heat_so_far + proposed_heat > max_heat {
            return LimitCheckResult::Rejected {
                reason: LimitRejectionReason::PortfolioHeatExceeded,
                adjusted_size: min_headroom.max(Decimal::ZERO),
            };
        }

        LimitCheckResult::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlated_exposure_rejection_with_adjusted_size() {
        let mut checker = RiskLimitsChecker::new(LimitsConfig {
            max_concurrent_positions: 10,
            ..LimitsConfig::default()
        });
        checker.add_position(OpenPosition {
            symbol: "ETH".to_string(),
            value: dec!(500),
            stop_distance_fraction: dec!(0.01),
        });
        checker.set_correlation("BTC", "ETH", dec!(0.85));

        let proposed = ProposedPosition {
            symbol: "BTC".to_string(),
            value: dec!(600),
            stop_distance_fraction: dec!(0.01),
        };
        let result = checker.check(dec!(10000), &proposed);
        match result {
            LimitCheckResult::Rejected { reason, adjusted_size } => {
                assert_eq!(reason, LimitRejectionReason::CorrelatedExposureExceeded);
                assert_eq!(adjusted_size, dec!(200));
            }
            LimitCheckResult::Approved => panic!("expected rejection"),
        }
    }

    #[test]
    fn within_all_limits_is_approved() {
        let checker = RiskLimitsChecker::new(LimitsConfig::default());
        let proposed = ProposedPosition {
            symbol: "BTC".to_string(),
            value: dec!(100),
            stop_distance_fraction: dec!(0.01),
        };
        assert_eq!(checker.check(dec!(10000), &proposed), LimitCheckResult::Approved);
    }

    #[test]
    fn max_concurrent_positions_rejects_regardless_of_size() {
        let mut checker = RiskLimitsChecker::new(LimitsConfig {
            max_concurrent_positions: 1,
            ..LimitsConfig::default()
        });
        checker.add_position(OpenPosition {
            symbol: "ETH".to_string(),
            value: dec!(10),
            stop_distance_fraction: dec!(0.01),
        });
        let proposed = ProposedPosition {
            symbol: "BTC".to_string(),
            value: dec!(1),
            stop_distance_fraction: dec!(0.01),
        };
        match checker.check(dec!(10000), &proposed) {
            LimitCheckResult::Rejected { reason, adjusted_size } => {
                assert_eq!(reason, LimitRejectionReason::MaxPositionsExceeded);
                assert_eq!(adjusted_size, Decimal::ZERO);
            }
            LimitCheckResult::Approved => panic!("expected rejection"),
        }
    }

    #[test]
    fn per_symbol_cap_enforced() {
        let checker = RiskLimitsChecker::new(LimitsConfig {
            max_concurrent_positions: 10,
            ..LimitsConfig::default()
        });
        let proposed = ProposedPosition {
            symbol: "BTC".to_string(),
            value: dec!(600),
            stop_distance_fraction: dec!(0.01),
        };
        match checker.check(dec!(10000), &proposed) {
            LimitCheckResult::Rejected { reason, .. } => {
                assert_eq!(reason, LimitRejectionReason::PerSymbolExceeded);
            }
            LimitCheckResult::Approved => panic!("expected rejection"),
        }
    }
}
