//! Circuit breakers (spec §4.H.5).
//!
//! Four independent triggers, each tripped by its own monitor and cleared
//! independently. `StrategyMalfunction` and `ResourceExhaustion` require a
//! manual reset; the other two clear themselves once their condition lapses.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerKind {
    RapidLoss,
    AbnormalPrice,
    StrategyMalfunction,
    ResourceExhaustion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Tripped,
}

#[derive(Debug, Clone)]
pub struct RapidLossBreaker {
    pub window_loss_pct_threshold: Decimal,
    state: BreakerState,
}

impl RapidLossBreaker {
    pub fn new(window_loss_pct_threshold: Decimal) -> Self {
        Self { window_loss_pct_threshold, state: BreakerState::Closed }
    }

    /// Evaluate a rolling loss percentage over the monitored window. Clears
    /// itself once the window no longer breaches the threshold.
    pub fn evaluate(&mut self, window_loss_pct: Decimal) -> BreakerState {
        self.state = if window_loss_pct >= self.window_loss_pct_threshold {
            BreakerState::Tripped
        } else {
            BreakerState::Closed
        };
        self.state
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }
}

#[derive(Debug, Clone)]
pub struct AbnormalPriceBreaker {
    pub max_single_tick_move_pct: Decimal,
    state: BreakerState,
}

impl AbnormalPriceBreaker {
    pub fn new(max_single_tick_move_pct: Decimal) -> Self {
        Self { max_single_tick_move_pct, state: BreakerState::Closed }
    }

    pub fn evaluate(&mut self, prev_price: Decimal, new_price: Decimal) -> BreakerState {
        if prev_price <= Decimal::ZERO {
            self.state = BreakerState::Closed;
            return self.state;
        }
        let move_pct = ((new_price - prev_price) / prev_price).abs();
        self.state = if move_pct >= self.max_single_tick_move_pct {
            BreakerState::Tripped
        } else {
            BreakerState::Closed
        };
        self.state
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }
}

/// Trips on repeated strategy-internal faults (panics caught at a higher
/// layer, invariant violations) and stays tripped until manually reset.
#[derive(Debug, Clone)]
pub struct StrategyMalfunctionBreaker {
    pub fault_count_threshold: u32,
    fault_count: u32,
    state: BreakerState,
}

impl StrategyMalfunctionBreaker {
    pub fn new(fault_count_threshold: u32) -> Self {
        Self { fault_count_threshold, fault_count: 0, state: BreakerState::Closed }
    }

    pub fn record_fault(&mut self) -> BreakerState {
        self.fault_count += 1;
        if self.fault_count >= self.fault_count_threshold {
            self.state = BreakerState::Tripped;
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.fault_count = 0;
        self.state = BreakerState::Closed;
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }
}

/// Trips on exhaustion of an operational resource (connection pool, memory,
/// rate-limit budget) and stays tripped until manually reset.
#[derive(Debug, Clone)]
pub struct ResourceExhaustionBreaker {
    pub usage_pct_threshold: Decimal,
    state: BreakerState,
}

impl ResourceExhaustionBreaker {
    pub fn new(usage_pct_threshold: Decimal) -> Self {
        Self { usage_pct_threshold, state: BreakerState::Closed }
    }

    pub fn evaluate(&mut self, usage_pct: Decimal) -> BreakerState {
        if usage_pct >= self.usage_pct_threshold {
            self.state = BreakerState::Tripped;
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.state = BreakerState::Closed;
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }
}

/// Owns all four breakers and reports which, if any, are currently tripped.
#[derive(Debug, Clone)]
pub struct CircuitBreakerPanel {
    pub rapid_loss: RapidLossBreaker,
    pub abnormal_price: AbnormalPriceBreaker,
    pub strategy_malfunction: StrategyMalfunctionBreaker,
    pub resource_exhaustion: ResourceExhaustionBreaker,
}

impl Default for CircuitBreakerPanel {
    fn default() -> Self {
        Self {
            rapid_loss: RapidLossBreaker::new(dec!(0.05)),
            abnormal_price: AbnormalPriceBreaker::new(dec!(0.10)),
            strategy_malfunction: StrategyMalfunctionBreaker::new(3),
            resource_exhaustion: ResourceExhaustionBreaker::new(dec!(0.90)),
        }
    }
}

impl CircuitBreakerPanel {
    pub fn tripped(&self) -> Vec<BreakerKind> {
        let mut tripped = Vec::new();
        if self.rapid_loss.state() == BreakerState::Tripped {
            tripped.push(BreakerKind::RapidLoss);
        }
        if self.abnormal_price.state() == BreakerState::Tripped {
            tripped.push(BreakerKind::AbnormalPrice);
        }
        if self.strategy_malfunction.state() == BreakerState::Tripped {
            tripped.push(BreakerKind::StrategyMalfunction);
        }
        if self.resource_exhaustion.state() == BreakerState::Tripped {
            tripped.push(BreakerKind::ResourceExhaustion);
        }
        tripped
    }

    pub fn any_tripped(&self) -> bool {
        !self.tripped().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rapid_loss_clears_once_window_improves() {
        let mut breaker = RapidLossBreaker::new(dec!(0.05));
        assert_eq!(breaker.evaluate(dec!(0.06)), BreakerState::Tripped);
        assert_eq!(breaker.evaluate(dec!(0.01)), BreakerState::Closed);
    }

    #[test]
    fn strategy_malfunction_requires_manual_reset() {
        let mut breaker = StrategyMalfunctionBreaker::new(2);
        breaker.record_fault();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_fault();
        assert_eq!(breaker.state(), BreakerState::Tripped);
        breaker.record_fault();
        assert_eq!(breaker.state(), BreakerState::Tripped);
        breaker.reset();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn panel_reports_all_tripped_breakers() {
        let mut panel = CircuitBreakerPanel::default();
        panel.rapid_loss.evaluate(dec!(0.10));
        panel.resource_exhaustion.evaluate(dec!(0.95));
        let tripped = panel.tripped();
        assert!(tripped.contains(&BreakerKind::RapidLoss));
        assert!(tripped.contains(&BreakerKind::ResourceExhaustion));
        assert_eq!(tripped.len(), 2);
        assert!(panel.any_tripped());
    }
}
