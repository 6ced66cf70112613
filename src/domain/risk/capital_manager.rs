//! Capital manager facade (spec §4.H.4).
//!
//! Composes the position sizer, limits checker, and drawdown tracker behind
//! a single `validate_trade` / `record_trade_result` pair. Wrapped in a
//! reentrant lock because `record_trade_result` can itself be invoked from
//! inside a callback running on a thread that is still holding the lock
//! from the `validate_trade` call that opened the position (see §5, §9).

use std::cell::RefCell;

use parking_lot::ReentrantMutex;
use rust_decimal::Decimal;

use super::drawdown::{DrawdownConfig, DrawdownTracker};
use super::limits::{LimitCheckResult, LimitsConfig, OpenPosition, ProposedPosition, RiskLimitsChecker};
use super::sizer::{PositionSizer, Regime, SizerConfig, SizingRequest};

#[derive(Debug, Clone)]
pub struct TradeRequest<'a> {
    pub symbol: &'a str,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub current_volatility: Option<Decimal>,
    pub regime: Regime,
    pub event_type: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeApproval {
    pub position_size: Decimal,
    pub notional_value: Decimal,
    pub risk_amount: Decimal,
    pub risk_fraction: Decimal,
    /// Set when the limits checker capped the sizer's proposed size rather
    /// than approving it outright (spec §4.H.4 step 6).
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    Drawdown,
    RegimeDisabled,
    InvalidPriceInputs,
    InvalidSizing,
    LimitsExceeded(super::limits::LimitRejectionReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeDecision {
    Approved(TradeApproval),
    Rejected(RejectionReason),
}

struct Inner {
    sizer: PositionSizer,
    limits: RiskLimitsChecker,
    drawdown: DrawdownTracker,
}

/// Facade over the three risk-envelope components. Reentrant so a caller
/// already holding the lock inside a `validate_trade` continuation can call
/// `record_trade_result` without deadlocking.
pub struct CapitalManager {
    inner: ReentrantMutex<RefCell<Inner>>,
}

impl CapitalManager {
    pub fn new(sizer_config: SizerConfig, limits_config: LimitsConfig, drawdown_config: DrawdownConfig, starting_capital: Decimal) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Inner {
                sizer: PositionSizer::new(sizer_config),
                limits: RiskLimitsChecker::new(limits_config),
                drawdown: DrawdownTracker::new(drawdown_config, starting_capital),
            })),
        }
    }

    /// The seven-step pipeline: (1) drawdown gate, (2) regime gate, (3)
    /// price-input validation, (4) size via the position sizer and apply the
    /// drawdown size multiplier, (5) reject a non-positive result, (6) check
    /// hard limits, (7) return the final approval or the binding rejection
    /// reason.
    pub fn validate_trade(&self, capital: Decimal, req: &TradeRequest) -> TradeDecision {
        let guard = self.inner.lock();
        let inner = guard.borrow();

        if !inner.drawdown.allows_trading() {
            return TradeDecision::Rejected(RejectionReason::Drawdown);
        }

        if req.regime == Regime::Disabled {
            return TradeDecision::Rejected(RejectionReason::RegimeDisabled);
        }

        if req.entry_price <= Decimal::ZERO || req.stop_price <= Decimal::ZERO {
            return TradeDecision::Rejected(RejectionReason::InvalidPriceInputs);
        }

        let sizing_req = SizingRequest {
            capital,
            entry_price: req.entry_price,
            stop_price: req.stop_price,
            current_volatility: req.current_volatility,
            regime: req.regime,
            event_type: req.event_type,
            symbol: req.symbol,
        };
        let Some(outcome) = inner.sizer.size(&sizing_req) else {
            return TradeDecision::Rejected(RejectionReason::InvalidSizing);
        };

        let drawdown_multiplier = inner.drawdown.size_multiplier();
        let adjusted_size = outcome.position_size * drawdown_multiplier;
        if adjusted_size <= Decimal::ZERO {
            return TradeDecision::Rejected(RejectionReason::Drawdown);
        }

        let stop_distance_fraction = if req.entry_price > Decimal::ZERO {
            (req.entry_price - req.stop_price).abs() / req.entry_price
        } else {
            Decimal::ZERO
        };
        let proposed = ProposedPosition {
            symbol: req.symbol.to_string(),
            value: adjusted_size * req.entry_price,
            stop_distance_fraction,
        };

        let risk_fraction = outcome.effective_risk_fraction * drawdown_multiplier;
        match inner.limits.check(capital, &proposed) {
            LimitCheckResult::Approved => TradeDecision::Approved(TradeApproval {
                position_size: adjusted_size,
                notional_value: proposed.value,
                risk_amount: outcome.risk_amount * drawdown_multiplier,
                risk_fraction,
                notes: Vec::new(),
            }),
            LimitCheckResult::Rejected { reason, adjusted_size: capped_value } if capped_value > Decimal::ZERO => {
                let capped_size = capped_value / req.entry_price;
                let capped_risk_amount = capped_size * stop_distance_fraction * req.entry_price;
                TradeDecision::Approved(TradeApproval {
                    position_size: capped_size,
                    notional_value: capped_value,
                    risk_amount: capped_risk_amount,
                    risk_fraction: if capital > Decimal::ZERO { capped_risk_amount / capital } else { Decimal::ZERO },
                    notes: vec![format!("size capped by risk limits: {reason:?}")],
                })
            }
            LimitCheckResult::Rejected { reason, .. } => TradeDecision::Rejected(RejectionReason::LimitsExceeded(reason)),
        }
    }

    /// Records a closed trade's pnl against the drawdown tracker and the
    /// sizer's win/loss streak.
    pub fn record_trade_result(&self, pnl: Decimal) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.drawdown.record_trade(pnl);
        if pnl > Decimal::ZERO {
            inner.sizer.record_win();
        } else if pnl < Decimal::ZERO {
            inner.sizer.record_loss();
        }
    }

    pub fn add_open_position(&self, position: OpenPosition) {
        let guard = self.inner.lock();
        guard.borrow_mut().limits.add_position(position);
    }

    pub fn remove_open_position(&self, symbol: &str) {
        let guard = self.inner.lock();
        guard.borrow_mut().limits.remove_position(symbol);
    }

    pub fn reset_daily(&self) {
        let guard = self.inner.lock();
        guard.borrow_mut().drawdown.reset_daily();
    }

    pub fn force_override_drawdown(&self) {
        let guard = self.inner.lock();
        guard.borrow_mut().drawdown.force_override();
    }

    pub fn reset_weekly(&self) {
        let guard = self.inner.lock();
        guard.borrow_mut().drawdown.reset_weekly();
    }

    pub fn allows_trading(&self) -> bool {
        let guard = self.inner.lock();
        guard.borrow().drawdown.allows_trading()
    }
}
