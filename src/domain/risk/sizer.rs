//! Position sizing (spec §4.H.1).
//!
//! Turns a risk fraction of capital into a position size, scaled by
//! volatility, event type, and market regime, then bounded by a floor (scaled
//! up) and a ceiling (scaled back down, always last). Risk fraction itself
//! drifts with recent win/loss streaks rather than staying fixed.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Market regime the sizer is asked to size into. `Disabled` always yields a
/// zero regime scalar regardless of any configured override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    Sideways,
    Expansion,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct SizerConfig {
    pub default_risk_fraction: Decimal,
    pub floor_risk_fraction: Decimal,
    pub ceiling_risk_fraction: Decimal,
    pub event_multipliers: HashMap<String, Decimal>,
    pub regime_scalars: HashMap<Regime, Decimal>,
    /// Fraction of full Kelly applied by [`PositionSizer::kelly_fraction`].
    pub kelly_fractional_multiplier: Decimal,
}

impl Default for SizerConfig {
    fn default() -> Self {
        let mut regime_scalars = HashMap::new();
        regime_scalars.insert(Regime::Sideways, dec!(1.0));
        regime_scalars.insert(Regime::Expansion, dec!(1.0));
        Self {
            default_risk_fraction: dec!(0.01),
            floor_risk_fraction: dec!(0.003),
            ceiling_risk_fraction: dec!(0.02),
            event_multipliers: HashMap::new(),
            regime_scalars,
            kelly_fractional_multiplier: dec!(0.10),
        }
    }
}

impl SizerConfig {
    /// Per §9, unknown/invalid options are rejected at construction.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_risk_fraction <= Decimal::ZERO {
            return Err("default_risk_fraction must be positive".to_string());
        }
        if self.floor_risk_fraction > self.ceiling_risk_fraction {
            return Err("floor_risk_fraction must not exceed ceiling_risk_fraction".to_string());
        }
        if self.kelly_fractional_multiplier < Decimal::ZERO || self.kelly_fractional_multiplier > Decimal::ONE {
            return Err("kelly_fractional_multiplier must be in [0, 1]".to_string());
        }
        Ok(())
    }

    fn regime_scalar(&self, regime: Regime) -> Decimal {
        if regime == Regime::Disabled {
            return Decimal::ZERO;
        }
        self.regime_scalars.get(&regime).copied().unwrap_or(dec!(1.0))
    }

    fn event_multiplier(&self, event_type: &str) -> Decimal {
        self.event_multipliers.get(event_type).copied().unwrap_or(dec!(1.0))
    }
}

/// A sizing request. `current_volatility` is only used when a baseline has
/// already been recorded for `symbol` via [`PositionSizer::set_baseline_volatility`].
#[derive(Debug, Clone)]
pub struct SizingRequest<'a> {
    pub capital: Decimal,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub current_volatility: Option<Decimal>,
    pub regime: Regime,
    pub event_type: &'a str,
    pub symbol: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizingOutcome {
    pub position_size: Decimal,
    pub risk_amount: Decimal,
    pub effective_risk_fraction: Decimal,
    pub floor_applied: bool,
    pub ceiling_applied: bool,
}

/// Stateful position sizer: the risk fraction drifts with the consecutive
/// win/loss streak, and per-symbol baseline volatility is remembered across
/// calls once recorded.
#[derive(Debug)]
pub struct PositionSizer {
    config: SizerConfig,
    consecutive_wins: u32,
    consecutive_losses: u32,
    current_risk_fraction: Decimal,
    baseline_volatility: HashMap<String, Decimal>,
}

impl PositionSizer {
    pub fn new(config: SizerConfig) -> Self {
        let current_risk_fraction = config.default_risk_fraction;
        Self {
            config,
            consecutive_wins: 0,
            consecutive_losses: 0,
            current_risk_fraction,
            baseline_volatility: HashMap::new(),
        }
    }

    pub fn set_baseline_volatility(&mut self, symbol: &str, baseline: Decimal) {
        self.baseline_volatility.insert(symbol.to_string(), baseline);
    }

    pub fn current_risk_fraction(&self) -> Decimal {
        self.current_risk_fraction
    }

    /// Record a winning trade result and recompute the dynamic risk
    /// fraction: 3 consecutive wins → 1.25%, 5 → 1.5%.
    pub fn record_win(&mut self) {
        self.consecutive_wins += 1;
        self.consecutive_losses = 0;
        self.current_risk_fraction = if self.consecutive_wins >= 5 {
            dec!(0.015)
        } else if self.consecutive_wins >= 3 {
            dec!(0.0125)
        } else {
            self.config.default_risk_fraction
        };
    }

    /// Record a losing trade result: 1 loss resets to default, 2 → 0.75%,
    /// 4+ → 0.5%.
    pub fn record_loss(&mut self) {
        self.consecutive_losses += 1;
        self.consecutive_wins = 0;
        self.current_risk_fraction = if self.consecutive_losses >= 4 {
            dec!(0.005)
        } else if self.consecutive_losses >= 2 {
            dec!(0.0075)
        } else {
            self.config.default_risk_fraction
        };
    }

    fn volatility_scalar(&self, symbol: &str, current: Option<Decimal>) -> Decimal {
        match (self.baseline_volatility.get(symbol), current) {
            (Some(&baseline), Some(current)) if current > Decimal::ZERO => {
                (baseline / current).clamp(dec!(0.5), dec!(2.0))
            }
            _ => dec!(1.0),
        }
    }

    /// Size a position for `req`. Returns `None` when the stop distance is
    /// zero (undefined risk-per-unit); callers should treat that as an
    /// invalid-input rejection, not size a position.
    pub fn size(&self, req: &SizingRequest) -> Option<SizingOutcome> {
        let stop_distance = (req.entry_price - req.stop_price).abs();
        if stop_distance <= Decimal::ZERO || req.capital <= Decimal::ZERO {
            return None;
        }

        let base_risk_amount = req.capital * self.current_risk_fraction;
        let raw_size = base_risk_amount / stop_distance;

        let vol_scalar = self.volatility_scalar(req.symbol, req.current_volatility);
        let event_scalar = self.config.event_multiplier(req.event_type);
        let regime_scalar = self.config.regime_scalar(req.regime);

        let mut position_size = raw_size * vol_scalar * event_scalar * regime_scalar;
        let mut effective_fraction = self.current_risk_fraction * vol_scalar * event_scalar * regime_scalar;

        let mut floor_applied = false;
        let mut ceiling_applied = false;

        if effective_fraction > Decimal::ZERO && effective_fraction < self.config.floor_risk_fraction {
            let scale = self.config.floor_risk_fraction / effective_fraction;
            position_size *= scale;
            effective_fraction = self.config.floor_risk_fraction;
            floor_applied = true;
        }
        if effective_fraction > self.config.ceiling_risk_fraction {
            let scale = self.config.ceiling_risk_fraction / effective_fraction;
            position_size *= scale;
            effective_fraction = self.config.ceiling_risk_fraction;
            ceiling_applied = true;
        }

        let risk_amount = position_size * stop_distance;
        debug!(
            symbol = req.symbol,
            event = req.event_type,
            ?effective_fraction,
            floor_applied,
            ceiling_applied,
            "position sized"
        );

        Some(SizingOutcome {
            position_size,
            risk_amount,
            effective_risk_fraction: effective_fraction,
            floor_applied,
            ceiling_applied,
        })
    }

    /// Fractional-Kelly alternative sizing: f = (p*b - q)/b, scaled by the
    /// configured fractional-Kelly multiplier and clamped to [0, ceiling].
    pub fn kelly_fraction(&self, win_rate: Decimal, avg_win: Decimal, avg_loss: Decimal) -> Decimal {
        if avg_loss <= Decimal::ZERO || avg_win <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let b = avg_win / avg_loss;
        let q = Decimal::ONE - win_rate;
        let f = (win_rate * b - q) / b;
        (f * self.config.kelly_fractional_multiplier).clamp(Decimal::ZERO, self.config.ceiling_risk_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req<'a>(regime: Regime, event_type: &'a str) -> SizingRequest<'a> {
        SizingRequest {
            capital: dec!(10000),
            entry_price: dec!(50000),
            stop_price: dec!(49500),
            current_volatility: None,
            regime,
            event_type,
            symbol: "BTC",
        }
    }

    #[test]
    fn floor_then_ceiling_scenario() {
        let mut config = SizerConfig::default();
        config.regime_scalars.insert(Regime::Expansion, dec!(0.75));
        config.event_multipliers.insert("news".to_string(), dec!(0.5));
        let sizer = PositionSizer::new(config);

        let outcome = sizer.size(&req(Regime::Expansion, "news")).unwrap();
        assert!(!outcome.floor_applied);
        assert!(!outcome.ceiling_applied);
        assert!((outcome.position_size - dec!(0.075)).abs() < dec!(0.0001));
        assert!((outcome.risk_amount - dec!(37.5)).abs() < dec!(0.01));
    }

    #[test]
    fn floor_scales_up_without_reactivating_ceiling() {
        let mut config = SizerConfig::default();
        config.floor_risk_fraction = dec!(0.01);
        config.ceiling_risk_fraction = dec!(0.02);
        config.regime_scalars.insert(Regime::Expansion, dec!(0.75));
        config.event_multipliers.insert("news".to_string(), dec!(0.5));
        let sizer = PositionSizer::new(config);

        let outcome = sizer.size(&req(Regime::Expansion, "news")).unwrap();
        assert!(outcome.floor_applied);
        assert!(!outcome.ceiling_applied);
        assert!((outcome.effective_risk_fraction - dec!(0.01)).abs() < dec!(0.0001));
    }

    #[test]
    fn disabled_regime_zeroes_size() {
        let sizer = PositionSizer::new(SizerConfig::default());
        let outcome = sizer.size(&req(Regime::Disabled, "none")).unwrap();
        assert_eq!(outcome.position_size, Decimal::ZERO);
    }

    #[test]
    fn win_streak_raises_risk_fraction() {
        let mut sizer = PositionSizer::new(SizerConfig::default());
        sizer.record_win();
        sizer.record_win();
        assert_eq!(sizer.current_risk_fraction(), dec!(0.01));
        sizer.record_win();
        assert_eq!(sizer.current_risk_fraction(), dec!(0.0125));
        sizer.record_win();
        sizer.record_win();
        assert_eq!(sizer.current_risk_fraction(), dec!(0.015));
    }

    #[test]
    fn loss_streak_lowers_then_resets_on_win() {
        let mut sizer = PositionSizer::new(SizerConfig::default());
        sizer.record_loss();
        assert_eq!(sizer.current_risk_fraction(), dec!(0.01));
        sizer.record_loss();
        assert_eq!(sizer.current_risk_fraction(), dec!(0.0075));
        sizer.record_loss();
        sizer.record_loss();
        assert_eq!(sizer.current_risk_fraction(), dec!(0.005));
        sizer.record_win();
        assert_eq!(sizer.current_risk_fraction(), dec!(0.01));
    }

    #[test]
    fn zero_stop_distance_yields_no_outcome() {
        let sizer = PositionSizer::new(SizerConfig::default());
        let mut r = req(Regime::Sideways, "none");
        r.stop_price = r.entry_price;
        assert!(sizer.size(&r).is_none());
    }

    #[test]
    fn kelly_fraction_clamped_to_ceiling() {
        let sizer = PositionSizer::new(SizerConfig::default());
        let f = sizer.kelly_fraction(dec!(0.9), dec!(10), dec!(1));
        assert!(f <= sizer.config.ceiling_risk_fraction);
        assert!(f > Decimal::ZERO);
    }
}
