//! Drawdown and loss-streak cooldowns (spec §4.H.3).
//!
//! Single source of truth for "is trading allowed". A priority ladder of
//! protective states, each derived fresh on every trade from capital
//! anchors and streak counters rather than toggled by ad-hoc transition
//! logic — which is what lets `reset_daily` exit a daily-loss cooldown but
//! leave a consecutive-loss cooldown in place: the anchor reset only
//! changes the input the daily-loss check reads.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownReason {
    DailyLoss,
    ConsecutiveLosses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawdownState {
    Normal,
    Warning,
    ReducedRisk,
    DailyCooldown { reason: CooldownReason },
    WeeklyCooldown,
    MaximumDrawdown,
}

#[derive(Debug, Clone)]
pub struct DrawdownConfig {
    pub daily_loss_warning_pct: Decimal,
    pub weekly_loss_warning_pct: Decimal,
    pub consecutive_losses_warning: u32,
    pub daily_loss_cooldown_pct: Decimal,
    pub weekly_loss_cooldown_pct: Decimal,
    pub reduced_risk_consecutive_losses: u32,
    pub recovery_wins_required: u32,
    pub consecutive_loss_cooldown_count: u32,
    pub maximum_drawdown_pct: Decimal,
    pub maximum_drawdown_recovery_pct: Decimal,
    pub reduced_risk_size_multiplier: Decimal,
    pub maximum_drawdown_size_multiplier: Decimal,
}

impl Default for DrawdownConfig {
    fn default() -> Self {
        Self {
            daily_loss_warning_pct: dec!(0.02),
            weekly_loss_warning_pct: dec!(0.05),
            consecutive_losses_warning: 3,
            daily_loss_cooldown_pct: dec!(0.03),
            weekly_loss_cooldown_pct: dec!(0.07),
            reduced_risk_consecutive_losses: 5,
            recovery_wins_required: 2,
            consecutive_loss_cooldown_count: 10,
            maximum_drawdown_pct: dec!(0.25),
            maximum_drawdown_recovery_pct: dec!(0.15),
            reduced_risk_size_multiplier: dec!(0.5),
            maximum_drawdown_size_multiplier: dec!(0.25),
        }
    }
}

/// Tracks running capital against daily/weekly anchors and the all-time peak,
/// and derives a [`DrawdownState`] from the combination on every trade.
#[derive(Debug)]
pub struct DrawdownTracker {
    config: DrawdownConfig,
    capital: Decimal,
    peak_capital: Decimal,
    daily_start_capital: Decimal,
    weekly_start_capital: Decimal,
    consecutive_losses: u32,
    consecutive_wins: u32,
    state: DrawdownState,
    in_maximum_drawdown: bool,
    in_reduced_risk: bool,
}

impl DrawdownTracker {
    pub fn new(config: DrawdownConfig, starting_capital: Decimal) -> Self {
        Self {
            config,
            capital: starting_capital,
            peak_capital: starting_capital,
            daily_start_capital: starting_capital,
            weekly_start_capital: starting_capital,
            consecutive_losses: 0,
            consecutive_wins: 0,
            state: DrawdownState::Normal,
            in_maximum_drawdown: false,
            in_reduced_risk: false,
        }
    }

    pub fn state(&self) -> DrawdownState {
        self.state
    }

    pub fn capital(&self) -> Decimal {
        self.capital
    }

    fn drawdown_from_peak(&self) -> Decimal {
        if self.peak_capital <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.peak_capital - self.capital) / self.peak_capital).max(Decimal::ZERO)
    }

    fn daily_loss_pct(&self) -> Decimal {
        if self.daily_start_capital <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.daily_start_capital - self.capital) / self.daily_start_capital).max(Decimal::ZERO)
    }

    fn weekly_loss_pct(&self) -> Decimal {
        if self.weekly_start_capital <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.weekly_start_capital - self.capital) / self.weekly_start_capital).max(Decimal::ZERO)
    }

    /// Record the pnl of a closed trade and recompute state.
    pub fn record_trade(&mut self, pnl: Decimal) {
        self.capital += pnl;
        if self.capital > self.peak_capital {
            self.peak_capital = self.capital;
        }

        if pnl < Decimal::ZERO {
            self.consecutive_losses += 1;
            self.consecutive_wins = 0;
        } else if pnl > Decimal::ZERO {
            self.consecutive_wins += 1;
            self.consecutive_losses = 0;
        }

        self.recompute_state();
    }

    /// Priority order: maximum drawdown (sticky until recovery threshold) >
    /// consecutive-loss cooldown > weekly cooldown > daily-loss cooldown >
    /// reduced risk (sticky until `recovery_wins_required` consecutive
    /// wins) > warning > normal.
    fn recompute_state(&mut self) {
        let drawdown = self.drawdown_from_peak();

        if self.in_maximum_drawdown {
            if drawdown <= self.config.maximum_drawdown_recovery_pct {
                self.in_maximum_drawdown = false;
            } else {
                self.state = DrawdownState::MaximumDrawdown;
                return;
            }
        } else if drawdown >= self.config.maximum_drawdown_pct {
            self.in_maximum_drawdown = true;
            self.state = DrawdownState::MaximumDrawdown;
            return;
        }

        if self.consecutive_losses >= self.config.consecutive_loss_cooldown_count {
            self.in_reduced_risk = false;
            self.state = DrawdownState::DailyCooldown {
                reason: CooldownReason::ConsecutiveLosses,
            };
            return;
        }

        if self.weekly_loss_pct() >= self.config.weekly_loss_cooldown_pct {
            self.state = DrawdownState::WeeklyCooldown;
            return;
        }

        if self.daily_loss_pct() >= self.config.daily_loss_cooldown_pct {
            self.state = DrawdownState::DailyCooldown {
                reason: CooldownReason::DailyLoss,
            };
            return;
        }

        if !self.in_reduced_risk && self.consecutive_losses >= self.config.reduced_risk_consecutive_losses {
            self.in_reduced_risk = true;
        }
        if self.in_reduced_risk && self.consecutive_wins >= self.config.recovery_wins_required {
            self.in_reduced_risk = false;
        }
        if self.in_reduced_risk {
            self.state = DrawdownState::ReducedRisk;
            return;
        }

        if self.daily_loss_pct() > self.config.daily_loss_warning_pct
            || self.weekly_loss_pct() > self.config.weekly_loss_warning_pct
            || self.consecutive_losses >= self.config.consecutive_losses_warning
        {
            self.state = DrawdownState::Warning;
            return;
        }

        self.state = DrawdownState::Normal;
    }

    /// Reset the daily anchor. Only clears a `DailyCooldown` whose reason is
    /// `DailyLoss` — a `ConsecutiveLosses` cooldown depends on the streak,
    /// not the calendar, and is unaffected by the anchor reset.
    pub fn reset_daily(&mut self) {
        self.daily_start_capital = self.capital;
        self.recompute_state();
    }

    /// Reset the weekly anchor. Always exits `WeeklyCooldown`, but if a
    /// consecutive-loss condition is still active the tracker lands back in
    /// a cooldown anyway; that case is logged rather than silently swapped.
    pub fn reset_weekly(&mut self) {
        self.weekly_start_capital = self.capital;
        self.recompute_state();
        if self.state != DrawdownState::Normal {
            let state = self.state;
            warn!(?state, "weekly reset did not return to normal; a non-calendar condition is still active");
        }
    }

    /// Manual override clearing every cooldown, including maximum drawdown.
    /// Intended for operator intervention only.
    pub fn force_override(&mut self) {
        warn!("drawdown tracker force-overridden by operator");
        self.in_maximum_drawdown = false;
        self.in_reduced_risk = false;
        self.consecutive_losses = 0;
        self.daily_start_capital = self.capital;
        self.weekly_start_capital = self.capital;
        self.peak_capital = self.capital;
        self.state = DrawdownState::Normal;
    }

    pub fn size_multiplier(&self) -> Decimal {
        match self.state {
            DrawdownState::Normal | DrawdownState::Warning => Decimal::ONE,
            DrawdownState::ReducedRisk => self.config.reduced_risk_size_multiplier,
            DrawdownState::MaximumDrawdown => self.config.maximum_drawdown_size_multiplier,
            DrawdownState::DailyCooldown { .. } | DrawdownState::WeeklyCooldown => Decimal::ZERO,
        }
    }

    pub fn allows_trading(&self) -> bool {
        self.size_multiplier() > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_loss_cooldown_wins_over_daily_loss_pct() {
        let mut tracker = DrawdownTracker::new(DrawdownConfig::default(), dec!(10000));
        for _ in 0..10 {
            tracker.record_trade(dec!(-50));
        }
        assert_eq!(
            tracker.state(),
            DrawdownState::DailyCooldown { reason: CooldownReason::ConsecutiveLosses }
        );
        assert!(!tracker.allows_trading());

        tracker.reset_daily();
        assert_eq!(
            tracker.state(),
            DrawdownState::DailyCooldown { reason: CooldownReason::ConsecutiveLosses }
        );

        tracker.record_trade(dec!(100));
        assert_eq!(tracker.state(), DrawdownState::Normal);
        assert!(tracker.allows_trading());
    }

    #[test]
    fn maximum_drawdown_is_sticky_until_recovery_threshold() {
        let mut tracker = DrawdownTracker::new(DrawdownConfig::default(), dec!(10000));
        tracker.record_trade(dec!(-2600));
        assert_eq!(tracker.state(), DrawdownState::MaximumDrawdown);

        tracker.record_trade(dec!(1000));
        assert_eq!(tracker.state(), DrawdownState::MaximumDrawdown);

        tracker.record_trade(dec!(700));
        assert_ne!(tracker.state(), DrawdownState::MaximumDrawdown);
    }

    #[test]
    fn reset_daily_is_noop_on_capital_when_state_normal() {
        let mut tracker = DrawdownTracker::new(DrawdownConfig::default(), dec!(10000));
        tracker.record_trade(dec!(50));
        let capital_before = tracker.capital();
        tracker.reset_daily();
        assert_eq!(tracker.capital(), capital_before);
        assert_eq!(tracker.state(), DrawdownState::Normal);
    }

    #[test]
    fn warning_then_reduced_risk_on_consecutive_losses() {
        let mut tracker = DrawdownTracker::new(DrawdownConfig::default(), dec!(10000));
        tracker.record_trade(dec!(-10));
        tracker.record_trade(dec!(-10));
        tracker.record_trade(dec!(-10));
        assert_eq!(tracker.state(), DrawdownState::Warning);

        tracker.record_trade(dec!(-10));
        tracker.record_trade(dec!(-10));
        assert_eq!(tracker.state(), DrawdownState::ReducedRisk);
        assert_eq!(tracker.size_multiplier(), dec!(0.5));
    }

    #[test]
    fn reduced_risk_requires_two_consecutive_wins_to_clear() {
        let mut tracker = DrawdownTracker::new(DrawdownConfig::default(), dec!(10000));
        for _ in 0..5 {
            tracker.record_trade(dec!(-10));
        }
        assert_eq!(tracker.state(), DrawdownState::ReducedRisk);

        tracker.record_trade(dec!(5));
        assert_eq!(tracker.state(), DrawdownState::ReducedRisk);

        tracker.record_trade(dec!(5));
        assert_eq!(tracker.state(), DrawdownState::Normal);
    }

    #[test]
    fn force_override_clears_every_cooldown() {
        let mut tracker = DrawdownTracker::new(DrawdownConfig::default(), dec!(10000));
        for _ in 0..10 {
            tracker.record_trade(dec!(-50));
        }
        tracker.force_override();
        assert_eq!(tracker.state(), DrawdownState::Normal);
        assert!(tracker.allows_trading());
    }
}
