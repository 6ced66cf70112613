//! Degradation manager (spec §4.H.5).
//!
//! Maps the union of currently tripped circuit breakers onto one of four
//! operating levels, each with a minimum dwell time so the system doesn't
//! flap between levels on a single noisy tick.

use std::time::Duration;

use super::breakers::BreakerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DegradationLevel {
    Normal,
    Reduced,
    Emergency,
    Shutdown,
}

impl DegradationLevel {
    /// The level a set of tripped breakers maps to, absent any dwell-time
    /// stickiness.
    fn from_tripped(tripped: &[BreakerKind]) -> Self {
        if tripped.is_empty() {
            return DegradationLevel::Normal;
        }
        let has_critical = tripped
            .iter()
            .any(|k| matches!(k, BreakerKind::StrategyMalfunction | BreakerKind::ResourceExhaustion));
        if has_critical && tripped.len() > 1 {
            DegradationLevel::Shutdown
        } else if has_critical {
            DegradationLevel::Emergency
        } else {
            DegradationLevel::Reduced
        }
    }
}

#[derive(Debug, Clone)]
pub struct DegradationConfig {
    pub min_dwell: Duration,
    pub shutdown_requires_manual_reset: bool,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            min_dwell: Duration::from_secs(30),
            shutdown_requires_manual_reset: true,
        }
    }
}

/// Tracks the current [`DegradationLevel`] and when it was entered, using an
/// externally supplied monotonic clock (`now_ns`) so evaluation stays
/// deterministic and testable.
#[derive(Debug)]
pub struct DegradationManager {
    config: DegradationConfig,
    level: DegradationLevel,
    entered_at_ns: i64,
    manual_reset_pending: bool,
}

impl DegradationManager {
    pub fn new(config: DegradationConfig, now_ns: i64) -> Self {
        Self {
            config,
            level: DegradationLevel::Normal,
            entered_at_ns: now_ns,
            manual_reset_pending: false,
        }
    }

    pub fn level(&self) -> DegradationLevel {
        self.level
    }

    /// Evaluate the current breaker state at `now_ns`. A move to a stricter
    /// level always applies immediately; a move to a looser level is
    /// deferred until the minimum dwell time at the current level has
    /// elapsed. Shutdown never clears itself when
    /// `shutdown_requires_manual_reset` is set — only [`Self::manual_reset`]
    /// can.
    pub fn evaluate(&mut self, tripped: &[BreakerKind], now_ns: i64) -> DegradationLevel {
        if self.level == DegradationLevel::Shutdown
            && self.config.shutdown_requires_manual_reset
            && !self.manual_reset_pending
        {
            return self.level;
        }

        let target = DegradationLevel::from_tripped(tripped);
        let dwell_elapsed = now_ns - self.entered_at_ns >= self.config.min_dwell.as_nanos() as i64;

        if target > self.level || dwell_elapsed {
            if target != self.level {
                self.level = target;
                self.entered_at_ns = now_ns;
                self.manual_reset_pending = false;
            }
        }
        self.level
    }

    /// Required to clear a sticky shutdown; has no effect otherwise.
    pub fn manual_reset(&mut self, now_ns: i64) {
        if self.level == DegradationLevel::Shutdown {
            self.manual_reset_pending = true;
            self.level = DegradationLevel::Normal;
            self.entered_at_ns = now_ns;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_soft_breaker_yields_reduced() {
        let level = DegradationLevel::from_tripped(&[BreakerKind::RapidLoss]);
        assert_eq!(level, DegradationLevel::Reduced);
    }

    #[test]
    fn single_critical_breaker_yields_emergency() {
        let level = DegradationLevel::from_tripped(&[BreakerKind::ResourceExhaustion]);
        assert_eq!(level, DegradationLevel::Emergency);
    }

    #[test]
    fn two_critical_breakers_yield_shutdown() {
        let level = DegradationLevel::from_tripped(&[
            BreakerKind::StrategyMalfunction,
            BreakerKind::ResourceExhaustion,
        ]);
        assert_eq!(level, DegradationLevel::Shutdown);
    }

    #[test]
    fn tightening_applies_immediately_loosening_waits_for_dwell() {
        let mut manager = DegradationManager::new(DegradationConfig::default(), 0);
        assert_eq!(manager.evaluate(&[BreakerKind::ResourceExhaustion], 0), DegradationLevel::Emergency);

        assert_eq!(manager.evaluate(&[], 1_000_000), DegradationLevel::Emergency);

        let thirty_one_s_ns = 31_000_000_000;
        assert_eq!(manager.evaluate(&[], thirty_one_s_ns), DegradationLevel::Normal);
    }

    #[test]
    fn shutdown_requires_manual_reset() {
        let mut manager = DegradationManager::new(DegradationConfig::default(), 0);
        manager.evaluate(&[BreakerKind::StrategyMalfunction, BreakerKind::ResourceExhaustion], 0);
        assert_eq!(manager.level(), DegradationLevel::Shutdown);

        assert_eq!(manager.evaluate(&[], 1_000_000_000_000), DegradationLevel::Shutdown);

        manager.manual_reset(1_000_000_000_001);
        assert_eq!(manager.evaluate(&[], 1_000_000_000_001), DegradationLevel::Normal);
    }
}
