//! Grid search, ROC, sensitivity, OOS, and walk-forward threshold discovery
//! (spec §4.F).
//!
//! Performance metrics here are plain `f64` rather than `Decimal`: they are
//! statistical summaries (win rate, Sharpe, Youden's J), not money, matching
//! the teacher's `domain::performance` module.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ThresholdError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    #[serde(rename = "grid")]
    GridSearch,
    #[serde(rename = "roc")]
    RocAnalysis,
    ExpectedValue,
    #[serde(rename = "domain")]
    DomainKnowledge,
    #[serde(rename = "conservative")]
    ConservativeDefault,
}

/// A single threshold value and the trading outcomes it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCandidate {
    pub value: f64,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub total_pnl: f64,
    pub sharpe_ratio: f64,
}

impl ThresholdCandidate {
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }

    pub fn avg_pnl_per_trade(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.total_pnl / self.trades as f64
        }
    }

    /// win_rate * sqrt(trades) * max(0, sharpe).
    pub fn score(&self) -> f64 {
        if self.trades == 0 {
            return 0.0;
        }
        self.win_rate() * (self.trades as f64).sqrt() * self.sharpe_ratio.max(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct GridSearchConfig {
    pub min_value: f64,
    pub max_value: f64,
    pub step: f64,
    pub min_trades: u32,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            min_value: 0.0,
            max_value: 1.0,
            step: 0.1,
            min_trades: 20,
        }
    }
}

impl GridSearchConfig {
    /// All grid values, inclusive of both endpoints.
    pub fn values(&self) -> Result<Vec<f64>, ThresholdError> {
        if self.step <= 0.0 || self.max_value < self.min_value {
            return Err(ThresholdError::InvalidGrid {
                start: self.min_value,
                step: self.step,
            });
        }
        let mut result = Vec::new();
        let mut current = self.min_value;
        // Guard against float drift leaving the last value just short of max.
        while current <= self.max_value + self.step / 2.0 {
            result.push((current * 1e6).round() / 1e6);
            current += self.step;
        }
        if result.is_empty() {
            return Err(ThresholdError::InvalidGrid {
                start: self.min_value,
                step: self.step,
            });
        }
        Ok(result)
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub optimal_value: f64,
    pub method: DiscoveryMethod,
    pub in_sample_performance: ThresholdCandidate,
    pub sensitivity: Vec<(f64, f64)>,
    pub all_candidates: Vec<ThresholdCandidate>,
}

/// Grid search over a value range, evaluated in parallel with `rayon`.
pub struct GridSearchOptimizer {
    config: GridSearchConfig,
}

impl GridSearchOptimizer {
    pub fn new(config: GridSearchConfig) -> Self {
        Self { config }
    }

    /// `evaluate` must be safe to call concurrently from multiple threads;
    /// it is handed one grid value at a time by the rayon thread pool.
    pub fn optimize<F>(&self, evaluate: F) -> Result<OptimizationResult, ThresholdError>
    where
        F: Fn(f64) -> ThresholdCandidate + Sync,
    {
        let values = self.config.values()?;

        let candidates: Vec<ThresholdCandidate> = values.into_par_iter().map(&evaluate).collect();

        let valid: Vec<&ThresholdCandidate> = candidates.iter().filter(|c| c.trades >= self.config.min_trades).collect();
        let pool: Vec<&ThresholdCandidate> = if valid.is_empty() { candidates.iter().collect() } else { valid };

        let optimal = pool
            .into_iter()
            .max_by(|a, b| a.score().partial_cmp(&b.score()).unwrap())
            .ok_or(ThresholdError::EmptyCandidateSet)?
            .clone();

        let sensitivity = sensitivity_map(optimal.value, &candidates, 0.20);

        Ok(OptimizationResult {
            optimal_value: optimal.value,
            method: DiscoveryMethod::GridSearch,
            in_sample_performance: optimal,
            sensitivity,
            all_candidates: candidates,
        })
    }
}

/// Candidates whose value falls within `±band` of `optimal_value`, paired
/// with their Sharpe ratio.
fn sensitivity_map(optimal_value: f64, candidates: &[ThresholdCandidate], band: f64) -> Vec<(f64, f64)> {
    let lower = optimal_value * (1.0 - band);
    let upper = optimal_value * (1.0 + band);
    candidates
        .iter()
        .filter(|c| c.value >= lower && c.value <= upper)
        .map(|c| (c.value, c.sharpe_ratio))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RocPoint {
    pub threshold: f64,
    pub true_positive_rate: f64,
    pub false_positive_rate: f64,
}

impl RocPoint {
    pub fn youden_j(&self) -> f64 {
        self.true_positive_rate - self.false_positive_rate
    }
}

pub struct RocAnalyzer;

impl RocAnalyzer {
    /// Selects the threshold maximizing Youden's J = TPR - FPR.
    pub fn analyze<F>(&self, thresholds: &[f64], evaluate: F) -> Result<(f64, Vec<RocPoint>), ThresholdError>
    where
        F: Fn(f64) -> (f64, f64),
    {
        let points: Vec<RocPoint> = thresholds
            .iter()
            .map(|&threshold| {
                let (tpr, fpr) = evaluate(threshold);
                RocPoint {
                    threshold,
                    true_positive_rate: tpr,
                    false_positive_rate: fpr,
                }
            })
            .collect();

        let optimal = points
            .iter()
            .max_by(|a, b| a.youden_j().partial_cmp(&b.youden_j()).unwrap())
            .ok_or(ThresholdError::EmptyCandidateSet)?;

        Ok((optimal.threshold, points))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensitivityReason {
    OptimalValueNotInMap,
    ZeroScore,
    NoNearbyValues,
    Robust,
    Sensitive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensitivityOutcome {
    pub is_robust: bool,
    pub reason: SensitivityReason,
    pub optimal_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub degradation_pct: Option<f64>,
}

/// Checks whether a grid-search optimum sits on a stable plateau rather than
/// a narrow spike (spec §4.F Sensitivity Analyzer).
pub struct SensitivityAnalyzer {
    pub tolerance_pct: f64,
}

impl Default for SensitivityAnalyzer {
    fn default() -> Self {
        Self { tolerance_pct: 0.10 }
    }
}

impl SensitivityAnalyzer {
    pub fn analyze(&self, optimal_value: f64, sensitivity_map: &[(f64, f64)]) -> SensitivityOutcome {
        let not_found = SensitivityOutcome {
            is_robust: false,
            reason: SensitivityReason::OptimalValueNotInMap,
            optimal_score: None,
            min_score: None,
            max_score: None,
            degradation_pct: None,
        };

        let Some(&(_, optimal_score)) = sensitivity_map.iter().find(|(v, _)| (*v - optimal_value).abs() < f64::EPSILON) else {
            return not_found;
        };

        if optimal_score == 0.0 {
            return SensitivityOutcome {
                reason: SensitivityReason::ZeroScore,
                optimal_score: Some(optimal_score),
                ..not_found
            };
        }

        let lower = optimal_value * (1.0 - self.tolerance_pct);
        let upper = optimal_value * (1.0 + self.tolerance_pct);
        let nearby: Vec<f64> = sensitivity_map.iter().filter(|(v, _)| *v >= lower && *v <= upper).map(|(_, s)| *s).collect();

        if nearby.is_empty() {
            return SensitivityOutcome {
                reason: SensitivityReason::NoNearbyValues,
                optimal_score: Some(optimal_score),
                ..not_found
            };
        }

        let min_score = nearby.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_score = nearby.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let degradation = (optimal_score - min_score) / optimal_score;
        let is_robust = degradation <= self.tolerance_pct;

        SensitivityOutcome {
            is_robust,
            reason: if is_robust { SensitivityReason::Robust } else { SensitivityReason::Sensitive },
            optimal_score: Some(optimal_score),
            min_score: Some(min_score),
            max_score: Some(max_score),
            degradation_pct: Some(degradation * 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutOfSampleOutcome {
    pub is_robust: bool,
    pub degradation_pct: f64,
}

/// Compares in-sample against out-of-sample performance of the same chosen
/// value (spec §4.F Out-of-Sample Validator).
pub struct OutOfSampleValidator {
    pub max_degradation_pct: f64,
}

impl Default for OutOfSampleValidator {
    fn default() -> Self {
        Self { max_degradation_pct: 0.20 }
    }
}

impl OutOfSampleValidator {
    pub fn validate(&self, in_sample: &ThresholdCandidate, out_of_sample: &ThresholdCandidate) -> OutOfSampleOutcome {
        let degradation = if in_sample.sharpe_ratio == 0.0 {
            if out_of_sample.sharpe_ratio < 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            (in_sample.sharpe_ratio - out_of_sample.sharpe_ratio) / in_sample.sharpe_ratio
        };

        OutOfSampleOutcome {
            is_robust: degradation <= self.max_degradation_pct,
            degradation_pct: degradation * 100.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalkForwardWindow {
    pub window_start_day: i64,
    pub window_end_day: i64,
    pub test_end_day: i64,
    pub optimal_value: f64,
    pub in_sample: ThresholdCandidate,
    pub out_of_sample: ThresholdCandidate,
}

#[derive(Debug, Clone)]
pub struct WalkForwardConfig {
    pub window_size_days: i64,
    pub step_size_days: i64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            window_size_days: 60,
            step_size_days: 30,
        }
    }
}

/// Slides a fixed-size optimization window forward over days-grouped events,
/// optimizing on each window and testing the chosen value on the step that
/// follows it (spec §4.F Walk-Forward).
pub struct WalkForwardOptimizer {
    config: WalkForwardConfig,
    grid: GridSearchConfig,
}

impl WalkForwardOptimizer {
    pub fn new(config: WalkForwardConfig, grid: GridSearchConfig) -> Self {
        Self { config, grid }
    }

    /// `evaluate(value, day_offsets)` must be safe to call concurrently.
    pub fn optimize<F>(&self, days: &[i64], evaluate: F) -> Result<Vec<WalkForwardWindow>, ThresholdError>
    where
        F: Fn(f64, &[i64]) -> ThresholdCandidate + Sync,
    {
        if days.is_empty() {
            return Ok(Vec::new());
        }
        let mut sorted_days = days.to_vec();
        sorted_days.sort_unstable();
        sorted_days.dedup();

        if (sorted_days.len() as i64) < self.config.window_size_days + self.config.step_size_days {
            return Ok(Vec::new());
        }

        let start_day = sorted_days[0];
        let end_day = *sorted_days.last().unwrap();
        let values = self.grid.values()?;

        let mut results = Vec::new();
        let mut current_start = start_day;

        while current_start + self.config.window_size_days + self.config.step_size_days <= end_day {
            let opt_end = current_start + self.config.window_size_days;
            let test_end = opt_end + self.config.step_size_days;

            let opt_days: Vec<i64> = sorted_days.iter().copied().filter(|&d| d >= current_start && d < opt_end).collect();
            let test_days: Vec<i64> = sorted_days.iter().copied().filter(|&d| d >= opt_end && d < test_end).collect();

            let candidates: Vec<ThresholdCandidate> = values.par_iter().map(|&v| evaluate(v, &opt_days)).collect();
            let Some(best) = candidates.into_iter().max_by(|a, b| a.score().partial_cmp(&b.score()).unwrap()) else {
                current_start += self.config.step_size_days;
                continue;
            };

            let out_of_sample = evaluate(best.value, &test_days);

            results.push(WalkForwardWindow {
                window_start_day: current_start,
                window_end_day: opt_end,
                test_end_day: test_end,
                optimal_value: best.value,
                in_sample: best,
                out_of_sample,
            });

            current_start += self.config.step_size_days;
        }

        Ok(results)
    }
}
