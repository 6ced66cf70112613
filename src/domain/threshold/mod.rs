//! Threshold discovery and versioned storage (spec §4.F, §4.G).

pub mod discovery;
pub mod store;

pub use discovery::{
    DiscoveryMethod, GridSearchConfig, GridSearchOptimizer, OptimizationResult, OutOfSampleOutcome, OutOfSampleValidator, RocAnalyzer,
    RocPoint, SensitivityAnalyzer, SensitivityOutcome, SensitivityReason, ThresholdCandidate, WalkForwardConfig, WalkForwardOptimizer,
    WalkForwardWindow,
};
pub use store::{export_to_json, import_from_json, InMemoryThresholdStore, ThresholdConfig, ThresholdSet, ThresholdStatus, ThresholdStore};
