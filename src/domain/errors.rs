use thiserror::Error;
use rust_decimal::Decimal;

/// Errors from the append-only raw store.
#[derive(Debug, Error)]
pub enum RawStoreError {
    #[error("storage backend error: {reason}")]
    Backend { reason: String },

    #[error("poll cycle {cycle_id} was never opened")]
    UnknownPollCycle { cycle_id: i64 },

    #[error("referenced snapshot {snapshot_id} does not exist")]
    DanglingSnapshotRef { snapshot_id: i64 },
}

/// Errors from the tiered wallet poller.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("exchange adapter error for wallet {wallet}: {reason}")]
    AdapterFailure { wallet: String, reason: String },

    #[error("malformed response for wallet {wallet}: {reason}")]
    MalformedResponse { wallet: String, reason: String },

    #[error(transparent)]
    Store(#[from] RawStoreError),
}

/// Errors from threshold discovery and the threshold store.
#[derive(Debug, Error)]
pub enum ThresholdError {
    #[error("no candidates survived filtering and none were supplied")]
    EmptyCandidateSet,

    #[error("invalid grid: start {start} step {step} must produce at least one value")]
    InvalidGrid { start: f64, step: f64 },

    #[error("threshold set import failed: {reason}")]
    ImportFailed { reason: String },

    #[error(transparent)]
    Store(#[from] RawStoreError),
}

/// Errors surfaced by the risk envelope's own plumbing (not business-rule
/// rejections, which are typed outcome values rather than errors per §7).
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("unknown configuration option: {option}")]
    UnknownOption { option: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("non-positive capital: {capital}")]
    NonPositiveCapital { capital: Decimal },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poller_error_wraps_store_error() {
        let store_err = RawStoreError::UnknownPollCycle { cycle_id: 7 };
        let poller_err: PollerError = store_err.into();
        assert!(poller_err.to_string().contains("7"));
    }

    #[test]
    fn test_risk_error_formatting() {
        let err = RiskError::NonPositiveCapital {
            capital: Decimal::ZERO,
        };
        assert!(err.to_string().contains("0"));
    }
}
