// Risk management domain
pub mod breakers;
pub mod capital_manager;
pub mod degradation;
pub mod drawdown;
pub mod limits;
pub mod sizer;

pub use breakers::{BreakerKind, BreakerState, CircuitBreakerPanel};
pub use capital_manager::{CapitalManager, RejectionReason, TradeApproval, TradeDecision, TradeRequest};
pub use degradation::{DegradationConfig, DegradationLevel, DegradationManager};
pub use drawdown::{CooldownReason, DrawdownConfig, DrawdownState, DrawdownTracker};
pub use limits::{LimitCheckResult, LimitRejectionReason, LimitsConfig, OpenPosition, ProposedPosition, RiskLimitsChecker};
pub use sizer::{PositionSizer, Regime, SizerConfig, SizingOutcome, SizingRequest};
