//! Per-coin liquidation cascade momentum tracking.
//!
//! A purely observational state machine over a rolling 60-second buffer of
//! open-interest change events. It never predicts anything; it classifies
//! what has already happened into a phase (idle / accelerating / steady /
//! decelerating / exhausted) from rate and acceleration of OI drops.
//!
//! Whether an absorption signal gates the EXHAUSTED transition is a
//! construction-time choice, not a per-event `Option` check — see
//! [`NoAbsorptionGate`] and [`AbsorptionSignal`]. A cascade tracker built
//! without a gate can never report EXHAUSTED; it degenerates to cycling
//! between the decelerating-unconfirmed and idle phases. This is
//! deliberate: silence in the event stream is not, on its own, evidence
//! that selling pressure has stopped.

use std::collections::{HashMap, VecDeque};

mod config;
pub use config::CascadeConfig;

/// Observable phase of a per-coin cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadePhase {
    Idle,
    Accelerating,
    Steady,
    DeceleratingUnconfirmed,
    DeceleratingConfirmed,
    Exhausted,
}

/// A single OI-change observation on a coin.
#[derive(Debug, Clone, Copy)]
pub struct CascadeEvent {
    pub timestamp_ns: i64,
    pub oi_change_pct: f64,
    pub is_significant: bool,
}

impl CascadeEvent {
    pub fn new(timestamp_ns: i64, oi_change_pct: f64) -> Self {
        Self {
            timestamp_ns,
            oi_change_pct,
            is_significant: oi_change_pct.abs() > 0.1,
        }
    }
}

/// Snapshot of a coin's cascade state after processing one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeObservation {
    pub phase: CascadePhase,
    pub rate_1s: f64,
    pub rate_5s: f64,
    pub rate_30s: f64,
    pub acceleration: f64,
    pub cascade_start_ts: Option<i64>,
    pub cumulative_oi_dropped: f64,
    pub peak_rate: f64,
    pub liquidation_signals_5s: u32,
    pub liquidation_signals_30s: u32,
}

/// Decides, for a coin, whether an independent confirmation signal permits
/// the EXHAUSTED transition. Two implementations are statically selected at
/// construction: [`NoAbsorptionGate`] (always refuses) and a real absorption
/// tracker wired in by the caller.
pub trait AbsorptionSignal {
    fn permits_exhaustion(&self, coin: &str, now_ns: i64) -> bool;
}

/// The "no absorption tracker attached" case. EXHAUSTED is structurally
/// unreachable through this gate; cascades fall back to IDLE once their
/// events age out of the 60s buffer instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAbsorptionGate;

impl AbsorptionSignal for NoAbsorptionGate {
    fn permits_exhaustion(&self, _coin: &str, _now_ns: i64) -> bool {
        false
    }
}

impl AbsorptionSignal for parking_lot::Mutex<crate::domain::absorption::AbsorptionTracker> {
    /// Re-evaluates the live absorption signals for `coin` as of `now_ns`.
    /// This is the real production gate: a cascade tracker constructed with
    /// `CascadeTracker::with_gate(config, mutex_wrapped_absorption_tracker)`
    /// gets the spec §4.C coupling without either side owning the other.
    fn permits_exhaustion(&self, coin: &str, now_ns: i64) -> bool {
        self.lock().confirms_exhaustion(coin, now_ns)
    }
}

const BUFFER_WINDOW_NS: i64 = 60_000_000_000;
const IDLE_SILENCE_NS: i64 = 10_000_000_000;

#[derive(Debug, Default)]
struct CoinState {
    events: VecDeque<CascadeEvent>,
    liquidation_signals: VecDeque<i64>,
    phase: CascadePhase,
    cascade_start_ts: Option<i64>,
    cumulative_oi_dropped: f64,
    peak_rate: f64,
}

impl Default for CascadePhase {
    fn default() -> Self {
        CascadePhase::Idle
    }
}

fn rate_over(events: &VecDeque<CascadeEvent>, now: i64, window_ns: i64) -> f64 {
    let window_s = window_ns as f64 / 1_000_000_000.0;
    let sum: f64 = events
        .iter()
        .filter(|e| now - e.timestamp_ns <= window_ns)
        .map(|e| e.oi_change_pct)
        .sum();
    sum / window_s
}

/// Per-coin cascade momentum tracker, parameterized over its absorption
/// gating strategy.
pub struct CascadeTracker<G: AbsorptionSignal> {
    config: CascadeConfig,
    gate: G,
    coins: HashMap<String, CoinState>,
}

impl CascadeTracker<NoAbsorptionGate> {
    /// Build a tracker with no absorption coupling: EXHAUSTED is never
    /// entered, by construction.
    pub fn new(config: CascadeConfig) -> Self {
        Self {
            config,
            gate: NoAbsorptionGate,
            coins: HashMap::new(),
        }
    }
}

impl<G: AbsorptionSignal> CascadeTracker<G> {
    /// Build a tracker gated by `gate`: EXHAUSTED becomes reachable once the
    /// gate confirms independently of this tracker's own event silence.
    pub fn with_gate(config: CascadeConfig, gate: G) -> Self {
        Self {
            config,
            gate,
            coins: HashMap::new(),
        }
    }

    pub fn record_liquidation_signal(&mut self, coin: &str, timestamp_ns: i64) {
        let state = self.coins.entry(coin.to_string()).or_default();
        state.liquidation_signals.push_back(timestamp_ns);
        while let Some(&front) = state.liquidation_signals.front() {
            if timestamp_ns - front > BUFFER_WINDOW_NS {
                state.liquidation_signals.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record_event(&mut self, coin: &str, event: CascadeEvent) -> CascadeObservation {
        let confirmed = self.gate.permits_exhaustion(coin, event.timestamp_ns);
        let config = self.config;
        let state = self.coins.entry(coin.to_string()).or_default();

        if state.phase == CascadePhase::Exhausted {
            state.phase = CascadePhase::Idle;
            state.cascade_start_ts = None;
            state.cumulative_oi_dropped = 0.0;
            state.peak_rate = 0.0;
        }

        state.events.push_back(event);
        while let Some(front) = state.events.front() {
            if event.timestamp_ns - front.timestamp_ns > BUFFER_WINDOW_NS {
                state.events.pop_front();
            } else {
                break;
            }
        }

        let rate_1s = rate_over(&state.events, event.timestamp_ns, 1_000_000_000);
        let rate_5s = rate_over(&state.events, event.timestamp_ns, 5_000_000_000);
        let rate_30s = rate_over(&state.events, event.timestamp_ns, 30_000_000_000);
        let rate_5s_prior = rate_over_range(
            &state.events,
            event.timestamp_ns - 5_000_000_000,
            event.timestamp_ns - 10_000_000_000,
        );
        let acceleration = (rate_5s - rate_5s_prior) / 5.0;

        if event.oi_change_pct < 0.0 {
            state.cumulative_oi_dropped += -event.oi_change_pct;
            if state.phase == CascadePhase::Idle && state.cascade_start_ts.is_none() {
                state.cascade_start_ts = Some(event.timestamp_ns);
            }
        }
        state.peak_rate = state.peak_rate.max(rate_5s.abs());

        let last_drop_ts = state
            .events
            .iter()
            .rev()
            .find(|e| e.oi_change_pct < 0.0)
            .map(|e| e.timestamp_ns);
        let silence_ns = last_drop_ts.map(|ts| event.timestamp_ns - ts).unwrap_or(0);
        let is_idle_rate = rate_5s.abs() < config.idle_rate_threshold;

        state.phase = match state.phase {
            CascadePhase::Idle => {
                if rate_5s.abs() >= config.idle_rate_threshold && acceleration < -0.005 {
                    CascadePhase::Accelerating
                } else {
                    CascadePhase::Idle
                }
            }
            CascadePhase::Accelerating => {
                if acceleration.abs() <= 0.005 {
                    CascadePhase::Steady
                } else if is_idle_rate && silence_ns > IDLE_SILENCE_NS {
                    exhaustion_phase(confirmed)
                } else {
                    CascadePhase::Accelerating
                }
            }
            CascadePhase::Steady => {
                if acceleration > 0.005 {
                    CascadePhase::DeceleratingUnconfirmed
                } else if is_idle_rate && silence_ns > IDLE_SILENCE_NS {
                    exhaustion_phase(confirmed)
                } else {
                    CascadePhase::Steady
                }
            }
            CascadePhase::DeceleratingUnconfirmed | CascadePhase::DeceleratingConfirmed => {
                if is_idle_rate && silence_ns > IDLE_SILENCE_NS {
                    exhaustion_phase(confirmed)
                } else if confirmed {
                    CascadePhase::DeceleratingConfirmed
                } else {
                    CascadePhase::DeceleratingUnconfirmed
                }
            }
            CascadePhase::Exhausted => unreachable!("cleared to Idle above"),
        };

        if state.phase == CascadePhase::Exhausted {
            state.cascade_start_ts = None;
            state.cumulative_oi_dropped = 0.0;
            state.peak_rate = 0.0;
        }

        CascadeObservation {
            phase: state.phase,
            rate_1s,
            rate_5s,
            rate_30s,
            acceleration,
            cascade_start_ts: state.cascade_start_ts,
            cumulative_oi_dropped: state.cumulative_oi_dropped,
            peak_rate: state.peak_rate,
            liquidation_signals_5s: count_within(&state.liquidation_signals, event.timestamp_ns, 5_000_000_000),
            liquidation_signals_30s: count_within(&state.liquidation_signals, event.timestamp_ns, 30_000_000_000),
        }
    }

    pub fn phase(&self, coin: &str) -> CascadePhase {
        self.coins.get(coin).map(|s| s.phase).unwrap_or(CascadePhase::Idle)
    }
}

fn exhaustion_phase(confirmed: bool) -> CascadePhase {
    if confirmed {
        CascadePhase::Exhausted
    } else {
        CascadePhase::DeceleratingUnconfirmed
    }
}

/// Sum of OI change over the 5s window bounded by the two absolute
/// timestamps `a` and `b` (order-independent), divided by 5s — used to get
/// the "prior 5s" rate for the acceleration formula.
fn rate_over_range(events: &VecDeque<CascadeEvent>, a: i64, b: i64) -> f64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    let sum: f64 = events
        .iter()
        .filter(|e| e.timestamp_ns > lo && e.timestamp_ns <= hi)
        .map(|e| e.oi_change_pct)
        .sum();
    sum / 5.0
}

fn count_within(timestamps: &VecDeque<i64>, now: i64, window_ns: i64) -> u32 {
    timestamps.iter().filter(|&&ts| now - ts <= window_ns).count() as u32
}
