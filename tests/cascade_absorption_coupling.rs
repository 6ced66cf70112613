//! End-to-end: a cascade tracker gated by a *real* `AbsorptionTracker`
//! (not a test stub) reaches EXHAUSTED once the absorption signals it
//! observes independently confirm, exercising the spec §4.C/§8 scenario
//! 2 coupling through the actual production gate impl
//! (`AbsorptionSignal for parking_lot::Mutex<AbsorptionTracker>`).

use parking_lot::Mutex;

use hl_cascade_watch::domain::absorption::{AbsorptionConfig, AbsorptionEvent, AbsorptionTracker, BookSnapshot, RefillEvent, TradeTick};
use hl_cascade_watch::domain::cascade::{CascadeConfig, CascadeEvent, CascadePhase, CascadeTracker};

const COIN: &str = "X";

fn seed_absorption_window(tracker: &mut AbsorptionTracker, now_ns: i64) {
    tracker.record_trade(
        COIN,
        TradeTick {
            timestamp_ns: now_ns - 300_000_000,
            price: 100.0,
            volume: 10.0,
            is_sell: true,
        },
    );
    tracker.record_trade(
        COIN,
        TradeTick {
            timestamp_ns: now_ns - 100_000_000,
            price: 100.01,
            volume: 10.0,
            is_sell: false,
        },
    );
    tracker.record_book(
        COIN,
        BookSnapshot {
            timestamp_ns: now_ns,
            total_bid_size: 500.0,
            total_ask_size: 500.0,
            mid: 100.0,
            spread: 0.0,
        },
    );
    tracker.record_absorption(
        COIN,
        AbsorptionEvent {
            timestamp_ns: now_ns,
            consumed_size: 100.0,
            price_move_pct: 0.01,
        },
    );
    tracker.record_refill(
        COIN,
        RefillEvent {
            timestamp_ns: now_ns,
            added_size: 50.0,
        },
    );
    tracker.evaluate(COIN, now_ns);
}

#[test]
fn absorption_history_builds_replenishment_and_ratio_signals() {
    let mut tracker = AbsorptionTracker::new(AbsorptionConfig::default());

    // Five independent, non-overlapping windows (20s apart, well past the
    // 15s-capped adaptive window) to build up percentile history, then a
    // sixth right before the query point.
    for i in 0..5i64 {
        seed_absorption_window(&mut tracker, -100_000_000_000 + i * 20_000_000_000);
    }
    seed_absorption_window(&mut tracker, 15_000_000_000);
    let obs = tracker.evaluate(COIN, 15_000_000_000);

    // Replenishment ratio (50/100 = 0.5 >= 0.30) fires unconditionally; the
    // absorption-ratio percentile signal fires too since every window
    // produced an identical ratio, placing the latest at the 100th
    // percentile of its own history.
    assert!(obs.signal_count >= 2, "expected at least 2 signals, got {}", obs.signal_count);
    assert!(obs.phase.is_confirmed());
    assert!(obs.replenishment_ratio >= 0.30);
}

#[test]
fn cascade_reaches_exhausted_through_the_real_absorption_gate() {
    let mut tracker = AbsorptionTracker::new(AbsorptionConfig::default());
    for i in 0..5i64 {
        seed_absorption_window(&mut tracker, -100_000_000_000 + i * 20_000_000_000);
    }
    // Seed the window that will be in scope when the cascade's silence
    // event (at 15.5s) queries the gate.
    seed_absorption_window(&mut tracker, 15_000_000_000);

    let gate = Mutex::new(tracker);
    let mut cascade = CascadeTracker::with_gate(CascadeConfig::default(), gate);

    let mut last = None;
    for i in 0..10i64 {
        let ts = i * 500_000_000;
        last = Some(cascade.record_event(COIN, CascadeEvent::new(ts, -0.5)));
    }
    assert_ne!(last.unwrap().phase, CascadePhase::Exhausted, "not yet silent");

    // Silence for > 10s triggers the exhaustion check; the real tracker's
    // signals (seeded above, in scope as of this exact timestamp) confirm it.
    let final_ts = 9 * 500_000_000 + 11_000_000_000;
    assert_eq!(final_ts, 15_500_000_000);
    let obs = cascade.record_event(COIN, CascadeEvent::new(final_ts, 0.0));
    assert_eq!(obs.phase, CascadePhase::Exhausted);
}
