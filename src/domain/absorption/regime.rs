use super::{BookSnapshot, TradeTick, price_range_bps};

/// Derived market context for a coin over its last 30s, recomputed at query
/// time and never stored. Everything downstream (the four confirmation
/// signals) is evaluated relative to this, not to a fixed cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeContext {
    pub price_range_bps: f64,
    pub atr_proxy: f64,
    pub median_trade_size: f64,
    pub total_volume: f64,
    pub trade_rate_per_s: f64,
    pub avg_spread_bps: f64,
    pub spread_stddev_bps: f64,
    pub adaptive_window_s: f64,
}

impl RegimeContext {
    /// The no-data regime: zero everywhere except the window, which falls
    /// back to the 15s ceiling per the "no trades" edge case.
    pub fn empty() -> Self {
        Self {
            price_range_bps: 0.0,
            atr_proxy: 0.0,
            median_trade_size: 0.0,
            total_volume: 0.0,
            trade_rate_per_s: 0.0,
            avg_spread_bps: 0.0,
            spread_stddev_bps: 0.0,
            adaptive_window_s: 15.0,
        }
    }
}

const LOOKBACK_S: f64 = 30.0;

pub(super) fn compute(trades: Vec<TradeTick>, books: Vec<BookSnapshot>) -> RegimeContext {
    if trades.is_empty() {
        return RegimeContext::empty();
    }

    let price_range_bps = price_range_bps(trades.iter().map(|t| t.price));
    let atr_proxy = price_range_bps / 100.0 / LOOKBACK_S;

    let mut sizes: Vec<f64> = trades.iter().map(|t| t.volume).collect();
    sizes.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median_trade_size = sizes[sizes.len() / 2];
    let total_volume: f64 = trades.iter().map(|t| t.volume).sum();
    let trade_rate_per_s = trades.len() as f64 / LOOKBACK_S;

    let (avg_spread_bps, spread_stddev_bps) = if books.is_empty() {
        (0.0, 0.0)
    } else {
        let spreads: Vec<f64> = books
            .iter()
            .filter(|b| b.mid > 0.0)
            .map(|b| b.spread / b.mid * 10_000.0)
            .collect();
        if spreads.is_empty() {
            (0.0, 0.0)
        } else {
            let mean = spreads.iter().sum::<f64>() / spreads.len() as f64;
            let variance =
                spreads.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / spreads.len() as f64;
            (mean, variance.sqrt())
        }
    };

    let adaptive_window_s = if trade_rate_per_s > 0.0 {
        (50.0 / trade_rate_per_s).clamp(2.0, 15.0)
    } else {
        15.0
    };

    RegimeContext {
        price_range_bps,
        atr_proxy,
        median_trade_size,
        total_volume,
        trade_rate_per_s,
        avg_spread_bps,
        spread_stddev_bps,
        adaptive_window_s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_regime() {
        let ctx = compute(vec![], vec![]);
        assert_eq!(ctx.adaptive_window_s, 15.0);
        assert_eq!(ctx.trade_rate_per_s, 0.0);
    }

    #[test]
    fn adaptive_window_clamped_to_bounds() {
        let trades: Vec<TradeTick> = (0..1000)
            .map(|i| TradeTick {
                timestamp_ns: i * 1_000_000,
                price: 100.0,
                volume: 1.0,
                is_sell: false,
            })
            .collect();
        let ctx = compute(trades, vec![]);
        assert!(ctx.adaptive_window_s >= 2.0 && ctx.adaptive_window_s <= 15.0);
    }
}
