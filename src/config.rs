use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use crate::domain::absorption::AbsorptionConfig;
use crate::domain::cascade::CascadeConfig;
use crate::domain::health::HealthConfig;
use crate::domain::risk::{DegradationConfig, DrawdownConfig, LimitsConfig, SizerConfig};
use crate::domain::threshold::GridSearchConfig;
use crate::domain::validation::data_quality::DataQualityConfig;
use crate::domain::wallet_poller::PollerConfig;

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("failed to parse {key}={raw}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_decimal(key: &str, default: Decimal) -> Result<Decimal> {
    match env::var(key) {
        Ok(raw) => Decimal::from_str(&raw).with_context(|| format!("failed to parse {key}={raw} as decimal")),
        Err(_) => Ok(default),
    }
}

/// Top-level configuration, assembled from environment variables with
/// defaults matching each component's own `Default` impl. Every sub-config's
/// `validate()` runs at construction, so a bad override fails fast rather
/// than surfacing as a silent misbehavior downstream (spec §9).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub poller: PollerConfig,
    pub cascade: CascadeConfig,
    pub absorption: AbsorptionConfig,
    pub data_quality: DataQualityConfig,
    pub sizer: SizerConfig,
    pub limits: LimitsConfig,
    pub drawdown: DrawdownConfig,
    pub degradation: DegradationConfig,
    pub health: HealthConfig,
    pub grid_search: GridSearchConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/raw_store.db".to_string());

        let poller = {
            let defaults = PollerConfig::default();
            PollerConfig {
                tier1_threshold_usd: env_parse("TIER1_THRESHOLD_USD", defaults.tier1_threshold_usd)?,
                tier2_threshold_usd: env_parse("TIER2_THRESHOLD_USD", defaults.tier2_threshold_usd)?,
                tier3_min_usd: env_parse("TIER3_MIN_USD", defaults.tier3_min_usd)?,
                tier1_interval_s: env_parse("TIER1_INTERVAL_S", defaults.tier1_interval_s)?,
                tier2_interval_s: env_parse("TIER2_INTERVAL_S", defaults.tier2_interval_s)?,
                tier3_interval_s: env_parse("TIER3_INTERVAL_S", defaults.tier3_interval_s)?,
                discovery_interval_s: env_parse("DISCOVERY_INTERVAL_S", defaults.discovery_interval_s)?,
                discovery_min_value_usd: env_parse(
                    "DISCOVERY_MIN_VALUE_USD",
                    defaults.discovery_min_value_usd,
                )?,
                discovery_coins: env::var("DISCOVERY_COINS")
                    .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or(defaults.discovery_coins),
                empty_polls_before_demotion: env_parse(
                    "EMPTY_POLLS_BEFORE_DEMOTION",
                    defaults.empty_polls_before_demotion,
                )?,
                requests_per_minute: env_parse("POLLER_REQUESTS_PER_MINUTE", defaults.requests_per_minute)?,
            }
        };
        poller.validate().map_err(|e| anyhow::anyhow!(e))?;

        let cascade = CascadeConfig {
            idle_rate_threshold: env_parse("CASCADE_IDLE_RATE_THRESHOLD", CascadeConfig::default().idle_rate_threshold)?,
        };
        cascade.validate().map_err(|e| anyhow::anyhow!(e))?;

        let absorption = AbsorptionConfig {
            epsilon: env_parse("ABSORPTION_EPSILON", AbsorptionConfig::default().epsilon)?,
        };
        absorption.validate().map_err(|e| anyhow::anyhow!(e))?;

        let data_quality = DataQualityConfig {
            max_staleness_ns: match env::var("MAX_STALENESS_NS") {
                Ok(raw) if raw == "none" => None,
                Ok(raw) => Some(raw.parse::<i64>().context("failed to parse MAX_STALENESS_NS")?),
                Err(_) => DataQualityConfig::default().max_staleness_ns,
            },
        };

        let sizer = {
            let defaults = SizerConfig::default();
            SizerConfig {
                default_risk_fraction: env_decimal("DEFAULT_RISK_FRACTION", defaults.default_risk_fraction)?,
                floor_risk_fraction: env_decimal("FLOOR_RISK_FRACTION", defaults.floor_risk_fraction)?,
                ceiling_risk_fraction: env_decimal("CEILING_RISK_FRACTION", defaults.ceiling_risk_fraction)?,
                kelly_fractional_multiplier: env_decimal(
                    "KELLY_FRACTIONAL_MULTIPLIER",
                    defaults.kelly_fractional_multiplier,
                )?,
                ..defaults
            }
        };
        sizer.validate().map_err(|e| anyhow::anyhow!(e))?;

        let limits = {
            let defaults = LimitsConfig::default();
            LimitsConfig {
                max_per_symbol_pct: env_decimal("MAX_PER_SYMBOL_PCT", defaults.max_per_symbol_pct)?,
                max_aggregate_pct: env_decimal("MAX_AGGREGATE_PCT", defaults.max_aggregate_pct)?,
                max_correlated_pct: env_decimal("MAX_CORRELATED_PCT", defaults.max_correlated_pct)?,
                correlation_threshold: env_decimal("CORRELATION_THRESHOLD", defaults.correlation_threshold)?,
                max_concurrent_positions: env_parse(
                    "MAX_CONCURRENT_POSITIONS",
                    defaults.max_concurrent_positions,
                )?,
                max_portfolio_heat_pct: env_decimal("MAX_PORTFOLIO_HEAT_PCT", defaults.max_portfolio_heat_pct)?,
            }
        };
        limits.validate().map_err(|e| anyhow::anyhow!(e))?;

        let drawdown = {
            let defaults = DrawdownConfig::default();
            DrawdownConfig {
                daily_loss_cooldown_pct: env_decimal("DAILY_LOSS_COOLDOWN_PCT", defaults.daily_loss_cooldown_pct)?,
                weekly_loss_cooldown_pct: env_decimal(
                    "WEEKLY_LOSS_COOLDOWN_PCT",
                    defaults.weekly_loss_cooldown_pct,
                )?,
                maximum_drawdown_pct: env_decimal("MAXIMUM_DRAWDOWN_PCT", defaults.maximum_drawdown_pct)?,
                ..defaults
            }
        };
        drawdown.validate().map_err(|e| anyhow::anyhow!(e))?;

        let degradation = DegradationConfig {
            min_dwell: Duration::from_secs(env_parse(
                "DEGRADATION_MIN_DWELL_SECS",
                DegradationConfig::default().min_dwell.as_secs(),
            )?),
            shutdown_requires_manual_reset: env_parse(
                "DEGRADATION_SHUTDOWN_REQUIRES_MANUAL_RESET",
                DegradationConfig::default().shutdown_requires_manual_reset,
            )?,
        };

        let health = {
            let defaults = HealthConfig::default();
            HealthConfig {
                heartbeat_timeout: Duration::from_secs(env_parse(
                    "HEARTBEAT_TIMEOUT_SECS",
                    defaults.heartbeat_timeout.as_secs(),
                )?),
                heartbeat_warning: Duration::from_secs(env_parse(
                    "HEARTBEAT_WARNING_SECS",
                    defaults.heartbeat_warning.as_secs(),
                )?),
                ..defaults
            }
        };

        let grid_search = {
            let defaults = GridSearchConfig::default();
            GridSearchConfig {
                min_value: env_parse("GRID_SEARCH_MIN_VALUE", defaults.min_value)?,
                max_value: env_parse("GRID_SEARCH_MAX_VALUE", defaults.max_value)?,
                step: env_parse("GRID_SEARCH_STEP", defaults.step)?,
                min_trades: env_parse("GRID_SEARCH_MIN_TRADES", defaults.min_trades)?,
            }
        };

        Ok(Self {
            database_url,
            poller,
            cascade,
            absorption,
            data_quality,
            sizer,
            limits,
            drawdown,
            degradation,
            health,
            grid_search,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_env_overrides() {
        for key in [
            "TIER1_THRESHOLD_USD",
            "CASCADE_IDLE_RATE_THRESHOLD",
            "DEFAULT_RISK_FRACTION",
            "MAX_PER_SYMBOL_PCT",
        ] {
            env::remove_var(key);
        }
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.poller.tier1_threshold_usd, PollerConfig::default().tier1_threshold_usd);
    }

    #[test]
    fn invalid_override_is_rejected() {
        env::set_var("CASCADE_IDLE_RATE_THRESHOLD", "-1.0");
        let result = AppConfig::from_env();
        env::remove_var("CASCADE_IDLE_RATE_THRESHOLD");
        assert!(result.is_err());
    }
}
