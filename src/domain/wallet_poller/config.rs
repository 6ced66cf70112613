/// Tunables for [`super::TieredPoller`]. Defaults match the tiering policy
/// and pacing in use for the venue this was modeled on.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub tier1_threshold_usd: f64,
    pub tier2_threshold_usd: f64,
    pub tier3_min_usd: f64,
    pub tier1_interval_s: f64,
    pub tier2_interval_s: f64,
    pub tier3_interval_s: f64,
    pub discovery_interval_s: f64,
    pub discovery_min_value_usd: f64,
    pub discovery_coins: Vec<String>,
    pub empty_polls_before_demotion: u32,
    pub requests_per_minute: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            tier1_threshold_usd: 10_000_000.0,
            tier2_threshold_usd: 1_000_000.0,
            tier3_min_usd: 100_000.0,
            tier1_interval_s: 5.0,
            tier2_interval_s: 30.0,
            tier3_interval_s: 300.0,
            discovery_interval_s: 300.0,
            discovery_min_value_usd: 50_000.0,
            discovery_coins: vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()],
            empty_polls_before_demotion: 10,
            requests_per_minute: 1000,
        }
    }
}

impl PollerConfig {
    /// Poll interval in seconds for a wallet currently assigned to `tier`.
    pub fn interval_for_tier(&self, tier: u8) -> f64 {
        match tier {
            1 => self.tier1_interval_s,
            2 => self.tier2_interval_s,
            _ => self.tier3_interval_s,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.tier1_threshold_usd > self.tier2_threshold_usd
            && self.tier2_threshold_usd > self.tier3_min_usd)
        {
            return Err("tier thresholds must be strictly decreasing tier1 > tier2 > tier3_min".into());
        }
        for (name, v) in [
            ("tier1_interval_s", self.tier1_interval_s),
            ("tier2_interval_s", self.tier2_interval_s),
            ("tier3_interval_s", self.tier3_interval_s),
            ("discovery_interval_s", self.discovery_interval_s),
            ("discovery_min_value_usd", self.discovery_min_value_usd),
        ] {
            if v <= 0.0 {
                return Err(format!("{name} must be positive, got {v}"));
            }
        }
        if self.requests_per_minute == 0 {
            return Err("requests_per_minute must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(PollerConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut cfg = PollerConfig::default();
        cfg.tier2_threshold_usd = 20_000_000.0;
        assert!(cfg.validate().is_err());
    }
}
