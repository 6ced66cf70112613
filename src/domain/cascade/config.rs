/// Tunables for [`super::CascadeTracker`]. Acceleration thresholds (±0.005
/// %/s²) and the 10s exhaustion silence window are fixed by the state
/// machine itself; `idle_rate_threshold` is the one knob callers reasonably
/// vary per coin's baseline activity.
#[derive(Debug, Clone, Copy)]
pub struct CascadeConfig {
    /// |rate_5s| below this (in %/s) counts as "no active OI drop".
    pub idle_rate_threshold: f64,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            idle_rate_threshold: 0.05,
        }
    }
}

impl CascadeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.idle_rate_threshold <= 0.0 {
            return Err(format!(
                "idle_rate_threshold must be positive, got {}",
                self.idle_rate_threshold
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(CascadeConfig::default().validate().is_ok());
    }

    #[test]
    fn non_positive_threshold_rejected() {
        let cfg = CascadeConfig {
            idle_rate_threshold: 0.0,
        };
        assert!(cfg.validate().is_err());
    }
}
