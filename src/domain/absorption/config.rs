/// Tunables for [`super::AbsorptionTracker`]. The signal thresholds (70th
/// percentile, 0.30 replenishment ratio, 0.5 aggressor-failure ratio, ±0.15
/// delta slope, 60th percentile sell-volume gate) are fixed by the spec;
/// `epsilon` is the only floor callers might reasonably override to avoid
/// division blowups on near-zero denominators.
#[derive(Debug, Clone, Copy)]
pub struct AbsorptionConfig {
    pub epsilon: f64,
}

impl Default for AbsorptionConfig {
    fn default() -> Self {
        Self { epsilon: 1e-9 }
    }
}

impl AbsorptionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.epsilon <= 0.0 {
            return Err(format!("epsilon must be positive, got {}", self.epsilon));
        }
        Ok(())
    }
}
