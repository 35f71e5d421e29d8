//! Parameter scans: one ensemble per value of a single model parameter.

use crate::config::{EnsemblePlan, ModelConfig};
use crate::ensemble::{run_ensemble, EnsembleError};
use crate::metrics::OrderStatistics;
use crate::model::ModelError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanParameter {
    Noise,
    /// Density at fixed length; clears any explicit particle count.
    Density,
    Radius,
    Speed,
    /// Particle count at fixed density; the length follows as `sqrt(N / density)`.
    ParticleCount,
}

impl ScanParameter {
    /// `base` with this parameter set to `value`.
    pub fn apply(self, base: &ModelConfig, value: f64) -> ModelConfig {
        let mut config = base.clone();
        match self {
            ScanParameter::Noise => config.noise = value,
            ScanParameter::Density => {
                config.density = value;
                config.particle_count = None;
            }
            ScanParameter::Radius => config.radius = value,
            ScanParameter::Speed => config.speed = value,
            ScanParameter::ParticleCount => {
                let count = if value.is_finite() && value >= 0.0 {
                    value.round() as usize
                } else {
                    0
                };
                config.particle_count = Some(count);
                config.length = (count as f64 / config.density).sqrt();
            }
        }
        config
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    pub value: f64,
    pub statistics: OrderStatistics,
}

/// Run `plan` once per entry of `values`. Every configuration is validated
/// before the first ensemble starts.
pub fn parameter_scan(
    base: &ModelConfig,
    parameter: ScanParameter,
    values: &[f64],
    plan: &EnsemblePlan,
) -> Result<Vec<ScanPoint>, EnsembleError> {
    let configs: Vec<ModelConfig> = values
        .iter()
        .map(|&value| parameter.apply(base, value))
        .collect();
    for config in &configs {
        config.validate().map_err(ModelError::from)?;
    }

    let mut points = Vec::with_capacity(values.len());
    for (config, &value) in configs.iter().zip(values) {
        let run = run_ensemble(config, plan)?;
        let statistics = run.summary(plan.burn_in)?;
        debug!(?parameter, value, mean = statistics.mean, "scan point done");
        points.push(ScanPoint { value, statistics });
    }
    info!(?parameter, points = points.len(), "parameter scan complete");
    Ok(points)
}

/// `num` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let last = (num - 1) as f64;
            (0..num)
                .map(|i| {
                    if i == num - 1 {
                        stop
                    } else {
                        start + (stop - start) * i as f64 / last
                    }
                })
                .collect()
        }
    }
}
