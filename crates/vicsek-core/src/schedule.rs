//! Noise schedules for annealing runs.

use crate::config::{is_valid_noise, ConfigError};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Noise as a function of the 0-based step index within a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoiseSchedule {
    Constant {
        noise: f64,
    },
    /// Linear ramp from `start` at the first step to `end` at the last step.
    Linear {
        start: f64,
        end: f64,
    },
    /// `levels` equally spaced values from `start` to `end`, each held for
    /// `steps_per_level` steps; the last value is held afterwards.
    Stepped {
        start: f64,
        end: f64,
        levels: usize,
        steps_per_level: usize,
    },
    /// `pi * (1 + cos(2 pi t / period))`: from 2*pi down to 0 and back.
    Cosine {
        period: f64,
    },
}

impl NoiseSchedule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            NoiseSchedule::Constant { noise } => {
                if !is_valid_noise(noise) {
                    return Err(ConfigError::InvalidScheduleNoise);
                }
            }
            NoiseSchedule::Linear { start, end } => {
                if !(is_valid_noise(start) && is_valid_noise(end)) {
                    return Err(ConfigError::InvalidScheduleNoise);
                }
            }
            NoiseSchedule::Stepped {
                start,
                end,
                levels,
                steps_per_level,
            } => {
                if !(is_valid_noise(start) && is_valid_noise(end)) {
                    return Err(ConfigError::InvalidScheduleNoise);
                }
                if levels == 0 || steps_per_level == 0 {
                    return Err(ConfigError::InvalidScheduleLevels);
                }
            }
            NoiseSchedule::Cosine { period } => {
                if !(period.is_finite() && period > 0.0) {
                    return Err(ConfigError::InvalidSchedulePeriod);
                }
            }
        }
        Ok(())
    }

    /// Noise for step `step` of a run of `total_steps` steps, clamped to `[0, 2*pi]`.
    pub fn noise_at(&self, step: usize, total_steps: usize) -> f64 {
        let noise = match *self {
            NoiseSchedule::Constant { noise } => noise,
            NoiseSchedule::Linear { start, end } => {
                if total_steps <= 1 {
                    start
                } else {
                    let last = total_steps - 1;
                    let t = step.min(last) as f64 / last as f64;
                    start + (end - start) * t
                }
            }
            NoiseSchedule::Stepped {
                start,
                end,
                levels,
                steps_per_level,
            } => {
                if levels <= 1 || steps_per_level == 0 {
                    start
                } else {
                    let level = (step / steps_per_level).min(levels - 1);
                    start + (end - start) * level as f64 / (levels - 1) as f64
                }
            }
            NoiseSchedule::Cosine { period } => {
                let phase = TAU * step as f64 / period;
                PI * (1.0 + phase.cos())
            }
        };
        noise.clamp(0.0, TAU)
    }
}
