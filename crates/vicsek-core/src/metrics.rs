use crate::particle::Snapshot;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderSample {
    pub step: usize,
    pub order_parameter: f64,
    pub noise: f64,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub steps: usize,
    pub sample_every: usize,
    pub samples: Vec<OrderSample>,
    /// Mean order parameter over the recorded samples.
    pub mean_order_parameter: f64,
    pub final_snapshot: Snapshot,
}

/// Wall-clock breakdown of one step, in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTimings {
    pub neighbor_us: u64,
    pub heading_us: u64,
    pub integration_us: u64,
    pub total_us: u64,
}

/// Time-averaged order statistics across the replicas of an ensemble.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderStatistics {
    pub replicas: usize,
    /// Steps per replica included in the time averages.
    pub samples_per_replica: usize,
    /// Mean over replicas of the time-averaged order parameter.
    pub mean: f64,
    /// Standard error of `mean`.
    pub std_error: f64,
    /// Sample variance of the per-replica time averages.
    pub variance: f64,
    /// `variance * L^2`.
    pub susceptibility: f64,
    /// `variance * sqrt(2 / (M - 1))`.
    pub variance_error: f64,
    /// `variance_error * L^2`.
    pub susceptibility_error: f64,
    /// `1 - <V^4> / (3 <V^2>^2)`; 0 when `<V^2>` vanishes.
    pub binder_cumulant: f64,
    /// First-order error of `binder_cumulant` from the replica spread of
    /// `<V^2>` and `<V^4>`, covariance included.
    pub binder_error: f64,
}

impl OrderStatistics {
    /// Statistics from per-replica time series (`series[r][t]`), all of equal length.
    pub fn from_series<S: AsRef<[f64]>>(series: &[S], length: f64) -> Self {
        let replicas = series.len();
        if replicas == 0 {
            return Self::default();
        }
        let samples_per_replica = series[0].as_ref().len();
        let time_mean = |values: &[f64], power: i32| -> f64 {
            if values.is_empty() {
                0.0
            } else {
                values.iter().map(|v| v.powi(power)).sum::<f64>() / values.len() as f64
            }
        };
        let v_means: Vec<f64> = series.iter().map(|s| time_mean(s.as_ref(), 1)).collect();
        let v2_means: Vec<f64> = series.iter().map(|s| time_mean(s.as_ref(), 2)).collect();
        let v4_means: Vec<f64> = series.iter().map(|s| time_mean(s.as_ref(), 4)).collect();

        let mean_of = |vals: &[f64]| -> f64 { vals.iter().sum::<f64>() / vals.len() as f64 };
        let mean = mean_of(&v_means);
        let variance = sample_variance(&v_means, mean);
        let v2 = mean_of(&v2_means);
        let v4 = mean_of(&v4_means);
        let (binder_cumulant, binder_error) = if v2 > 0.0 {
            let d_v4 = -1.0 / (3.0 * v2 * v2);
            let d_v2 = 2.0 * v4 / (3.0 * v2 * v2 * v2);
            let spread = d_v4 * d_v4 * sample_variance(&v4_means, v4)
                + d_v2 * d_v2 * sample_variance(&v2_means, v2)
                + 2.0 * d_v4 * d_v2 * sample_covariance(&v4_means, v4, &v2_means, v2);
            (
                1.0 - v4 / (3.0 * v2 * v2),
                (spread.max(0.0) / replicas as f64).sqrt(),
            )
        } else {
            (0.0, 0.0)
        };
        let variance_error = if replicas > 1 {
            variance * (2.0 / (replicas - 1) as f64).sqrt()
        } else {
            0.0
        };

        Self {
            replicas,
            samples_per_replica,
            mean,
            std_error: (variance / replicas as f64).sqrt(),
            variance,
            susceptibility: variance * length * length,
            variance_error,
            susceptibility_error: variance_error * length * length,
            binder_cumulant,
            binder_error,
        }
    }
}

/// Variance with `n - 1` in the denominator; 0 for fewer than two values.
pub fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn sample_covariance(xs: &[f64], x_mean: f64, ys: &[f64], y_mean: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum::<f64>()
        / (xs.len() - 1) as f64
}
