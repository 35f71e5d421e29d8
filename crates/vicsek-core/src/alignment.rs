//! Alignment rule: weighted circular mean of neighbor headings plus uniform noise.
//!
//! These are free functions over arrays; the model composes them per step.

use crate::constants::DEGENERATE_RESULTANT_TOLERANCE;
use crate::geometry::wrap_angle;
use rand::Rng;

/// Running sum of weighted unit vectors.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeadingSum {
    pub cos: f64,
    pub sin: f64,
    pub weight: f64,
}

impl HeadingSum {
    pub fn add(&mut self, direction: [f64; 2], weight: f64) {
        self.cos += weight * direction[0];
        self.sin += weight * direction[1];
        self.weight += weight;
    }

    pub fn magnitude(&self) -> f64 {
        self.cos.hypot(self.sin)
    }

    /// Angle of the resultant in `[0, 2*pi)`, or `None` when the headings
    /// cancel (resultant within tolerance of zero, or no weight at all).
    pub fn angle(&self) -> Option<f64> {
        if self.weight <= 0.0 {
            return None;
        }
        if self.magnitude() <= DEGENERATE_RESULTANT_TOLERANCE * self.weight {
            return None;
        }
        Some(wrap_angle(self.sin.atan2(self.cos)))
    }
}

/// Weighted circular mean of the headings of `neighbors`.
///
/// `directions[j]` is the unit vector `(cos, sin)` of particle `j`'s heading.
pub fn circular_mean(neighbors: &[usize], directions: &[[f64; 2]], weights: &[f64]) -> Option<f64> {
    let mut sum = HeadingSum::default();
    for &j in neighbors {
        sum.add(directions[j], weights[j]);
    }
    sum.angle()
}

/// Uniform noise on `[-eta/2, eta/2)`.
pub fn noise_draw<R: Rng>(rng: &mut R, eta: f64) -> f64 {
    (rng.random::<f64>() - 0.5) * eta
}

/// Aligned heading plus noise, falling back to `previous` when the mean is undefined.
pub fn next_heading(previous: f64, mean: Option<f64>, xi: f64) -> f64 {
    wrap_angle(mean.unwrap_or(previous) + xi)
}
