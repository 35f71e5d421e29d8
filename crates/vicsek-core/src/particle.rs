use crate::config::{LeaderConfig, ModelConfig};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleKind {
    Follower,
    Leader,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub position: [f64; 2],
    /// Heading in `[0, 2*pi)`.
    pub heading: f64,
    pub speed: f64,
    /// Radius used when this particle looks for its own neighbors.
    pub radius: f64,
    /// Contribution of this particle's heading to its neighbors' averages.
    pub weight: f64,
    pub mobile: bool,
    /// Prescribed turning rate; replaces alignment and noise when set.
    pub angular_velocity: Option<f64>,
    /// Noise width overriding the model-wide value.
    pub noise: Option<f64>,
    pub kind: ParticleKind,
}

impl Particle {
    pub fn follower(position: [f64; 2], heading: f64, config: &ModelConfig) -> Self {
        Self {
            position,
            heading,
            speed: config.speed,
            radius: config.radius,
            weight: 1.0,
            mobile: true,
            angular_velocity: None,
            noise: None,
            kind: ParticleKind::Follower,
        }
    }

    pub fn leader(position: [f64; 2], heading: f64, leader: &LeaderConfig) -> Self {
        Self {
            position,
            heading,
            speed: leader.speed,
            radius: leader.radius,
            weight: leader.weight,
            mobile: leader.mobile,
            angular_velocity: leader.angular_velocity,
            noise: leader.noise,
            kind: ParticleKind::Leader,
        }
    }

    /// Unit vector of the current heading.
    pub fn direction(&self) -> [f64; 2] {
        let (sin, cos) = self.heading.sin_cos();
        [cos, sin]
    }

    pub fn is_leader(&self) -> bool {
        self.kind == ParticleKind::Leader
    }
}

/// Read-only copy of a replica's observable state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Steps taken since construction or the last reset.
    pub step: usize,
    pub positions: Vec<[f64; 2]>,
    pub headings: Vec<f64>,
    pub order_parameter: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn follower_takes_model_parameters() {
        let config = ModelConfig {
            speed: 0.7,
            radius: 2.5,
            ..ModelConfig::default()
        };
        let p = Particle::follower([1.0, 2.0], 0.5, &config);
        assert_eq!(p.speed, 0.7);
        assert_eq!(p.radius, 2.5);
        assert_eq!(p.weight, 1.0);
        assert!(p.mobile);
        assert_eq!(p.noise, None);
        assert!(!p.is_leader());
    }

    #[test]
    fn leader_takes_its_own_parameters() {
        let leader = LeaderConfig {
            radius: 4.0,
            weight: 9.0,
            mobile: false,
            angular_velocity: Some(0.1),
            noise: Some(0.0),
            ..LeaderConfig::default()
        };
        let p = Particle::leader([0.0, 0.0], 0.0, &leader);
        assert_eq!(p.noise, Some(0.0));
        assert_eq!(p.radius, 4.0);
        assert_eq!(p.weight, 9.0);
        assert!(!p.mobile);
        assert_eq!(p.angular_velocity, Some(0.1));
        assert!(p.is_leader());
    }

    #[test]
    fn direction_is_unit_vector_of_heading() {
        let p = Particle::follower([0.0, 0.0], FRAC_PI_2, &ModelConfig::default());
        let [x, y] = p.direction();
        assert!(x.abs() < 1e-12);
        assert!((y - 1.0).abs() < 1e-12);
    }
}
