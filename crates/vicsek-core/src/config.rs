use crate::schedule::NoiseSchedule;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Strategy used to discover neighbors within each particle's radius.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSearch {
    /// All-pairs distance checks. Reference implementation.
    AllPairs,
    /// Uniform periodic cell grid with cell side at least the base radius.
    #[default]
    CellGrid,
    /// R*-tree envelope queries with periodic image windows.
    RTree,
}

/// Attributes of one leader particle. Leaders occupy the lowest particle indices.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LeaderConfig {
    /// Fixed initial position; drawn uniformly when absent.
    pub position: Option<[f64; 2]>,
    /// Fixed initial heading in radians; drawn uniformly when absent.
    pub heading: Option<f64>,
    /// Radius this leader uses when looking for its own neighbors.
    pub radius: f64,
    /// Weight of this leader's heading in its neighbors' averages.
    pub weight: f64,
    /// Speed of this leader.
    pub speed: f64,
    /// Frozen leaders never move or turn but still influence others.
    pub mobile: bool,
    /// Prescribed turning rate (rad per unit time). Overrides alignment and noise.
    pub angular_velocity: Option<f64>,
    /// Own noise width in [0, 2*pi]; follows the model noise when absent.
    pub noise: Option<f64>,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            position: None,
            heading: None,
            radius: 1.5,
            weight: 9.0,
            speed: 1.0,
            mobile: true,
            angular_velocity: None,
            noise: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Deterministic seed for reproducible runs of a standalone model.
    pub seed: u64,
    /// Side length of the square periodic domain.
    pub length: f64,
    /// Particles per unit area. Used only when `particle_count` is absent.
    pub density: f64,
    /// Explicit particle count overriding `floor(density * length^2)`.
    pub particle_count: Option<usize>,
    /// Speed of every non-leader particle.
    pub speed: f64,
    /// Interaction radius of every non-leader particle.
    pub radius: f64,
    /// Width of the uniform heading noise, in [0, 2*pi].
    pub noise: f64,
    /// Integration timestep.
    pub dt: f64,
    pub neighbor_search: NeighborSearch,
    pub leaders: Vec<LeaderConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            length: 10.0,
            density: 1.0,
            particle_count: None,
            speed: 0.3,
            radius: 1.0,
            noise: 1.0,
            dt: 1.0,
            neighbor_search: NeighborSearch::CellGrid,
            leaders: Vec::new(),
        }
    }
}

/// Parameters of an ensemble run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnsemblePlan {
    /// Number of independent replicas.
    pub replicas: usize,
    /// Steps recorded per replica.
    pub steps: usize,
    /// Leading steps excluded from time-averaged summary statistics.
    pub burn_in: usize,
    /// Base seed from which each replica's stream is derived.
    pub seed: u64,
    /// Optional noise schedule overriding the model's constant noise.
    pub schedule: Option<NoiseSchedule>,
}

impl Default for EnsemblePlan {
    fn default() -> Self {
        Self {
            replicas: 10,
            steps: 500,
            burn_in: 100,
            seed: 42,
            schedule: None,
        }
    }
}

/// Top-level experiment description: one model and one ensemble plan.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExperimentConfig {
    pub model: ModelConfig,
    pub ensemble: EnsemblePlan,
}

macro_rules! define_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum ConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for ConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_config_error! {
    InvalidLength => "length must be positive and finite";
    LengthTooLarge { max: f64, actual: f64 } => "length ({actual}) exceeds supported maximum ({max})";
    InvalidDensity => "density must be positive and finite";
    InvalidParticleCount => "particle count must be greater than 0";
    TooManyParticles { max: usize, actual: usize } => "Too many particles: {} > max {}", actual, max;
    InvalidSpeed => "speed must be non-negative and finite";
    InvalidRadius => "radius must be positive and finite";
    InvalidNoise => "noise must be finite and within [0, 2*pi]";
    InvalidDt => "dt must be positive and finite";
    TooManyLeaders { particles: usize, leaders: usize } => "{leaders} leaders do not fit in {particles} particles";
    InvalidLeaderRadius { index: usize } => "leader {index}: radius must be positive and finite";
    InvalidLeaderWeight { index: usize } => "leader {index}: weight must be non-negative and finite";
    InvalidLeaderSpeed { index: usize } => "leader {index}: speed must be non-negative and finite";
    InvalidLeaderPosition { index: usize } => "leader {index}: position must lie inside [0, length)^2";
    InvalidLeaderHeading { index: usize } => "leader {index}: heading must be finite";
    InvalidLeaderAngularVelocity { index: usize } => "leader {index}: angular_velocity must be finite";
    InvalidLeaderNoise { index: usize } => "leader {index}: noise must be finite and within [0, 2*pi]";
    InvalidScheduleNoise => "schedule noise values must be finite and within [0, 2*pi]";
    InvalidSchedulePeriod => "schedule period must be positive and finite";
    InvalidScheduleLevels => "stepped schedule needs at least one level and one step per level";
}

impl std::error::Error for ConfigError {}

pub(crate) fn is_valid_noise(noise: f64) -> bool {
    noise.is_finite() && (0.0..=TAU).contains(&noise)
}

impl ModelConfig {
    pub const MAX_DOMAIN_LENGTH: f64 = crate::constants::MAX_DOMAIN_LENGTH;

    pub const MAX_PARTICLES: usize = crate::constants::MAX_PARTICLES;

    /// Number of particles this configuration describes, leaders included.
    pub fn particle_count(&self) -> Result<usize, ConfigError> {
        let count = match self.particle_count {
            Some(count) => count,
            None => {
                if !(self.density.is_finite() && self.density > 0.0) {
                    return Err(ConfigError::InvalidDensity);
                }
                let estimate = (self.density * self.length * self.length).floor();
                if estimate > Self::MAX_PARTICLES as f64 {
                    return Err(ConfigError::TooManyParticles {
                        max: Self::MAX_PARTICLES,
                        actual: estimate.min(usize::MAX as f64) as usize,
                    });
                }
                estimate as usize
            }
        };
        if count == 0 {
            return Err(ConfigError::InvalidParticleCount);
        }
        if count > Self::MAX_PARTICLES {
            return Err(ConfigError::TooManyParticles {
                max: Self::MAX_PARTICLES,
                actual: count,
            });
        }
        Ok(count)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_domain()?;
        let particles = self.particle_count()?;
        self.validate_dynamics()?;
        self.validate_leaders(particles)?;
        Ok(())
    }

    fn validate_domain(&self) -> Result<(), ConfigError> {
        if !(self.length.is_finite() && self.length > 0.0) {
            return Err(ConfigError::InvalidLength);
        }
        if self.length > Self::MAX_DOMAIN_LENGTH {
            return Err(ConfigError::LengthTooLarge {
                max: Self::MAX_DOMAIN_LENGTH,
                actual: self.length,
            });
        }
        Ok(())
    }

    fn validate_dynamics(&self) -> Result<(), ConfigError> {
        if !(self.speed.is_finite() && self.speed >= 0.0) {
            return Err(ConfigError::InvalidSpeed);
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ConfigError::InvalidRadius);
        }
        if !is_valid_noise(self.noise) {
            return Err(ConfigError::InvalidNoise);
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::InvalidDt);
        }
        Ok(())
    }

    fn validate_leaders(&self, particles: usize) -> Result<(), ConfigError> {
        if self.leaders.len() > particles {
            return Err(ConfigError::TooManyLeaders {
                particles,
                leaders: self.leaders.len(),
            });
        }
        for (index, leader) in self.leaders.iter().enumerate() {
            if !(leader.radius.is_finite() && leader.radius > 0.0) {
                return Err(ConfigError::InvalidLeaderRadius { index });
            }
            if !(leader.weight.is_finite() && leader.weight >= 0.0) {
                return Err(ConfigError::InvalidLeaderWeight { index });
            }
            if !(leader.speed.is_finite() && leader.speed >= 0.0) {
                return Err(ConfigError::InvalidLeaderSpeed { index });
            }
            if let Some([x, y]) = leader.position {
                let inside = |c: f64| c.is_finite() && (0.0..self.length).contains(&c);
                if !(inside(x) && inside(y)) {
                    return Err(ConfigError::InvalidLeaderPosition { index });
                }
            }
            if leader.heading.is_some_and(|h| !h.is_finite()) {
                return Err(ConfigError::InvalidLeaderHeading { index });
            }
            if leader.angular_velocity.is_some_and(|w| !w.is_finite()) {
                return Err(ConfigError::InvalidLeaderAngularVelocity { index });
            }
            if leader.noise.is_some_and(|eta| !is_valid_noise(eta)) {
                return Err(ConfigError::InvalidLeaderNoise { index });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_default() {
        assert!(ModelConfig::default().validate().is_ok());
        assert!(ExperimentConfig::default().model.validate().is_ok());
    }

    #[test]
    fn particle_count_follows_density() {
        let config = ModelConfig {
            length: 10.0,
            density: 0.55,
            ..ModelConfig::default()
        };
        assert_eq!(config.particle_count(), Ok(55));

        let config = ModelConfig {
            particle_count: Some(7),
            density: -1.0,
            ..ModelConfig::default()
        };
        assert_eq!(config.particle_count(), Ok(7));
    }

    #[test]
    fn validate_rejects_invalid_domain() {
        let config = ModelConfig {
            length: 0.0,
            ..ModelConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidLength));

        let config = ModelConfig {
            length: f64::NAN,
            ..ModelConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidLength));

        let config = ModelConfig {
            length: ModelConfig::MAX_DOMAIN_LENGTH + 1.0,
            particle_count: Some(1),
            ..ModelConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LengthTooLarge { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_counts() {
        let config = ModelConfig {
            density: 0.0,
            ..ModelConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidDensity));

        let config = ModelConfig {
            density: 0.001,
            ..ModelConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidParticleCount));

        let config = ModelConfig {
            particle_count: Some(0),
            ..ModelConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidParticleCount));

        let config = ModelConfig {
            particle_count: Some(ModelConfig::MAX_PARTICLES + 1),
            ..ModelConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyParticles { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_dynamics() {
        let cases = [
            (
                ModelConfig {
                    radius: 0.0,
                    ..ModelConfig::default()
                },
                ConfigError::InvalidRadius,
            ),
            (
                ModelConfig {
                    noise: TAU + 0.01,
                    ..ModelConfig::default()
                },
                ConfigError::InvalidNoise,
            ),
            (
                ModelConfig {
                    noise: -0.1,
                    ..ModelConfig::default()
                },
                ConfigError::InvalidNoise,
            ),
            (
                ModelConfig {
                    speed: -1.0,
                    ..ModelConfig::default()
                },
                ConfigError::InvalidSpeed,
            ),
            (
                ModelConfig {
                    dt: 0.0,
                    ..ModelConfig::default()
                },
                ConfigError::InvalidDt,
            ),
        ];
        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected));
        }
    }

    #[test]
    fn noise_bounds_are_inclusive() {
        for noise in [0.0, TAU] {
            let config = ModelConfig {
                noise,
                ..ModelConfig::default()
            };
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn validate_rejects_invalid_leaders() {
        let config = ModelConfig {
            particle_count: Some(1),
            leaders: vec![LeaderConfig::default(), LeaderConfig::default()],
            ..ModelConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooManyLeaders {
                particles: 1,
                leaders: 2
            })
        );

        let config = ModelConfig {
            leaders: vec![LeaderConfig {
                position: Some([10.0, 1.0]),
                ..LeaderConfig::default()
            }],
            ..ModelConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLeaderPosition { index: 0 })
        );

        let config = ModelConfig {
            leaders: vec![
                LeaderConfig::default(),
                LeaderConfig {
                    weight: -2.0,
                    ..LeaderConfig::default()
                },
            ],
            ..ModelConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLeaderWeight { index: 1 })
        );

        let config = ModelConfig {
            leaders: vec![LeaderConfig {
                noise: Some(7.0),
                ..LeaderConfig::default()
            }],
            ..ModelConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLeaderNoise { index: 0 })
        );
    }

    #[test]
    fn partial_json_deserializes_with_defaults() {
        let json = r#"{
            "length": 20.0,
            "density": 0.5,
            "noise": 2.0,
            "neighbor_search": "all_pairs",
            "leaders": [{ "weight": 4.0, "mobile": false }]
        }"#;
        let config: ModelConfig = serde_json::from_str(json).expect("partial config should parse");
        assert_eq!(config.neighbor_search, NeighborSearch::AllPairs);
        assert_eq!(config.dt, 1.0);
        assert_eq!(config.particle_count, None);
        assert_eq!(config.particle_count(), Ok(200));
        assert_eq!(config.leaders[0].weight, 4.0);
        assert!(!config.leaders[0].mobile);
        assert_eq!(config.leaders[0].radius, LeaderConfig::default().radius);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserialize_rejects_unknown_neighbor_search() {
        let json = r#"{ "neighbor_search": "octree" }"#;
        assert!(serde_json::from_str::<ModelConfig>(json).is_err());
    }

    #[test]
    fn experiment_config_round_trips_through_json() {
        let config = ExperimentConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: ExperimentConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }

    #[test]
    fn error_display_messages() {
        let cases = vec![
            (
                ConfigError::InvalidLength,
                "length must be positive and finite",
            ),
            (
                ConfigError::TooManyParticles {
                    max: 100,
                    actual: 200,
                },
                "Too many particles: 200 > max 100",
            ),
            (
                ConfigError::LengthTooLarge {
                    max: 4096.0,
                    actual: 5000.0,
                },
                "length (5000) exceeds supported maximum (4096)",
            ),
            (
                ConfigError::InvalidNoise,
                "noise must be finite and within [0, 2*pi]",
            ),
            (
                ConfigError::TooManyLeaders {
                    particles: 3,
                    leaders: 4,
                },
                "4 leaders do not fit in 3 particles",
            ),
            (
                ConfigError::InvalidLeaderRadius { index: 2 },
                "leader 2: radius must be positive and finite",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }
}
