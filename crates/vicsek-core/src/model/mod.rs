use crate::config::{is_valid_noise, ConfigError, ModelConfig};
use crate::geometry::{wrap_angle, Domain};
use crate::metrics::{OrderSample, RunSummary, StepTimings};
use crate::order::weighted_order_parameter;
use crate::particle::{Particle, Snapshot};
use crate::rng::{create_rng, derive_replica_rng};
use crate::spatial::{NeighborFinder, NeighborLists};
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use std::f64::consts::TAU;
use std::time::Instant;
use std::{error::Error, fmt};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    Config(ConfigError),
    ParticleCountMismatch { expected: usize, actual: usize },
    PositionOutOfDomain { index: usize },
    NonFiniteHeading { index: usize },
    NonFiniteState { step: usize, index: usize },
    InvalidSampleEvery,
    InvalidThreshold,
    TooManySteps { max: usize, actual: usize },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Config(e) => write!(f, "{}", e),
            ModelError::ParticleCountMismatch { expected, actual } => write!(
                f,
                "initial state has {actual} particles but the configuration describes {expected}"
            ),
            ModelError::PositionOutOfDomain { index } => {
                write!(f, "particle {index}: position must lie inside [0, length)^2")
            }
            ModelError::NonFiniteHeading { index } => {
                write!(f, "particle {index}: heading must be finite")
            }
            ModelError::NonFiniteState { step, index } => write!(
                f,
                "non-finite position or heading for particle {index} at step {step}"
            ),
            ModelError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            ModelError::InvalidThreshold => {
                write!(f, "order threshold must be finite and within [0, 1]")
            }
            ModelError::TooManySteps { max, actual } => {
                write!(f, "steps ({actual}) exceed supported maximum ({max})")
            }
        }
    }
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Config(err)
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelError::Config(e) => Some(e),
            _ => None,
        }
    }
}

/// A single Vicsek replica: particles on a periodic square, aligned synchronously.
pub struct VicsekModel {
    config: ModelConfig,
    domain: Domain,
    particles: Vec<Particle>,
    rng: ChaCha12Rng,
    /// Current noise width; starts at `config.noise`, changed by `set_noise`.
    noise: f64,
    step_index: usize,
    finder: NeighborFinder,
    last_timings: StepTimings,

    // Per-step scratch, reused across steps.
    neighbors: NeighborLists,
    positions_buffer: Vec<[f64; 2]>,
    radii: Vec<f64>,
    weights: Vec<f64>,
    directions_buffer: Vec<[f64; 2]>,
    headings_buffer: Vec<f64>,
    next_positions_buffer: Vec<[f64; 2]>,
}

impl fmt::Debug for VicsekModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VicsekModel")
            .field("particles", &self.particles.len())
            .field("length", &self.domain.length())
            .field("noise", &self.noise)
            .field("step", &self.step_index)
            .finish()
    }
}

impl VicsekModel {
    pub const MAX_EXPERIMENT_STEPS: usize = crate::constants::MAX_ENSEMBLE_STEPS;

    /// Random initial state drawn from `config.seed`.
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let rng = create_rng(config.seed);
        Self::with_rng(config, rng)
    }

    /// Replica `replica` of an ensemble seeded with `seed`.
    pub fn for_replica(config: ModelConfig, seed: u64, replica: usize) -> Result<Self, ModelError> {
        Self::with_rng(config, derive_replica_rng(seed, replica))
    }

    /// Random initial state drawn from a caller-supplied generator.
    pub fn with_rng(config: ModelConfig, rng: ChaCha12Rng) -> Result<Self, ModelError> {
        config.validate()?;
        let count = config.particle_count()?;
        let mut model = Self::empty(config, rng, count);
        model.populate();
        debug!(
            particles = model.particles.len(),
            length = model.domain.length(),
            noise = model.noise,
            "initialized model"
        );
        Ok(model)
    }

    /// Explicit initial state. Leaders take indices `0..leaders.len()` and keep
    /// their configured attributes, but positions and headings come from the caller.
    pub fn with_state(
        config: ModelConfig,
        positions: Vec<[f64; 2]>,
        headings: Vec<f64>,
    ) -> Result<Self, ModelError> {
        config.validate()?;
        let count = config.particle_count()?;
        for actual in [positions.len(), headings.len()] {
            if actual != count {
                return Err(ModelError::ParticleCountMismatch {
                    expected: count,
                    actual,
                });
            }
        }
        let domain = Domain::new(config.length);
        if let Some(index) = positions.iter().position(|&p| !domain.contains(p)) {
            return Err(ModelError::PositionOutOfDomain { index });
        }
        if let Some(index) = headings.iter().position(|h| !h.is_finite()) {
            return Err(ModelError::NonFiniteHeading { index });
        }

        let rng = create_rng(config.seed);
        let mut model = Self::empty(config, rng, count);
        model.particles = positions
            .into_iter()
            .zip(headings)
            .enumerate()
            .map(|(i, (position, heading))| model.make_particle(i, position, wrap_angle(heading)))
            .collect();
        model.cache_particle_constants();
        Ok(model)
    }

    fn empty(config: ModelConfig, rng: ChaCha12Rng, count: usize) -> Self {
        Self {
            domain: Domain::new(config.length),
            noise: config.noise,
            finder: NeighborFinder::new(config.neighbor_search),
            particles: Vec::with_capacity(count),
            rng,
            step_index: 0,
            last_timings: StepTimings::default(),
            neighbors: NeighborLists::new(),
            positions_buffer: Vec::with_capacity(count),
            radii: Vec::with_capacity(count),
            weights: Vec::with_capacity(count),
            directions_buffer: Vec::with_capacity(count),
            headings_buffer: Vec::with_capacity(count),
            next_positions_buffer: Vec::with_capacity(count),
            config,
        }
    }

    fn make_particle(&self, index: usize, position: [f64; 2], heading: f64) -> Particle {
        match self.config.leaders.get(index) {
            Some(leader) => Particle::leader(position, heading, leader),
            None => Particle::follower(position, heading, &self.config),
        }
    }

    /// Draw every particle from the current random stream. Each particle
    /// consumes three draws (x, y, heading) even when a leader pins them.
    fn populate(&mut self) {
        // The count was validated at construction.
        let count = self.config.particle_count().unwrap_or(0);
        let length = self.domain.length();
        let mut particles = Vec::with_capacity(count);
        for index in 0..count {
            let drawn = [
                self.rng.random::<f64>() * length,
                self.rng.random::<f64>() * length,
            ];
            let heading = wrap_angle(self.rng.random::<f64>() * TAU);
            let (position, heading) = match self.config.leaders.get(index) {
                Some(leader) => (
                    leader.position.unwrap_or(drawn),
                    leader.heading.map(wrap_angle).unwrap_or(heading),
                ),
                None => (drawn, heading),
            };
            particles.push(self.make_particle(index, self.domain.wrap(position), heading));
        }
        self.particles = particles;
        self.cache_particle_constants();
    }

    fn cache_particle_constants(&mut self) {
        self.radii.clear();
        self.radii.extend(self.particles.iter().map(|p| p.radius));
        self.weights.clear();
        self.weights.extend(self.particles.iter().map(|p| p.weight));
    }

    /// Fresh random configuration with the same parameters, drawn from the
    /// continuing random stream. Restores the configured noise.
    pub fn reset(&mut self) {
        self.step_index = 0;
        self.noise = self.config.noise;
        self.last_timings = StepTimings::default();
        self.populate();
        debug!(particles = self.particles.len(), "reset model");
    }

    /// Like [`VicsekModel::reset`], restarting the random stream from `seed`.
    pub fn reset_with_seed(&mut self, seed: u64) {
        self.rng = create_rng(seed);
        self.reset();
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }

    /// Change the noise width used by subsequent steps.
    pub fn set_noise(&mut self, noise: f64) -> Result<(), ModelError> {
        if !is_valid_noise(noise) {
            return Err(ModelError::Config(ConfigError::InvalidNoise));
        }
        self.noise = noise;
        Ok(())
    }

    pub fn current_step(&self) -> usize {
        self.step_index
    }

    pub fn last_timings(&self) -> StepTimings {
        self.last_timings
    }

    /// Neighbor sets computed by the most recent step.
    pub fn neighbor_lists(&self) -> &NeighborLists {
        &self.neighbors
    }

    pub fn positions(&self) -> Vec<[f64; 2]> {
        self.particles.iter().map(|p| p.position).collect()
    }

    pub fn headings(&self) -> Vec<f64> {
        self.particles.iter().map(|p| p.heading).collect()
    }

    pub fn order_parameter(&self) -> f64 {
        weighted_order_parameter(
            self.particles
                .iter()
                .map(|p| p.heading)
                .zip(self.weights.iter().copied()),
        )
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            step: self.step_index,
            positions: self.positions(),
            headings: self.headings(),
            order_parameter: self.order_parameter(),
        }
    }

    /// Advance one synchronous step.
    ///
    /// Every new heading and position is computed from the pre-step state and
    /// checked before any of it is committed; on a non-finite result the model
    /// is left exactly as it was.
    pub fn step(&mut self) -> Result<(), ModelError> {
        let total_start = Instant::now();

        let t0 = Instant::now();
        self.step_neighbor_phase();
        let neighbor_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        self.step_heading_phase();
        let heading_us = t1.elapsed().as_micros() as u64;

        let t2 = Instant::now();
        self.step_integration_phase();
        let step = self.step_index + 1;
        if let Some(index) = self.first_non_finite() {
            warn!(step, index, "non-finite particle state, step discarded");
            return Err(ModelError::NonFiniteState { step, index });
        }
        self.commit_step();
        let integration_us = t2.elapsed().as_micros() as u64;

        self.step_index = step;
        self.last_timings = StepTimings {
            neighbor_us,
            heading_us,
            integration_us,
            total_us: total_start.elapsed().as_micros() as u64,
        };
        Ok(())
    }

    /// Take `steps` steps, stopping at the first failure.
    pub fn advance(&mut self, steps: usize) -> Result<(), ModelError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Run `steps` steps, sampling the order parameter every `sample_every`
    /// steps and after the last one.
    pub fn run_experiment(
        &mut self,
        steps: usize,
        sample_every: usize,
    ) -> Result<RunSummary, ModelError> {
        if sample_every == 0 {
            return Err(ModelError::InvalidSampleEvery);
        }
        if steps > Self::MAX_EXPERIMENT_STEPS {
            return Err(ModelError::TooManySteps {
                max: Self::MAX_EXPERIMENT_STEPS,
                actual: steps,
            });
        }
        let estimated_samples = if steps == 0 {
            0
        } else {
            ((steps - 1) / sample_every) + 1
        };
        let mut samples = Vec::with_capacity(estimated_samples);
        for step in 1..=steps {
            self.step()?;
            if step % sample_every == 0 || step == steps {
                samples.push(OrderSample {
                    step: self.step_index,
                    order_parameter: self.order_parameter(),
                    noise: self.noise,
                });
            }
        }
        let mean_order_parameter = if samples.is_empty() {
            self.order_parameter()
        } else {
            samples.iter().map(|s| s.order_parameter).sum::<f64>() / samples.len() as f64
        };
        Ok(RunSummary {
            schema_version: 1,
            steps,
            sample_every,
            samples,
            mean_order_parameter,
            final_snapshot: self.snapshot(),
        })
    }

    /// Steps until the order parameter first reaches `threshold`, or `None`
    /// if it has not after `max_steps` steps. Counts from the current state
    /// and always takes at least one step before testing.
    pub fn steps_to_order(
        &mut self,
        threshold: f64,
        max_steps: usize,
    ) -> Result<Option<usize>, ModelError> {
        if !(threshold.is_finite() && (0.0..=1.0).contains(&threshold)) {
            return Err(ModelError::InvalidThreshold);
        }
        for taken in 1..=max_steps {
            self.step()?;
            if self.order_parameter() >= threshold {
                return Ok(Some(taken));
            }
        }
        Ok(None)
    }
}

mod phases;
