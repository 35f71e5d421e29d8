//! Independent replicas advanced in lock-step, with order-parameter statistics.

use crate::config::{ConfigError, EnsemblePlan, ModelConfig};
use crate::constants::{MAX_ENSEMBLE_STEPS, MAX_REPLICAS};
use crate::metrics::{sample_variance, OrderStatistics};
use crate::model::{ModelError, VicsekModel};
use crate::schedule::NoiseSchedule;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{error::Error, fmt};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum EnsembleError {
    InvalidReplicaCount { max: usize, actual: usize },
    InvalidStepCount,
    TooManySteps { max: usize, actual: usize },
    InvalidBurnIn { burn_in: usize, steps: usize },
    Schedule(ConfigError),
    Model(ModelError),
    Cancelled { completed_steps: usize },
}

impl fmt::Display for EnsembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsembleError::InvalidReplicaCount { max, actual } => {
                write!(f, "replica count ({actual}) must be within 1..={max}")
            }
            EnsembleError::InvalidStepCount => write!(f, "steps must be positive"),
            EnsembleError::TooManySteps { max, actual } => {
                write!(f, "steps ({actual}) exceed supported maximum ({max})")
            }
            EnsembleError::InvalidBurnIn { burn_in, steps } => {
                write!(f, "burn_in ({burn_in}) must be less than steps ({steps})")
            }
            EnsembleError::Schedule(e) => write!(f, "invalid noise schedule: {}", e),
            EnsembleError::Model(e) => write!(f, "{}", e),
            EnsembleError::Cancelled { completed_steps } => {
                write!(f, "ensemble cancelled after {completed_steps} steps")
            }
        }
    }
}

impl From<ModelError> for EnsembleError {
    fn from(err: ModelError) -> Self {
        EnsembleError::Model(err)
    }
}

impl Error for EnsembleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EnsembleError::Schedule(e) => Some(e),
            EnsembleError::Model(e) => Some(e),
            _ => None,
        }
    }
}

/// Shared stop request, checked between steps.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Recorded order parameter of every replica at every step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnsembleRun {
    pub length: f64,
    /// `order[r][t]`: order parameter of replica `r` after step `t + 1`.
    pub order: Vec<Vec<f64>>,
    /// Noise used at each step.
    pub noise: Vec<f64>,
    /// Per-step mean across replicas.
    pub mean: Vec<f64>,
    /// Per-step sample variance across replicas (0 for a single replica).
    pub variance: Vec<f64>,
}

impl EnsembleRun {
    fn from_records(length: f64, order: Vec<Vec<f64>>, noise: Vec<f64>) -> Self {
        let steps = noise.len();
        let replicas = order.len().max(1) as f64;
        let mut mean = Vec::with_capacity(steps);
        let mut variance = Vec::with_capacity(steps);
        let mut column = Vec::with_capacity(order.len());
        for t in 0..steps {
            column.clear();
            column.extend(order.iter().map(|series| series[t]));
            let m = column.iter().sum::<f64>() / replicas;
            mean.push(m);
            variance.push(sample_variance(&column, m));
        }
        Self {
            length,
            order,
            noise,
            mean,
            variance,
        }
    }

    pub fn replicas(&self) -> usize {
        self.order.len()
    }

    pub fn steps(&self) -> usize {
        self.noise.len()
    }

    pub fn replica(&self, index: usize) -> Option<&[f64]> {
        self.order.get(index).map(Vec::as_slice)
    }

    /// Time-averaged statistics over steps `burn_in..`.
    pub fn summary(&self, burn_in: usize) -> Result<OrderStatistics, EnsembleError> {
        if burn_in >= self.steps() {
            return Err(EnsembleError::InvalidBurnIn {
                burn_in,
                steps: self.steps(),
            });
        }
        let series: Vec<&[f64]> = self.order.iter().map(|s| &s[burn_in..]).collect();
        Ok(OrderStatistics::from_series(&series, self.length))
    }
}

fn validate_replicas(replicas: usize) -> Result<(), EnsembleError> {
    if replicas == 0 || replicas > MAX_REPLICAS {
        return Err(EnsembleError::InvalidReplicaCount {
            max: MAX_REPLICAS,
            actual: replicas,
        });
    }
    Ok(())
}

fn validate_steps(steps: usize) -> Result<(), EnsembleError> {
    if steps == 0 {
        return Err(EnsembleError::InvalidStepCount);
    }
    if steps > MAX_ENSEMBLE_STEPS {
        return Err(EnsembleError::TooManySteps {
            max: MAX_ENSEMBLE_STEPS,
            actual: steps,
        });
    }
    Ok(())
}

/// Replicas of one model configuration, each on its own random stream.
///
/// Replica `r` draws from stream `r` of `seed`, so its trajectory is the same
/// whatever the ensemble size and whether or not replicas run in parallel.
#[derive(Debug)]
pub struct Ensemble {
    config: ModelConfig,
    seed: u64,
    models: Vec<VicsekModel>,
    order: Vec<Vec<f64>>,
    noise: Vec<f64>,
}

impl Ensemble {
    pub fn new(config: ModelConfig, replicas: usize, seed: u64) -> Result<Self, EnsembleError> {
        validate_replicas(replicas)?;
        config.validate().map_err(ModelError::from)?;

        #[cfg(feature = "parallel")]
        let models = (0..replicas)
            .into_par_iter()
            .map(|r| VicsekModel::for_replica(config.clone(), seed, r))
            .collect::<Result<Vec<_>, _>>()?;
        #[cfg(not(feature = "parallel"))]
        let models = (0..replicas)
            .map(|r| VicsekModel::for_replica(config.clone(), seed, r))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(replicas, seed, "initialized ensemble");
        Ok(Self {
            config,
            seed,
            models,
            order: vec![Vec::new(); replicas],
            noise: Vec::new(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn replicas(&self) -> usize {
        self.models.len()
    }

    pub fn models(&self) -> &[VicsekModel] {
        &self.models
    }

    /// Steps recorded so far for every replica.
    pub fn steps_recorded(&self) -> usize {
        self.noise.len()
    }

    /// Advance every replica `steps` steps, appending to the recorded series.
    ///
    /// With a schedule, step `t` of this call uses `schedule.noise_at(t, steps)`
    /// for all replicas. Cancellation is honoured between steps; the steps
    /// completed before it stay recorded. A model failure aborts the call and
    /// leaves the models in an unspecified state.
    pub fn advance(
        &mut self,
        steps: usize,
        schedule: Option<&NoiseSchedule>,
        cancel: Option<&CancelFlag>,
    ) -> Result<(), EnsembleError> {
        validate_steps(steps)?;
        let total = self.steps_recorded().saturating_add(steps);
        if total > MAX_ENSEMBLE_STEPS {
            return Err(EnsembleError::TooManySteps {
                max: MAX_ENSEMBLE_STEPS,
                actual: total,
            });
        }
        if let Some(schedule) = schedule {
            schedule.validate().map_err(EnsembleError::Schedule)?;
        }

        for t in 0..steps {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                warn!(completed_steps = t, "ensemble cancelled");
                return Err(EnsembleError::Cancelled { completed_steps: t });
            }
            let noise = match schedule {
                Some(schedule) => schedule.noise_at(t, steps),
                None => self.config.noise,
            };
            let values = self.step_all(noise)?;
            for (series, value) in self.order.iter_mut().zip(values) {
                series.push(value);
            }
            self.noise.push(noise);
        }
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn step_all(&mut self, noise: f64) -> Result<Vec<f64>, ModelError> {
        self.models
            .par_iter_mut()
            .map(|model| step_replica(model, noise))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn step_all(&mut self, noise: f64) -> Result<Vec<f64>, ModelError> {
        self.models
            .iter_mut()
            .map(|model| step_replica(model, noise))
            .collect()
    }

    /// Copy of everything recorded so far.
    pub fn run(&self) -> EnsembleRun {
        EnsembleRun::from_records(self.config.length, self.order.clone(), self.noise.clone())
    }

    pub fn into_run(self) -> EnsembleRun {
        EnsembleRun::from_records(self.config.length, self.order, self.noise)
    }
}

fn step_replica(model: &mut VicsekModel, noise: f64) -> Result<f64, ModelError> {
    model.set_noise(noise)?;
    model.step()?;
    Ok(model.order_parameter())
}

/// Run a whole ensemble. Every argument is validated before any replica is
/// built; on error no partial results are returned.
pub fn run_ensemble(config: &ModelConfig, plan: &EnsemblePlan) -> Result<EnsembleRun, EnsembleError> {
    validate_replicas(plan.replicas)?;
    validate_steps(plan.steps)?;
    if plan.burn_in >= plan.steps {
        return Err(EnsembleError::InvalidBurnIn {
            burn_in: plan.burn_in,
            steps: plan.steps,
        });
    }
    if let Some(schedule) = &plan.schedule {
        schedule.validate().map_err(EnsembleError::Schedule)?;
    }

    let mut ensemble = Ensemble::new(config.clone(), plan.replicas, plan.seed)?;
    ensemble.advance(plan.steps, plan.schedule.as_ref(), None)?;
    let run = ensemble.into_run();
    info!(
        replicas = run.replicas(),
        steps = run.steps(),
        final_mean = run.mean.last().copied().unwrap_or(0.0),
        "ensemble complete"
    );
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn small_config() -> ModelConfig {
        ModelConfig {
            length: 6.0,
            particle_count: Some(40),
            noise: 1.0,
            ..ModelConfig::default()
        }
    }

    fn plan(replicas: usize, steps: usize) -> EnsemblePlan {
        EnsemblePlan {
            replicas,
            steps,
            burn_in: 0,
            seed: 9,
            schedule: None,
        }
    }

    #[test]
    fn run_records_full_matrix() {
        let run = run_ensemble(&small_config(), &plan(4, 12)).unwrap();
        assert_eq!(run.replicas(), 4);
        assert_eq!(run.steps(), 12);
        assert!(run.order.iter().all(|s| s.len() == 12));
        assert_eq!(run.mean.len(), 12);
        assert_eq!(run.variance.len(), 12);
        assert!(run.noise.iter().all(|&n| n == 1.0));
        for t in 0..12 {
            let m = run.order.iter().map(|s| s[t]).sum::<f64>() / 4.0;
            assert!((run.mean[t] - m).abs() < 1e-12);
            assert!(run.variance[t] >= 0.0);
        }
    }

    #[test]
    fn single_replica_has_zero_variance() {
        let run = run_ensemble(&small_config(), &plan(1, 5)).unwrap();
        assert!(run.variance.iter().all(|&v| v == 0.0));
        assert_eq!(run.mean, run.order[0]);
    }

    #[test]
    fn rejects_invalid_arguments_before_running() {
        assert!(matches!(
            run_ensemble(&small_config(), &plan(0, 5)),
            Err(EnsembleError::InvalidReplicaCount { actual: 0, .. })
        ));
        assert_eq!(
            run_ensemble(&small_config(), &plan(2, 0)),
            Err(EnsembleError::InvalidStepCount)
        );
        let mut bad_burn = plan(2, 5);
        bad_burn.burn_in = 5;
        assert_eq!(
            run_ensemble(&small_config(), &bad_burn),
            Err(EnsembleError::InvalidBurnIn {
                burn_in: 5,
                steps: 5
            })
        );
        let mut bad_schedule = plan(2, 5);
        bad_schedule.schedule = Some(NoiseSchedule::Linear {
            start: 0.0,
            end: 9.0,
        });
        assert_eq!(
            run_ensemble(&small_config(), &bad_schedule),
            Err(EnsembleError::Schedule(ConfigError::InvalidScheduleNoise))
        );
        let bad_model = ModelConfig {
            radius: -1.0,
            ..small_config()
        };
        assert_eq!(
            run_ensemble(&bad_model, &plan(2, 5)),
            Err(EnsembleError::Model(ModelError::Config(
                ConfigError::InvalidRadius
            )))
        );
    }

    #[test]
    fn replicas_match_standalone_models() {
        let config = small_config();
        let run = run_ensemble(&config, &plan(3, 8)).unwrap();
        for r in 0..3 {
            let mut model = VicsekModel::for_replica(config.clone(), 9, r).unwrap();
            let alone: Vec<f64> = (0..8)
                .map(|_| {
                    model.step().unwrap();
                    model.order_parameter()
                })
                .collect();
            assert_eq!(run.replica(r).unwrap(), alone.as_slice());
        }
    }

    #[test]
    fn replica_trajectory_independent_of_ensemble_size() {
        let small = run_ensemble(&small_config(), &plan(2, 10)).unwrap();
        let large = run_ensemble(&small_config(), &plan(5, 10)).unwrap();
        assert_eq!(small.order[0], large.order[0]);
        assert_eq!(small.order[1], large.order[1]);
        assert_ne!(large.order[0], large.order[1]);
    }

    #[test]
    fn schedule_sets_shared_noise_per_step() {
        let mut p = plan(3, 5);
        p.schedule = Some(NoiseSchedule::Linear {
            start: TAU,
            end: 0.0,
        });
        let run = run_ensemble(&small_config(), &p).unwrap();
        let expected = [TAU, 0.75 * TAU, 0.5 * TAU, 0.25 * TAU, 0.0];
        for (got, want) in run.noise.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn incremental_advance_appends() {
        let config = small_config();
        let mut ensemble = Ensemble::new(config.clone(), 2, 9).unwrap();
        ensemble.advance(4, None, None).unwrap();
        ensemble.advance(6, None, None).unwrap();
        assert_eq!(ensemble.steps_recorded(), 10);
        assert!(ensemble.models().iter().all(|m| m.current_step() == 10));

        let once = run_ensemble(&config, &plan(2, 10)).unwrap();
        assert_eq!(ensemble.run().order, once.order);
    }

    #[test]
    fn cancelled_flag_stops_before_next_step() {
        let mut ensemble = Ensemble::new(small_config(), 2, 1).unwrap();
        ensemble.advance(3, None, None).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert_eq!(
            ensemble.advance(5, None, Some(&cancel)),
            Err(EnsembleError::Cancelled { completed_steps: 0 })
        );
        assert_eq!(ensemble.steps_recorded(), 3);
        let run = ensemble.into_run();
        assert!(run.order.iter().all(|s| s.len() == 3));
    }

    #[test]
    fn advance_validates_schedule_and_steps() {
        let mut ensemble = Ensemble::new(small_config(), 1, 1).unwrap();
        assert_eq!(
            ensemble.advance(0, None, None),
            Err(EnsembleError::InvalidStepCount)
        );
        let bad = NoiseSchedule::Cosine { period: -1.0 };
        assert_eq!(
            ensemble.advance(3, Some(&bad), None),
            Err(EnsembleError::Schedule(ConfigError::InvalidSchedulePeriod))
        );
        assert_eq!(ensemble.steps_recorded(), 0);
    }

    #[test]
    fn summary_respects_burn_in() {
        let run = run_ensemble(&small_config(), &plan(3, 10)).unwrap();
        let stats = run.summary(4).unwrap();
        assert_eq!(stats.replicas, 3);
        assert_eq!(stats.samples_per_replica, 6);
        assert!((0.0..=1.0).contains(&stats.mean));
        assert!((stats.susceptibility - stats.variance * 36.0).abs() < 1e-12);
        assert!(matches!(
            run.summary(10),
            Err(EnsembleError::InvalidBurnIn { .. })
        ));
    }

    #[test]
    fn error_display_and_source() {
        let err = EnsembleError::Cancelled { completed_steps: 7 };
        assert_eq!(err.to_string(), "ensemble cancelled after 7 steps");
        assert!(err.source().is_none());
        let err = EnsembleError::Schedule(ConfigError::InvalidSchedulePeriod);
        assert_eq!(
            err.to_string(),
            "invalid noise schedule: schedule period must be positive and finite"
        );
        assert!(err.source().is_some());
    }
}
