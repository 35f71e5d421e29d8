pub mod alignment;
pub mod config;
pub mod constants;
pub mod ensemble;
pub mod geometry;
pub mod metrics;
pub mod model;
pub mod order;
pub mod particle;
pub mod rng;
pub mod scan;
pub mod schedule;
pub mod spatial;

pub use config::{
    ConfigError, EnsemblePlan, ExperimentConfig, LeaderConfig, ModelConfig, NeighborSearch,
};
pub use ensemble::{run_ensemble, CancelFlag, Ensemble, EnsembleError, EnsembleRun};
pub use geometry::Domain;
pub use metrics::{OrderSample, OrderStatistics, RunSummary, StepTimings};
pub use model::{ModelError, VicsekModel};
pub use particle::{Particle, ParticleKind, Snapshot};
pub use scan::{linspace, parameter_scan, ScanParameter, ScanPoint};
pub use schedule::NoiseSchedule;
