/// Largest valid domain side length. Keeps cell-grid dimensions bounded.
pub const MAX_DOMAIN_LENGTH: f64 = 4096.0;

/// Upper bound on particles in a single replica.
pub const MAX_PARTICLES: usize = 250_000;

/// Upper bound on steps recorded by a single ensemble call.
pub const MAX_ENSEMBLE_STEPS: usize = 1_000_000;

/// Upper bound on replicas in a single ensemble.
pub const MAX_REPLICAS: usize = 10_000;

/// Relative resultant magnitude (per unit of neighbor weight) below which
/// neighbor headings are treated as cancelling exactly.
pub const DEGENERATE_RESULTANT_TOLERANCE: f64 = 1e-9;

/// Order parameter threshold used for burn-in measurements.
pub const DEFAULT_ORDER_THRESHOLD: f64 = 0.98;
