use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Derive the RNG for one replica of an ensemble.
///
/// All replicas share the key derived from `base_seed` but draw from distinct
/// ChaCha streams, so no two replicas ever see overlapping output and a
/// replica's stream does not depend on how many siblings it has.
pub fn derive_replica_rng(base_seed: u64, replica: usize) -> ChaCha12Rng {
    let mut rng = ChaCha12Rng::seed_from_u64(base_seed);
    rng.set_stream(replica as u64);
    rng
}
