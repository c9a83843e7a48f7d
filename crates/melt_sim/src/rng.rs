//! Keyed random streams.
//!
//! There is no ambient RNG in the engine. Every consumer asks for a stream
//! keyed by `(seed, day, scope, name)`; the key is hashed with xxh64 into a
//! ChaCha8 seed. Streams for different hosts or incidents never share state,
//! so per-host work can run in any order and still draw the same numbers.

use melt_model::IncidentId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use xxhash_rust::xxh64::xxh64;

/// Day coordinate used for streams that are not tied to a simulated day.
const SETUP_DAY: u32 = u32::MAX;

/// Factory for keyed random streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngStreams {
    seed: u64,
}

impl RngStreams {
    /// Creates a factory for `seed`.
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Returns the master seed.
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the stream for `(day, scope, name)`.
    pub fn stream(&self, day: u32, scope: &str, name: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.key(day, scope, name))
    }

    /// Returns a stream used while building the fleet.
    pub fn setup(&self, name: &str) -> ChaCha8Rng {
        self.stream(SETUP_DAY, "setup", name)
    }

    fn key(&self, day: u32, scope: &str, name: &str) -> u64 {
        let mut buf = Vec::with_capacity(16 + scope.len() + name.len());
        buf.extend_from_slice(&self.seed.to_le_bytes());
        buf.extend_from_slice(&day.to_le_bytes());
        buf.extend_from_slice(scope.as_bytes());
        buf.push(0x1f);
        buf.extend_from_slice(name.as_bytes());
        xxh64(&buf, 0)
    }
}

/// Maps `(a, b)` to a stable fraction in `[0, 1]`.
///
/// Independent of the seed: the same pair always lands on the same value.
#[allow(clippy::cast_precision_loss)]
pub fn stable_fraction(a: &str, b: &str) -> f64 {
    let mut buf = Vec::with_capacity(a.len() + b.len() + 1);
    buf.extend_from_slice(a.as_bytes());
    buf.push(0x1f);
    buf.extend_from_slice(b.as_bytes());
    xxh64(&buf, 0) as f64 / u64::MAX as f64
}

/// Draws a UUID-shaped incident identifier from `rng`.
pub fn incident_id<R: Rng>(rng: &mut R) -> IncidentId {
    let id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
    IncidentId::new(id.to_string())
}

/// Draws a 32-digit hex trace identifier.
pub fn trace_id<R: Rng>(rng: &mut R) -> String {
    format!("{:032x}", rng.gen::<u128>())
}

/// Draws a 16-digit hex span identifier.
pub fn span_id<R: Rng>(rng: &mut R) -> String {
    format!("{:016x}", rng.gen::<u64>())
}

/// Draws from a normal distribution, falling back to the mean when the
/// parameters are degenerate.
pub fn gauss<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    use rand_distr::{Distribution, Normal};
    Normal::new(mean, std_dev).map_or(mean, |normal| normal.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_reproducible() {
        let streams = RngStreams::new(42);
        let mut a = streams.stream(3, "host-a", "metrics");
        let mut b = streams.stream(3, "host-a", "metrics");
        let xs: Vec<u64> = (0..4).map(|_| a.gen()).collect();
        let ys: Vec<u64> = (0..4).map(|_| b.gen()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn keys_separate_scopes() {
        let streams = RngStreams::new(42);
        let mut a = streams.stream(0, "ab", "c");
        let mut b = streams.stream(0, "a", "bc");
        assert_ne!(a.gen::<u64>(), b.gen::<u64>());
        let mut c = RngStreams::new(43).stream(0, "ab", "c");
        let mut d = streams.stream(0, "ab", "c");
        assert_ne!(c.gen::<u64>(), d.gen::<u64>());
    }

    #[test]
    fn stable_fraction_is_bounded_and_stable() {
        let x = stable_fraction("incident-1", "host-1");
        assert!((0.0..=1.0).contains(&x));
        assert!((x - stable_fraction("incident-1", "host-1")).abs() < f64::EPSILON);
    }

    #[test]
    fn identifiers_have_expected_shape() {
        let mut rng = RngStreams::new(1).setup("ids");
        assert_eq!(trace_id(&mut rng).len(), 32);
        assert_eq!(span_id(&mut rng).len(), 16);
        assert_eq!(incident_id(&mut rng).as_str().len(), 36);
    }
}
