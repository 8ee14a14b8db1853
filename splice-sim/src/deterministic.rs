//! Seeded randomness for reproducible segment layouts.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic random number generator for reproducible simulations.
///
/// Uses ChaCha8 algorithm for fast, high-quality pseudorandom numbers
/// with deterministic seed-based generation.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl DeterministicRng {
    /// Creates deterministic RNG from seed value.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Returns the seed used for this RNG.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generates random number in range [0, 1).
    pub fn random_f64(&mut self) -> f64 {
        (self.rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generates random number in range [min, max).
    pub fn random_range(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        min + (self.rng.next_u64() % (max - min))
    }

    /// Generates random boolean with given probability.
    pub fn random_bool(&mut self, probability: f64) -> bool {
        self.random_f64() < probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut first = DeterministicRng::from_seed(7);
        let mut second = DeterministicRng::from_seed(7);

        let a: Vec<u64> = (0..16).map(|_| first.random_range(0, 1000)).collect();
        let b: Vec<u64> = (0..16).map(|_| second.random_range(0, 1000)).collect();

        assert_eq!(a, b);
        assert_eq!(first.seed(), 7);
    }

    #[test]
    fn test_range_bounds() {
        let mut rng = DeterministicRng::from_seed(99);
        for _ in 0..1000 {
            let value = rng.random_range(10, 20);
            assert!((10..20).contains(&value));
            let unit = rng.random_f64();
            assert!((0.0..1.0).contains(&unit));
        }
        assert_eq!(rng.random_range(5, 5), 5);
        assert!(!rng.random_bool(0.0));
        assert!(rng.random_bool(1.0));
    }
}
