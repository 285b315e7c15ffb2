//! RNG oracle for chance-to-apply rolls.
//!
//! Rolls must be reproducible on every peer that simulates the same
//! application, so randomness is a pure function of a seed rather than
//! hidden generator state.

/// RNG oracle for deterministic random number generation.
///
/// Implementations must be deterministic and produce the same values
/// given the same seed.
pub trait RngOracle: Send + Sync {
    /// Generate a random u32 value from a seed.
    fn next_u32(&self, seed: u64) -> u32;

    /// Uniform value in `[0, 1)`.
    fn roll_unit(&self, seed: u64) -> f32 {
        // 24 bits keep the result exactly representable as f32
        (self.next_u32(seed) >> 8) as f32 / (1u32 << 24) as f32
    }
}

/// PCG random number generator (PCG-XSH-RR, 64-bit state, 32-bit output).
///
/// - PCG paper: <https://www.pcg-random.org/>
#[derive(Clone, Copy, Debug, Default)]
pub struct PcgRng;

impl PcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    #[inline]
    fn pcg_step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    #[inline]
    fn pcg_output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

impl RngOracle for PcgRng {
    fn next_u32(&self, seed: u64) -> u32 {
        Self::pcg_output(Self::pcg_step(seed))
    }
}

/// Compute a deterministic seed for one roll.
///
/// * `base_seed` - configured seed shared by all peers
/// * `nonce` - per-component application counter
/// * `owner` - entity receiving the effect
/// * `context` - distinguishes multiple rolls within one application
pub fn compute_seed(base_seed: u64, nonce: u64, owner: u32, context: u32) -> u64 {
    let mut hash = base_seed;
    hash ^= nonce.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= (owner as u64).wrapping_mul(0x517cc1b727220a95);
    hash ^= (context as u64).wrapping_mul(0x85ebca6b);

    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;

    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_roll() {
        let rng = PcgRng;
        let seed = compute_seed(7, 3, 1, 0);
        assert_eq!(rng.next_u32(seed), rng.next_u32(seed));
        assert_eq!(rng.roll_unit(seed).to_bits(), rng.roll_unit(seed).to_bits());
    }

    #[test]
    fn unit_roll_stays_in_range() {
        let rng = PcgRng;
        for nonce in 0..1_000 {
            let roll = rng.roll_unit(compute_seed(42, nonce, 9, 0));
            assert!((0.0..1.0).contains(&roll), "roll {roll} out of range");
        }
    }

    #[test]
    fn nonce_changes_seed() {
        assert_ne!(compute_seed(1, 0, 1, 0), compute_seed(1, 1, 1, 0));
        assert_ne!(compute_seed(1, 0, 1, 0), compute_seed(1, 0, 2, 0));
    }
}
