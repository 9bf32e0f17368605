//! Randomness used by the action resolver.
//!
//! Every random decision in a battle goes through [`Dice`]: damage rolls,
//! block rolls and the target a monster picks. [`SeededDice`] is the
//! production implementation; tests swap in scripted dice to force outcomes.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::DamageRange;

/// Source of random outcomes for combat resolution.
pub trait Dice: Send {
    /// Rolls uniformly within the inclusive range.
    fn roll(&mut self, range: DamageRange) -> u32;

    /// Returns true with probability `probability`.
    fn chance(&mut self, probability: f64) -> bool;

    /// Picks a uniformly random index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
}

/// Deterministic dice backed by `ChaCha8Rng`.
///
/// ```
/// use melee_core::config::DamageRange;
/// use melee_core::dice::{Dice, SeededDice};
///
/// let mut a = SeededDice::new(42);
/// let mut b = SeededDice::new(42);
/// let range = DamageRange::new(1, 8);
/// assert_eq!(a.roll(range), b.roll(range));
/// ```
#[derive(Debug, Clone)]
pub struct SeededDice {
    rng: ChaCha8Rng,
    seed: u64,
}

impl SeededDice {
    /// Creates dice from a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Creates dice seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng().gen())
    }

    /// Seed these dice were created with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

impl Dice for SeededDice {
    fn roll(&mut self, range: DamageRange) -> u32 {
        self.rng.gen_range(range.min..=range.max)
    }

    fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}
