//! Engine configuration.
//!
//! Damage ranges and the block chance are given parameters, not derived
//! from entity stats. Defaults match the classic dungeon rules: players hit
//! for 1–8, monsters for 1–6, or 1–3 against a defending player, and a
//! defending player blocks half of the attacks aimed at them.
//!
//! ```
//! use melee_core::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "block_chance": 0.25 }"#).unwrap();
//! assert_eq!(config.attack_damage.max, 8);
//! assert!((config.block_chance - 0.25).abs() < f64::EPSILON);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("failed to parse engine config")]
    Parse {
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },
    /// A damage range has `min == 0` or `min > max`.
    #[error("invalid damage range for {field}: {range}")]
    InvalidRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected range.
        range: DamageRange,
    },
    /// The block chance lies outside `[0, 1]`.
    #[error("block chance must lie within [0, 1], got {0}")]
    InvalidBlockChance(f64),
}

/// Inclusive damage range rolled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRange {
    /// Smallest possible roll.
    pub min: u32,
    /// Largest possible roll.
    pub max: u32,
}

impl DamageRange {
    /// Creates a new range. Validity is checked by [`EngineConfig::validate`].
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Returns true if `value` lies inside the range.
    #[must_use]
    pub const fn contains(self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }

    const fn is_valid(self) -> bool {
        self.min >= 1 && self.min <= self.max
    }
}

impl fmt::Display for DamageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Tunable parameters of the battle engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Damage of a player attack.
    pub attack_damage: DamageRange,
    /// Damage of a monster attack.
    pub monster_damage: DamageRange,
    /// Damage of a monster attack against a defending player.
    pub monster_damage_vs_defending: DamageRange,
    /// Chance that a defending target blocks a player attack.
    pub block_chance: f64,
    /// Seed for the dice. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attack_damage: DamageRange::new(1, 8),
            monster_damage: DamageRange::new(1, 6),
            monster_damage_vs_defending: DamageRange::new(1, 3),
            block_chance: 0.5,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Default config with a fixed dice seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// Parses and validates a JSON config. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and the validation
    /// errors of [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every range and the block chance.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, range) in [
            ("attack_damage", self.attack_damage),
            ("monster_damage", self.monster_damage),
            ("monster_damage_vs_defending", self.monster_damage_vs_defending),
        ] {
            if !range.is_valid() {
                return Err(ConfigError::InvalidRange { field, range });
            }
        }
        if !(0.0..=1.0).contains(&self.block_chance) {
            return Err(ConfigError::InvalidBlockChance(self.block_chance));
        }
        Ok(())
    }
}
