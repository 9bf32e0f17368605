//! # Melee Core
//!
//! Turn-based multi-party battle engine.
//!
//! Entities that collide on the map are pulled into a battle; more entities
//! can join while it runs. The engine keeps a fair rotation of turns as
//! combatants join, act, flee or die, resolves attacks and guards with
//! seeded dice, runs monster turns automatically, and tears battles down
//! when no fight is left.
//!
//! ## Architecture
//!
//! - **Combatants**: players and monsters behind one trait, owned by an
//!   external [`Directory`](combatant::Directory). [`World`](world::World)
//!   is an in-memory implementation.
//! - **Battles**: id-only aggregates with a turn order and a turn pointer.
//! - **Registry**: creates battles, merges engagements, indexes members.
//! - **Engine**: action resolver, turn scheduler and lifecycle manager
//!   behind one façade.
//! - **Events**: per-recipient [`CombatEvent`](event::CombatEvent)s handed to
//!   a [`Notifier`](event::Notifier).
//!
//! ## Usage
//!
//! ```rust
//! use glam::IVec2;
//! use melee_core::{Action, Engine, EngineConfig, EventLog, World};
//!
//! let mut world = World::new();
//! let hero = world.spawn_player("hero", 30, IVec2::new(0, 0));
//! let goblin = world.spawn_monster("Goblin", 20, IVec2::new(0, 1));
//!
//! let mut engine = Engine::new(world, EventLog::new(), EngineConfig::with_seed(42))?;
//! engine.engage(hero, goblin)?;
//!
//! while engine.battle_for(hero).is_some() {
//!     engine.submit_action(hero, Action::Attack, Some(goblin));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod battle;
pub mod combatant;
pub mod config;
pub mod dice;
pub mod engine;
pub mod error;
pub mod event;
pub mod registry;
pub mod world;

#[cfg(test)]
mod tests;

pub use battle::{Battle, BattleId, BattleStatus};
pub use combatant::{Combatant, CombatantId, Directory, Position};
pub use config::{ConfigError, DamageRange, EngineConfig};
pub use dice::{Dice, SeededDice};
pub use engine::{Action, Engine, IgnoreReason, Outcome};
pub use error::BattleError;
pub use event::{CombatEvent, EventLog, Notifier};
pub use registry::{Engagement, Registry};
pub use world::World;
