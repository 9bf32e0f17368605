//! The battle engine façade.
//!
//! [`Engine`] ties the registry, the entity directory, the notifier and the
//! dice together and exposes the three calls the surrounding game loop
//! makes:
//!
//! - [`Engine::engage`] / [`Engine::engage_at`] when two entities collide,
//! - [`Engine::submit_action`] when a player acts,
//! - [`Engine::on_disconnect`] when a player's connection drops.
//!
//! # Turn Cycle
//!
//! Each accepted action runs the same cycle:
//!
//! 1. **Resolve**: the action resolver validates turn ownership and the
//!    target, rolls the dice and applies damage through the directory.
//! 2. **Prune**: a slain or departed combatant is removed from the battle
//!    and the turn pointer is repaired.
//! 3. **Advance**: the scheduler moves the pointer to the next live member.
//! 4. **Report**: every player in the battle receives the result.
//! 5. **Settle**: the lifecycle manager ends the battle if no fight is left;
//!    otherwise the scheduler dispatches the new turn. Monster turns run
//!    immediately; a player turn suspends until that player acts.
//!
//! # Concurrency
//!
//! All mutating calls take `&mut self`, so at most one action per session is
//! in flight and the turn-order invariants can never be observed half
//! updated. Independent sessions use independent engines, which may live on
//! different threads.
//!
//! # Example
//!
//! ```
//! use melee_core::config::EngineConfig;
//! use melee_core::engine::{Action, Engine, Outcome};
//! use melee_core::event::EventLog;
//! use melee_core::world::World;
//! use glam::IVec2;
//!
//! let mut world = World::new();
//! let hero = world.spawn_player("hero", 20, IVec2::new(1, 1));
//! let rat = world.spawn_monster("Rat", 3, IVec2::new(1, 2));
//!
//! let mut engine = Engine::new(world, EventLog::new(), EngineConfig::with_seed(7)).unwrap();
//! let battle = engine.engage_at(hero, IVec2::new(1, 2)).unwrap().unwrap().battle();
//! assert_eq!(engine.battle_for(hero), Some(battle));
//!
//! // Only one opponent: the target is inferred.
//! let outcome = engine.submit_action(hero, Action::Attack, None);
//! assert!(matches!(outcome, Outcome::Hit { .. } | Outcome::Killed { .. }));
//! ```

mod lifecycle;
mod payload;
mod resolver;
mod scheduler;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::battle::{Battle, BattleId};
use crate::combatant::{CombatantId, Directory, Position};
use crate::config::{ConfigError, EngineConfig};
use crate::dice::{Dice, SeededDice};
use crate::error::BattleError;
use crate::event::{ActionKind, CombatEvent, Notifier};
use crate::registry::{Engagement, Registry};

pub use payload::{build_view, combatant_status};
use payload::turn_fields;

// =============================================================================
// Actions and Outcomes
// =============================================================================

/// What a player can do on their turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Strike an opponent.
    Attack,
    /// Raise the guard until the next turn or the next attack received.
    Defend,
    /// Leave the battle.
    Flee,
}

impl From<Action> for ActionKind {
    fn from(action: Action) -> Self {
        match action {
            Action::Attack => Self::Attack,
            Action::Defend => Self::Defend,
            Action::Flee => Self::Flee,
        }
    }
}

/// Why a submitted action was dropped without any state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// The actor is not fighting.
    NotInBattle,
    /// Someone else holds the turn.
    NotYourTurn,
    /// The actor named itself as target.
    InvalidTarget,
}

/// Result of [`Engine::submit_action`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Dropped silently; nothing changed.
    Ignored(IgnoreReason),
    /// Several opponents and no explicit target; resubmit with one.
    TargetRequired {
        /// Valid targets, in turn order.
        targets: Vec<CombatantId>,
    },
    /// The named target is no longer in the battle; nothing changed.
    StaleTarget(CombatantId),
    /// The defending target blocked the blow.
    Blocked {
        /// Who attacked.
        attacker: CombatantId,
        /// Who blocked.
        target: CombatantId,
    },
    /// The target was hit and survived.
    Hit {
        /// Who attacked.
        attacker: CombatantId,
        /// Who was hit.
        target: CombatantId,
        /// Damage dealt.
        damage: u32,
        /// Target hit points after the blow.
        remaining: i32,
    },
    /// The target was killed.
    Killed {
        /// Who attacked.
        attacker: CombatantId,
        /// Who died.
        target: CombatantId,
        /// Damage of the final blow.
        damage: u32,
    },
    /// The actor raised their guard.
    Defended {
        /// Who defended.
        actor: CombatantId,
    },
    /// The actor left the battle.
    Fled {
        /// Who fled.
        actor: CombatantId,
    },
    /// The battle's state was found corrupt and it was torn down.
    Aborted {
        /// The dissolved battle.
        battle: BattleId,
        /// What was wrong.
        error: BattleError,
    },
}

// =============================================================================
// Engine
// =============================================================================

/// Turn-based battle engine for one game session.
pub struct Engine<D, N> {
    registry: Registry,
    directory: D,
    notifier: N,
    dice: Box<dyn Dice>,
    config: EngineConfig,
}

impl<D: fmt::Debug, N: fmt::Debug> fmt::Debug for Engine<D, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("directory", &self.directory)
            .field("notifier", &self.notifier)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<D: Directory, N: Notifier> Engine<D, N> {
    /// Creates an engine, seeding the dice from `config.seed` or from OS
    /// entropy when no seed is set.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the config fails validation.
    pub fn new(directory: D, notifier: N, config: EngineConfig) -> Result<Self, ConfigError> {
        let dice = config
            .seed
            .map_or_else(SeededDice::from_entropy, SeededDice::new);
        Self::with_dice(directory, notifier, config, dice)
    }

    /// Creates an engine with caller-supplied dice.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the config fails validation.
    pub fn with_dice(
        directory: D,
        notifier: N,
        config: EngineConfig,
        dice: impl Dice + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registry: Registry::new(),
            directory,
            notifier,
            dice: Box::new(dice),
            config,
        })
    }

    /// The battle registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The entity directory.
    #[must_use]
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Mutable access to the entity directory, e.g. to move entities.
    #[must_use]
    pub fn directory_mut(&mut self) -> &mut D {
        &mut self.directory
    }

    /// The notifier.
    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// The battle `id` is fighting in.
    #[must_use]
    pub fn battle_for(&self, id: CombatantId) -> Option<BattleId> {
        self.registry.battle_for(id)
    }

    /// Returns a live battle.
    #[must_use]
    pub fn battle(&self, id: BattleId) -> Option<&Battle> {
        self.registry.get(id)
    }

    /// Starts a battle between two entities, or merges one into the battle
    /// the other is fighting.
    ///
    /// Every player of the resulting battle receives a `CombatStart`. If a
    /// monster holds the opening turn, monster turns run until a player
    /// holds it.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownCombatant`] for ids the directory does
    /// not know, and the refusals of [`Registry::engage`]. Nothing changes
    /// on error.
    pub fn engage(
        &mut self,
        initiator: CombatantId,
        opponent: CombatantId,
    ) -> Result<Engagement, BattleError> {
        let engagement = {
            let a = self
                .directory
                .combatant(initiator)
                .ok_or(BattleError::UnknownCombatant(initiator))?;
            let b = self
                .directory
                .combatant(opponent)
                .ok_or(BattleError::UnknownCombatant(opponent))?;
            self.registry.engage(a, b)?
        };

        let message = match engagement {
            Engagement::AlreadyEngaged(_) => return Ok(engagement),
            Engagement::Created(_) => {
                self.directory.set_engaged(initiator, true);
                self.directory.set_engaged(opponent, true);
                format!(
                    "{} engages {} in combat!",
                    self.name_of(initiator),
                    self.name_of(opponent)
                )
            }
            Engagement::Joined { newcomer, .. } => {
                self.directory.set_engaged(newcomer, true);
                format!("{} joins the battle!", self.name_of(newcomer))
            }
        };

        let battle_id = engagement.battle();
        self.announce_start(battle_id, &message);
        if matches!(engagement, Engagement::Created(_)) {
            self.guarded(battle_id, |engine| engine.dispatch(battle_id));
        }
        Ok(engagement)
    }

    /// Collision entry point: engages whatever monster stands on `position`.
    ///
    /// Returns `Ok(None)` if the tile holds no living monster.
    ///
    /// # Errors
    ///
    /// Same as [`engage`](Self::engage).
    pub fn engage_at(
        &mut self,
        initiator: CombatantId,
        position: Position,
    ) -> Result<Option<Engagement>, BattleError> {
        match self.directory.monster_at(position) {
            Some(monster) => self.engage(initiator, monster).map(Some),
            None => Ok(None),
        }
    }

    /// Submits a player's action for their current battle.
    ///
    /// Out-of-turn input and input from combatants that are not fighting is
    /// ignored. An attack without a target against several opponents only
    /// prompts the actor to choose one.
    pub fn submit_action(
        &mut self,
        actor: CombatantId,
        action: Action,
        target: Option<CombatantId>,
    ) -> Outcome {
        let Some(battle_id) = self.registry.battle_for(actor) else {
            warn!(actor = %actor, ?action, "action ignored: not in battle");
            return Outcome::Ignored(IgnoreReason::NotInBattle);
        };

        match self.act(battle_id, actor, action, target) {
            Ok(outcome) => outcome,
            Err(error) if error.is_invariant_violation() => {
                self.abort(battle_id, &error);
                Outcome::Aborted {
                    battle: battle_id,
                    error,
                }
            }
            Err(error) => {
                warn!(battle = %battle_id, actor = %actor, %error, "action ignored");
                Outcome::Ignored(IgnoreReason::NotInBattle)
            }
        }
    }

    /// Handles a dropped connection.
    ///
    /// The combatant leaves its battle. If it held the turn, the turn
    /// advances exactly once on its behalf so the battle never waits on
    /// someone who can no longer act. Returns the battle it left.
    pub fn on_disconnect(&mut self, id: CombatantId) -> Option<BattleId> {
        let battle_id = self.registry.battle_for(id)?;
        debug!(battle = %battle_id, combatant = %id, "combatant disconnected");
        self.guarded(battle_id, |engine| engine.depart(battle_id, id, false));
        Some(battle_id)
    }

    fn act(
        &mut self,
        battle_id: BattleId,
        actor: CombatantId,
        action: Action,
        target: Option<CombatantId>,
    ) -> Result<Outcome, BattleError> {
        let battle = self.battle_ref(battle_id)?;
        battle.check_invariants()?;
        let holds_turn = battle.is_turn_of(actor);
        if !self.directory.is_alive(actor) {
            warn!(battle = %battle_id, actor = %actor, ?action, "action ignored: actor is dead");
            self.remove_combatant(battle_id, actor)?;
            if holds_turn {
                self.step_to_live(battle_id)?;
                self.dispatch(battle_id)?;
            } else {
                self.check_end(battle_id);
            }
            return Ok(Outcome::Ignored(IgnoreReason::NotInBattle));
        }
        if !holds_turn {
            debug!(battle = %battle_id, actor = %actor, ?action, "action ignored: not your turn");
            return Ok(Outcome::Ignored(IgnoreReason::NotYourTurn));
        }

        let outcome = match action {
            Action::Attack => self.attack(battle_id, actor, target)?,
            Action::Defend => self.defend(battle_id, actor)?,
            Action::Flee => {
                self.depart(battle_id, actor, true)?;
                return Ok(Outcome::Fled { actor });
            }
        };

        if matches!(
            outcome,
            Outcome::Blocked { .. } | Outcome::Hit { .. } | Outcome::Killed { .. } | Outcome::Defended { .. }
        ) {
            self.dispatch(battle_id)?;
        }
        Ok(outcome)
    }

    /// Runs `step`; an invariant violation tears the battle down.
    fn guarded(&mut self, battle_id: BattleId, step: impl FnOnce(&mut Self) -> Result<(), BattleError>) {
        match step(self) {
            Ok(()) => {}
            Err(error) if error.is_invariant_violation() => self.abort(battle_id, &error),
            Err(error) => warn!(battle = %battle_id, %error, "battle step failed"),
        }
    }

    fn battle_ref(&self, battle_id: BattleId) -> Result<&Battle, BattleError> {
        self.registry
            .get(battle_id)
            .ok_or(BattleError::UnknownBattle(battle_id))
    }

    fn battle_mut(&mut self, battle_id: BattleId) -> Result<&mut Battle, BattleError> {
        self.registry
            .get_mut(battle_id)
            .ok_or(BattleError::UnknownBattle(battle_id))
    }

    fn name_of(&self, id: CombatantId) -> String {
        self.directory
            .combatant(id)
            .map_or_else(|| id.to_string(), |c| c.display_name().to_owned())
    }

    fn announce_start(&self, battle_id: BattleId, message: &str) {
        let Some(battle) = self.registry.get(battle_id) else {
            return;
        };
        for &player in battle.participants() {
            self.notifier.notify(
                player,
                CombatEvent::CombatStart {
                    battle: battle_id,
                    message: message.to_owned(),
                    view: build_view(&self.directory, battle, player),
                },
            );
        }
    }
}
