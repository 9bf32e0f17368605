//! Battle registry.
//!
//! The [`Registry`] owns every battle of one game session and indexes each
//! fighting combatant to its battle. It is an ordinary value: construct one
//! per session and hand it to whoever needs it. Independent registries never
//! share state, which keeps tests isolated.
//!
//! # Engagement Rules
//!
//! - Neither side fighting: a new battle starts with the initiator's turn.
//! - One side fighting: the other side joins that battle at the end of the
//!   turn order. The turn pointer is untouched.
//! - Both sides in the same battle: nothing changes.
//! - Both sides in different battles: refused. Battles are never fused.
//!
//! # Example
//!
//! ```
//! use melee_core::combatant::Directory;
//! use melee_core::registry::{Engagement, Registry};
//! use melee_core::world::World;
//! use glam::IVec2;
//!
//! let mut world = World::new();
//! let a = world.spawn_player("a", 10, IVec2::ZERO);
//! let b = world.spawn_monster("Goblin", 20, IVec2::ONE);
//! let c = world.spawn_monster("Rat", 5, IVec2::ONE);
//!
//! let mut registry = Registry::new();
//! let first = registry
//!     .engage(world.combatant(a).unwrap(), world.combatant(b).unwrap())
//!     .unwrap();
//! let Engagement::Created(battle) = first else { unreachable!() };
//!
//! let second = registry
//!     .engage(world.combatant(a).unwrap(), world.combatant(c).unwrap())
//!     .unwrap();
//! assert_eq!(second, Engagement::Joined { battle, newcomer: c });
//! assert_eq!(registry.get(battle).unwrap().turn_order(), &[a, b, c]);
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::battle::{Battle, BattleId};
use crate::combatant::{Combatant, CombatantId};
use crate::error::BattleError;

/// Result of a successful [`Registry::engage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    /// A fresh battle was created.
    Created(BattleId),
    /// One side joined the other side's battle.
    Joined {
        /// The battle that grew.
        battle: BattleId,
        /// The combatant that joined it.
        newcomer: CombatantId,
    },
    /// Both sides already fight each other; nothing changed.
    AlreadyEngaged(BattleId),
}

impl Engagement {
    /// The battle both sides now belong to.
    #[must_use]
    pub const fn battle(&self) -> BattleId {
        match self {
            Self::Created(battle) | Self::AlreadyEngaged(battle) | Self::Joined { battle, .. } => {
                *battle
            }
        }
    }
}

/// All battles of one session, plus the combatant-to-battle index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    next_id: u64,
    /// Which battle each fighting combatant belongs to.
    membership: HashMap<CombatantId, BattleId>,
    /// Battles in creation order.
    battles: BTreeMap<BattleId, Battle>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a battle between two combatants, or merges one side into the
    /// battle the other is already fighting.
    ///
    /// Engaging the same pair twice changes nothing.
    ///
    /// # Errors
    ///
    /// - [`BattleError::SelfEngagement`] if both sides are the same entity.
    /// - [`BattleError::AlreadyDead`] if either side has no hit points.
    /// - [`BattleError::MonsterVsMonster`] if both sides are monsters.
    /// - [`BattleError::SplitEngagement`] if the sides fight in two
    ///   different battles.
    pub fn engage(
        &mut self,
        initiator: &dyn Combatant,
        opponent: &dyn Combatant,
    ) -> Result<Engagement, BattleError> {
        let (a, b) = (initiator.id(), opponent.id());
        if a == b {
            return Err(BattleError::SelfEngagement(a));
        }
        for side in [initiator, opponent] {
            if !side.is_alive() {
                return Err(BattleError::AlreadyDead(side.id()));
            }
        }
        if initiator.is_monster() && opponent.is_monster() {
            return Err(BattleError::MonsterVsMonster(a, b));
        }

        match (self.battle_for(a), self.battle_for(b)) {
            (Some(x), Some(y)) if x == y => Ok(Engagement::AlreadyEngaged(x)),
            (Some(x), Some(y)) => Err(BattleError::SplitEngagement {
                initiator: a,
                initiator_battle: x,
                opponent: b,
                opponent_battle: y,
            }),
            (Some(battle), None) => self.join(battle, opponent),
            (None, Some(battle)) => self.join(battle, initiator),
            (None, None) => Ok(Engagement::Created(self.create(initiator, opponent))),
        }
    }

    fn create(&mut self, initiator: &dyn Combatant, opponent: &dyn Combatant) -> BattleId {
        let id = BattleId::new(self.next_id);
        self.next_id += 1;

        let battle = Battle::new(
            id,
            (initiator.id(), initiator.is_monster()),
            (opponent.id(), opponent.is_monster()),
        );
        self.membership.insert(initiator.id(), id);
        self.membership.insert(opponent.id(), id);
        self.battles.insert(id, battle);

        info!(battle = %id, initiator = %initiator.id(), opponent = %opponent.id(), "battle created");
        id
    }

    fn join(&mut self, battle: BattleId, newcomer: &dyn Combatant) -> Result<Engagement, BattleError> {
        let entry = self
            .battles
            .get_mut(&battle)
            .ok_or(BattleError::UnknownBattle(battle))?;
        entry.add_member(newcomer.id(), newcomer.is_monster());
        self.membership.insert(newcomer.id(), battle);

        debug!(battle = %battle, newcomer = %newcomer.id(), "combatant joined battle");
        Ok(Engagement::Joined {
            battle,
            newcomer: newcomer.id(),
        })
    }

    /// The battle `id` is fighting in.
    ///
    /// Index entries pointing at dissolved battles are never reported.
    #[must_use]
    pub fn battle_for(&self, id: CombatantId) -> Option<BattleId> {
        self.membership
            .get(&id)
            .copied()
            .filter(|battle| self.battles.contains_key(battle))
    }

    /// Returns a battle by id.
    #[must_use]
    pub fn get(&self, battle: BattleId) -> Option<&Battle> {
        self.battles.get(&battle)
    }

    /// Returns a mutable battle by id.
    #[must_use]
    pub fn get_mut(&mut self, battle: BattleId) -> Option<&mut Battle> {
        self.battles.get_mut(&battle)
    }

    /// Drops one combatant's index entry after it left its battle.
    pub fn release(&mut self, id: CombatantId) {
        self.membership.remove(&id);
    }

    /// Removes a battle and every index entry pointing at it.
    ///
    /// Returns `None` if it was already dissolved, so a second teardown is
    /// harmless.
    pub fn dissolve(&mut self, battle: BattleId) -> Option<Battle> {
        let removed = self.battles.remove(&battle)?;
        self.membership.retain(|_, owner| *owner != battle);
        debug!(battle = %battle, "battle dissolved");
        Some(removed)
    }

    /// Battles in creation order.
    pub fn battles(&self) -> impl Iterator<Item = &Battle> + '_ {
        self.battles.values()
    }

    /// Number of live battles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.battles.len()
    }

    /// Returns true if no battle is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.battles.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
