//! Error types for battle bookkeeping.
//!
//! Two families share [`BattleError`]:
//!
//! - **Refused engagements**: the registry declines to start or extend a
//!   battle. Nothing changes.
//! - **Invariant violations**: a battle's turn order or pointer no longer
//!   describes its membership. The engine ends and dissolves that one
//!   battle instead of letting it corrupt shared state. Other battles keep
//!   running.
//!
//! Ignored input, ambiguous targets and stale targets are not errors; they
//! are reported through [`Outcome`](crate::engine::Outcome).

use thiserror::Error;

use crate::battle::BattleId;
use crate::combatant::CombatantId;

/// Errors raised by the registry, the scheduler and the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleError {
    /// The directory has no entity with this id.
    #[error("combatant {0} is unknown to the directory")]
    UnknownCombatant(CombatantId),

    /// A combatant tried to engage itself.
    #[error("combatant {0} cannot engage itself")]
    SelfEngagement(CombatantId),

    /// A dead combatant cannot join a battle.
    #[error("combatant {0} is already dead")]
    AlreadyDead(CombatantId),

    /// Monsters never fight each other.
    #[error("monsters {0} and {1} cannot fight each other")]
    MonsterVsMonster(CombatantId, CombatantId),

    /// Both sides already fight in two different battles.
    #[error("{initiator} is in battle {initiator_battle} but {opponent} is in battle {opponent_battle}")]
    SplitEngagement {
        /// The engaging combatant.
        initiator: CombatantId,
        /// Battle the initiator belongs to.
        initiator_battle: BattleId,
        /// The engaged combatant.
        opponent: CombatantId,
        /// Battle the opponent belongs to.
        opponent_battle: BattleId,
    },

    /// The battle is not (or no longer) in the registry.
    #[error("battle {0} does not exist")]
    UnknownBattle(BattleId),

    /// The turn pointer lies outside the turn order.
    #[error("battle {battle}: turn index {index} out of range for {len} entries")]
    TurnIndexOutOfRange {
        /// Affected battle.
        battle: BattleId,
        /// The offending index.
        index: usize,
        /// Length of the turn order.
        len: usize,
    },

    /// The turn order names a combatant that is not a member.
    #[error("battle {battle}: turn order names non-member {combatant}")]
    DanglingTurnEntry {
        /// Affected battle.
        battle: BattleId,
        /// The dangling id.
        combatant: CombatantId,
    },

    /// The turn order names a combatant twice.
    #[error("battle {battle}: {combatant} appears twice in the turn order")]
    DuplicateTurnEntry {
        /// Affected battle.
        battle: BattleId,
        /// The duplicated id.
        combatant: CombatantId,
    },

    /// The scheduler could not reach a player turn within its step bound.
    #[error("battle {battle}: scheduler made no progress after {steps} steps")]
    SchedulerStalled {
        /// Affected battle.
        battle: BattleId,
        /// Steps taken before giving up.
        steps: usize,
    },
}

impl BattleError {
    /// Returns true for errors that mean a battle's state is corrupt.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::TurnIndexOutOfRange { .. }
                | Self::DanglingTurnEntry { .. }
                | Self::DuplicateTurnEntry { .. }
                | Self::SchedulerStalled { .. }
        )
    }
}
