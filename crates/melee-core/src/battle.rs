//! The battle aggregate.
//!
//! A [`Battle`] holds ids only. Hit points, names and positions stay in the
//! [`Directory`](crate::combatant::Directory); the battle records who is
//! fighting, in which order they act, whose turn it is, and who raised
//! their guard.
//!
//! # Invariants
//!
//! While a battle is active:
//!
//! - `turn_order` is exactly `participants ∪ monsters`, without duplicates.
//! - `current` indexes `turn_order`.
//! - a battle whose [`should_end`](Battle::should_end) is true gets ended
//!   before any further action is accepted.
//!
//! [`Battle::check_invariants`] verifies all three.
//!
//! # Turn Pointer Repair
//!
//! Removing the entry at index `i` moves the pointer back one slot (with
//! wrap-around) when `i <= current`. The pointer then rests on the entry
//! that acted before the next holder, so a following
//! [`step_pointer`](Battle::step_pointer) lands on the right combatant
//! without skipping or repeating anyone.
//!
//! ```
//! use melee_core::battle::{Battle, BattleId};
//! use melee_core::combatant::CombatantId;
//!
//! let (p1, m1, p2) = (CombatantId::new(1), CombatantId::new(2), CombatantId::new(3));
//! let mut battle = Battle::new(BattleId::new(0), (p1, false), (m1, true));
//! battle.add_member(p2, false);
//!
//! battle.remove_member(m1);
//! assert_eq!(battle.turn_order(), &[p1, p2]);
//! assert_eq!(battle.current_holder(), Some(p1));
//! assert_eq!(battle.step_pointer(), Some(p2));
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::combatant::CombatantId;
use crate::error::BattleError;

// =============================================================================
// Identity and Status
// =============================================================================

/// Unique identifier of a battle within one registry.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BattleId(u64);

impl BattleId {
    /// Creates a new `BattleId` from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BattleId({})", self.0)
    }
}

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status. `Ended` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    /// Accepting actions.
    Active,
    /// Finished; about to be (or already) dissolved.
    Ended,
}

// =============================================================================
// Battle
// =============================================================================

/// One battle's participants, turn order and transient flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battle {
    id: BattleId,
    /// Player ids, in join order, without duplicates.
    participants: Vec<CombatantId>,
    /// Monster ids, in join order.
    monsters: Vec<CombatantId>,
    /// Rotation of every member.
    turn_order: Vec<CombatantId>,
    /// Index of the current turn holder in `turn_order`.
    current: usize,
    status: BattleStatus,
    /// Combatants whose guard is up until their next turn or the next
    /// attack that reaches them.
    defending: BTreeSet<CombatantId>,
}

impl Battle {
    /// Creates an active battle where `first` holds the opening turn.
    ///
    /// Each side is `(id, is_monster)`.
    #[must_use]
    pub fn new(id: BattleId, first: (CombatantId, bool), second: (CombatantId, bool)) -> Self {
        let mut battle = Self {
            id,
            participants: Vec::new(),
            monsters: Vec::new(),
            turn_order: Vec::with_capacity(2),
            current: 0,
            status: BattleStatus::Active,
            defending: BTreeSet::new(),
        };
        battle.add_member(first.0, first.1);
        battle.add_member(second.0, second.1);
        battle
    }

    /// Returns the battle id.
    #[must_use]
    pub const fn id(&self) -> BattleId {
        self.id
    }

    /// Player members in join order.
    #[must_use]
    pub fn participants(&self) -> &[CombatantId] {
        &self.participants
    }

    /// Monster members in join order.
    #[must_use]
    pub fn monsters(&self) -> &[CombatantId] {
        &self.monsters
    }

    /// The turn rotation.
    #[must_use]
    pub fn turn_order(&self) -> &[CombatantId] {
        &self.turn_order
    }

    /// Index of the current turn holder.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current
    }

    /// Lifecycle status.
    #[must_use]
    pub const fn status(&self) -> BattleStatus {
        self.status
    }

    /// Returns true while the battle accepts actions.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == BattleStatus::Active
    }

    /// Adds a combatant at the end of the turn order.
    ///
    /// Returns false if it was already a member. The turn pointer is never
    /// touched, so joining mid-battle does not reset the rotation.
    pub fn add_member(&mut self, id: CombatantId, is_monster: bool) -> bool {
        if self.is_member(id) {
            return false;
        }
        if is_monster {
            self.monsters.push(id);
        } else {
            self.participants.push(id);
        }
        self.turn_order.push(id);
        true
    }

    /// Returns true if `id` is a player or monster of this battle.
    #[must_use]
    pub fn is_member(&self, id: CombatantId) -> bool {
        self.participants.contains(&id) || self.monsters.contains(&id)
    }

    /// Returns true if `id` is a monster of this battle.
    #[must_use]
    pub fn is_monster(&self, id: CombatantId) -> bool {
        self.monsters.contains(&id)
    }

    /// Every member in turn order.
    pub fn members(&self) -> impl Iterator<Item = CombatantId> + '_ {
        self.turn_order.iter().copied()
    }

    /// The combatant whose turn it is, while the battle is active.
    #[must_use]
    pub fn current_holder(&self) -> Option<CombatantId> {
        if !self.is_active() {
            return None;
        }
        self.turn_order.get(self.current).copied()
    }

    /// Returns true if `id` holds the current turn.
    #[must_use]
    pub fn is_turn_of(&self, id: CombatantId) -> bool {
        self.current_holder() == Some(id)
    }

    /// Everyone `id` may attack: all other members, in turn order.
    #[must_use]
    pub fn opponents_of(&self, id: CombatantId) -> Vec<CombatantId> {
        self.turn_order
            .iter()
            .copied()
            .filter(|other| *other != id)
            .collect()
    }

    /// Moves the pointer to the next slot and returns the new holder.
    ///
    /// Returns `None` if the turn order is empty.
    pub fn step_pointer(&mut self) -> Option<CombatantId> {
        if self.turn_order.is_empty() {
            self.current = 0;
            return None;
        }
        self.current = (self.current + 1) % self.turn_order.len();
        self.turn_order.get(self.current).copied()
    }

    /// Removes a combatant from every list and repairs the turn pointer.
    ///
    /// Returns false if `id` was not part of the battle.
    pub fn remove_member(&mut self, id: CombatantId) -> bool {
        let was_member = self.is_member(id);
        self.participants.retain(|p| *p != id);
        self.monsters.retain(|m| *m != id);
        self.defending.remove(&id);

        let Some(index) = self.turn_order.iter().position(|entry| *entry == id) else {
            return was_member;
        };
        self.turn_order.remove(index);

        if self.turn_order.is_empty() {
            self.current = 0;
        } else if index <= self.current {
            self.current = self
                .current
                .checked_sub(1)
                .unwrap_or(self.turn_order.len() - 1);
        }
        true
    }

    /// Raises `id`'s guard.
    pub fn set_defending(&mut self, id: CombatantId) {
        if self.is_member(id) {
            self.defending.insert(id);
        }
    }

    /// Returns true if `id`'s guard is up.
    #[must_use]
    pub fn is_defending(&self, id: CombatantId) -> bool {
        self.defending.contains(&id)
    }

    /// Lowers `id`'s guard, returning whether it was up.
    pub fn take_defending(&mut self, id: CombatantId) -> bool {
        self.defending.remove(&id)
    }

    /// Returns true once no fight is left: no monsters and at most one
    /// player, or no players at all.
    #[must_use]
    pub fn should_end(&self) -> bool {
        (self.monsters.is_empty() && self.participants.len() <= 1) || self.participants.is_empty()
    }

    /// Marks the battle ended. There is no way back.
    pub fn end(&mut self) {
        self.status = BattleStatus::Ended;
    }

    /// Verifies the turn-order invariants of an active battle.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), BattleError> {
        if !self.is_active() {
            return Ok(());
        }
        if self.current >= self.turn_order.len() {
            return Err(BattleError::TurnIndexOutOfRange {
                battle: self.id,
                index: self.current,
                len: self.turn_order.len(),
            });
        }
        let mut seen = HashSet::with_capacity(self.turn_order.len());
        for &entry in &self.turn_order {
            if !seen.insert(entry) {
                return Err(BattleError::DuplicateTurnEntry {
                    battle: self.id,
                    combatant: entry,
                });
            }
            if !self.is_member(entry) {
                return Err(BattleError::DanglingTurnEntry {
                    battle: self.id,
                    combatant: entry,
                });
            }
        }
        if let Some(&missing) = self
            .participants
            .iter()
            .chain(&self.monsters)
            .find(|member| !seen.contains(*member))
        {
            return Err(BattleError::DanglingTurnEntry {
                battle: self.id,
                combatant: missing,
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn corrupt_pointer(&mut self, index: usize) {
        self.current = index;
    }

    #[cfg(test)]
    pub(crate) fn corrupt_turn_order(&mut self, entries: Vec<CombatantId>) {
        self.turn_order = entries;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> CombatantId {
        CombatantId::new(raw)
    }

    /// Battle with turn order [1(P), 2(M), 3(P)].
    fn three_way() -> Battle {
        let mut battle = Battle::new(BattleId::new(0), (id(1), false), (id(2), true));
        battle.add_member(id(3), false);
        battle
    }

    mod membership_tests {
        use super::*;

        #[test]
        fn new_battle_starts_with_initiator() {
            let battle = Battle::new(BattleId::new(4), (id(1), false), (id(2), true));
            assert_eq!(battle.turn_order(), &[id(1), id(2)]);
            assert_eq!(battle.participants(), &[id(1)]);
            assert_eq!(battle.monsters(), &[id(2)]);
            assert_eq!(battle.current_holder(), Some(id(1)));
            assert!(battle.is_active());
            assert!(battle.check_invariants().is_ok());
        }

        #[test]
        fn add_member_is_idempotent() {
            let mut battle = three_way();
            assert!(!battle.add_member(id(3), false));
            assert!(!battle.add_member(id(2), true));
            assert_eq!(battle.turn_order().len(), 3);
        }

        #[test]
        fn join_keeps_pointer() {
            let mut battle = three_way();
            battle.step_pointer();
            battle.add_member(id(4), true);
            assert_eq!(battle.current_holder(), Some(id(2)));
        }

        #[test]
        fn opponents_exclude_self() {
            let battle = three_way();
            assert_eq!(battle.opponents_of(id(1)), vec![id(2), id(3)]);
        }
    }

    mod pointer_tests {
        use super::*;

        #[test]
        fn step_wraps_around() {
            let mut battle = three_way();
            assert_eq!(battle.step_pointer(), Some(id(2)));
            assert_eq!(battle.step_pointer(), Some(id(3)));
            assert_eq!(battle.step_pointer(), Some(id(1)));
        }

        #[test]
        fn removing_after_pointer_keeps_holder() {
            let mut battle = three_way();
            battle.remove_member(id(2));
            assert_eq!(battle.current_holder(), Some(id(1)));
            assert_eq!(battle.step_pointer(), Some(id(3)));
        }

        #[test]
        fn removing_before_pointer_keeps_holder() {
            let mut battle = three_way();
            battle.step_pointer();
            battle.step_pointer();
            assert_eq!(battle.current_holder(), Some(id(3)));

            battle.remove_member(id(1));
            assert_eq!(battle.current_holder(), Some(id(3)));
            assert_eq!(battle.step_pointer(), Some(id(2)));
        }

        #[test]
        fn removing_holder_hands_turn_to_successor_on_step() {
            let mut battle = three_way();
            battle.step_pointer();
            battle.remove_member(id(2));
            assert_eq!(battle.step_pointer(), Some(id(3)));
        }

        #[test]
        fn removing_holder_at_front_wraps_back() {
            let mut battle = three_way();
            battle.remove_member(id(1));
            assert_eq!(battle.current_index(), 1);
            assert_eq!(battle.step_pointer(), Some(id(2)));
        }

        #[test]
        fn removing_last_entry_empties_order() {
            let mut battle = Battle::new(BattleId::new(0), (id(1), false), (id(2), false));
            battle.remove_member(id(1));
            battle.remove_member(id(2));
            assert!(battle.turn_order().is_empty());
            assert_eq!(battle.current_index(), 0);
            assert_eq!(battle.step_pointer(), None);
        }

        #[test]
        fn removing_stranger_is_noop() {
            let mut battle = three_way();
            assert!(!battle.remove_member(id(9)));
            assert_eq!(battle.turn_order().len(), 3);
        }
    }

    mod defend_tests {
        use super::*;

        #[test]
        fn take_defending_is_one_shot() {
            let mut battle = three_way();
            battle.set_defending(id(1));
            assert!(battle.is_defending(id(1)));
            assert!(battle.take_defending(id(1)));
            assert!(!battle.take_defending(id(1)));
        }

        #[test]
        fn removal_drops_flag() {
            let mut battle = three_way();
            battle.set_defending(id(3));
            battle.remove_member(id(3));
            assert!(!battle.is_defending(id(3)));
        }

        #[test]
        fn outsiders_cannot_defend() {
            let mut battle = three_way();
            battle.set_defending(id(9));
            assert!(!battle.is_defending(id(9)));
        }
    }

    mod end_tests {
        use super::*;

        #[test]
        fn lone_player_ends() {
            let mut battle = three_way();
            battle.remove_member(id(2));
            assert!(!battle.should_end());
            battle.remove_member(id(3));
            assert!(battle.should_end());
        }

        #[test]
        fn monsters_without_players_end() {
            let mut battle = three_way();
            battle.remove_member(id(1));
            battle.remove_member(id(3));
            assert!(battle.should_end());
        }

        #[test]
        fn ended_battle_has_no_holder() {
            let mut battle = three_way();
            battle.end();
            assert_eq!(battle.status(), BattleStatus::Ended);
            assert_eq!(battle.current_holder(), None);
        }
    }

    mod invariant_tests {
        use super::*;

        #[test]
        fn pointer_out_of_range_detected() {
            let mut battle = three_way();
            battle.corrupt_pointer(7);
            assert_eq!(
                battle.check_invariants(),
                Err(BattleError::TurnIndexOutOfRange {
                    battle: BattleId::new(0),
                    index: 7,
                    len: 3,
                })
            );
        }

        #[test]
        fn duplicate_detected() {
            let mut battle = three_way();
            battle.corrupt_turn_order(vec![id(1), id(2), id(3), id(1)]);
            assert!(matches!(
                battle.check_invariants(),
                Err(BattleError::DuplicateTurnEntry { .. })
            ));
        }

        #[test]
        fn dangling_entry_detected() {
            let mut battle = three_way();
            battle.corrupt_turn_order(vec![id(1), id(2), id(3), id(8)]);
            assert!(matches!(
                battle.check_invariants(),
                Err(BattleError::DanglingTurnEntry { combatant, .. }) if combatant == id(8)
            ));
        }

        #[test]
        fn missing_member_detected() {
            let mut battle = three_way();
            battle.corrupt_turn_order(vec![id(1), id(2)]);
            assert!(matches!(
                battle.check_invariants(),
                Err(BattleError::DanglingTurnEntry { combatant, .. }) if combatant == id(3)
            ));
        }

        #[test]
        fn ended_battles_skip_checks() {
            let mut battle = three_way();
            battle.corrupt_pointer(99);
            battle.end();
            assert!(battle.check_invariants().is_ok());
        }
    }
}
