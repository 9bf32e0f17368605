//! Battle lifecycle: removal, departure, end check and teardown.

use tracing::{debug, info, warn};

use super::resolver::{Departure, Resolution};
use super::Engine;
use crate::battle::BattleId;
use crate::combatant::{CombatantId, Directory};
use crate::error::BattleError;
use crate::event::{ActionKind, CombatEvent, Notifier};

impl<D: Directory, N: Notifier> Engine<D, N> {
    /// Takes `id` out of its battle and repairs the turn pointer.
    ///
    /// Also drops its registry entry and clears its engaged flag. The end
    /// check is left to the caller, so the departure can be reported while
    /// the battle still exists.
    pub(super) fn remove_combatant(&mut self, battle_id: BattleId, id: CombatantId) -> Result<(), BattleError> {
        if self.battle_mut(battle_id)?.remove_member(id) {
            self.registry.release(id);
            self.directory.set_engaged(id, false);
            debug!(battle = %battle_id, combatant = %id, "combatant removed");
        }
        Ok(())
    }

    /// A combatant leaves of its own accord (`fled`) or by disconnecting.
    ///
    /// If it held the turn, the turn advances exactly once on its behalf and
    /// the new holder is dispatched.
    pub(super) fn depart(&mut self, battle_id: BattleId, id: CombatantId, fled: bool) -> Result<(), BattleError> {
        let was_holder = self.battle_ref(battle_id)?.is_turn_of(id);
        let mut resolution = Resolution::new(id, ActionKind::Flee);
        resolution.departure = Some(if fled {
            Departure::Fled
        } else {
            Departure::Disconnected
        });
        debug!(battle = %battle_id, combatant = %id, fled, was_holder, "combatant departing");

        self.conclude(battle_id, resolution, was_holder)?;
        if was_holder {
            self.dispatch(battle_id)?;
        }
        Ok(())
    }

    /// Ends the battle if no fight is left.
    ///
    /// Returns true if the battle is gone afterwards.
    pub(super) fn check_end(&mut self, battle_id: BattleId) -> bool {
        let Some(battle) = self.registry.get(battle_id) else {
            return true;
        };
        if !battle.should_end() {
            return false;
        }
        let message = if battle.participants().len() == 1 && battle.monsters().is_empty() {
            "You are victorious in battle!"
        } else {
            "The battle is over."
        };
        let survivors = self.tear_down(battle_id, message);
        info!(battle = %battle_id, survivors, "battle ended");
        true
    }

    /// Forcibly ends a battle whose state is corrupt.
    ///
    /// Only this battle is affected; every other battle keeps running.
    pub(super) fn abort(&mut self, battle_id: BattleId, error: &BattleError) {
        warn!(battle = %battle_id, %error, "aborting battle");
        self.tear_down(battle_id, "The battle collapses into confusion and is called off.");
    }

    /// Marks the battle ended, tells its players, releases every member and
    /// dissolves it. Returns the number of players told.
    fn tear_down(&mut self, battle_id: BattleId, message: &str) -> usize {
        let Some(battle) = self.registry.get_mut(battle_id) else {
            return 0;
        };
        battle.end();
        let players = battle.participants().to_vec();
        let members: Vec<CombatantId> = battle
            .members()
            .chain(battle.participants().iter().copied())
            .chain(battle.monsters().iter().copied())
            .collect();

        for &player in &players {
            self.notifier.notify(
                player,
                CombatEvent::CombatEnd {
                    battle_id,
                    message: message.to_owned(),
                },
            );
        }
        for id in members {
            self.directory.set_engaged(id, false);
        }
        self.registry.dissolve(battle_id);
        players.len()
    }
}
