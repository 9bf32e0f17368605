//! Turn scheduling.
//!
//! The scheduler owns two moves:
//!
//! - [`step_to_live`](Engine::step_to_live) moves the turn pointer one slot
//!   forward, pruning members that died or vanished outside the engine on
//!   the way.
//! - [`dispatch`](Engine::dispatch) hands the turn to whoever holds it.
//!   Monster turns run synchronously; a player turn suspends the battle
//!   until that player acts or disconnects.
//!
//! Both loops are bounded by the length of the turn order. Running past the
//! bound means the battle's state is corrupt and surfaces as
//! [`BattleError::SchedulerStalled`].

use tracing::{debug, warn};

use super::{turn_fields, Engine};
use crate::battle::BattleId;
use crate::combatant::{CombatantId, Directory};
use crate::error::BattleError;
use crate::event::{CombatEvent, Notifier};

impl<D: Directory, N: Notifier> Engine<D, N> {
    /// Moves the pointer to the next live member and returns it.
    ///
    /// Returns `None` once the battle has no fight left; the caller is then
    /// expected to run the end check.
    pub(super) fn step_to_live(&mut self, battle_id: BattleId) -> Result<Option<CombatantId>, BattleError> {
        let bound = self.battle_ref(battle_id)?.turn_order().len() + 1;
        for _ in 0..bound {
            let battle = self.battle_mut(battle_id)?;
            if battle.should_end() {
                return Ok(None);
            }
            let Some(holder) = battle.step_pointer() else {
                return Ok(None);
            };
            if self.directory.is_alive(holder) {
                return Ok(Some(holder));
            }
            warn!(battle = %battle_id, combatant = %holder, "pruning vanished combatant from turn order");
            self.remove_combatant(battle_id, holder)?;
        }
        Err(BattleError::SchedulerStalled {
            battle: battle_id,
            steps: bound,
        })
    }

    /// Runs monster turns until a player holds the turn, then announces it.
    ///
    /// Ends the battle instead if no fight is left.
    pub(super) fn dispatch(&mut self, battle_id: BattleId) -> Result<(), BattleError> {
        let Some(battle) = self.registry.get(battle_id) else {
            return Ok(());
        };
        let bound = battle.turn_order().len();
        let mut steps = 0;

        loop {
            let Some(battle) = self.registry.get(battle_id) else {
                return Ok(());
            };
            if !battle.is_active() {
                return Ok(());
            }
            if battle.should_end() {
                self.check_end(battle_id);
                return Ok(());
            }
            battle.check_invariants()?;
            let holder = battle
                .current_holder()
                .ok_or(BattleError::TurnIndexOutOfRange {
                    battle: battle_id,
                    index: battle.current_index(),
                    len: battle.turn_order().len(),
                })?;
            let holder_is_monster = battle.is_monster(holder);

            if steps > bound {
                return Err(BattleError::SchedulerStalled {
                    battle: battle_id,
                    steps,
                });
            }
            steps += 1;

            if !self.directory.is_alive(holder) {
                warn!(battle = %battle_id, combatant = %holder, "turn holder vanished");
                self.remove_combatant(battle_id, holder)?;
                if self.step_to_live(battle_id)?.is_none() {
                    self.check_end(battle_id);
                    return Ok(());
                }
                continue;
            }

            if !holder_is_monster {
                self.begin_player_turn(battle_id, holder)?;
                return Ok(());
            }
            self.monster_turn(battle_id, holder)?;
        }
    }

    /// Suspends the battle on `holder`'s turn and tells every player.
    fn begin_player_turn(&mut self, battle_id: BattleId, holder: CombatantId) -> Result<(), BattleError> {
        let battle = self.battle_mut(battle_id)?;
        battle.take_defending(holder);

        debug!(battle = %battle_id, holder = %holder, "player turn");
        let name = self.name_of(holder);
        let battle = self.battle_ref(battle_id)?;
        for &player in battle.participants() {
            let (Some(active_player), your_turn) = turn_fields(battle, player) else {
                continue;
            };
            let message = if your_turn {
                "It's your turn!".to_owned()
            } else {
                format!("Waiting for {name}...")
            };
            self.notifier.notify(
                player,
                CombatEvent::TurnNotification {
                    active_player,
                    your_turn,
                    message,
                },
            );
        }
        Ok(())
    }
}
