//! Action resolution.
//!
//! Player actions arrive through [`Engine::submit_action`]; monster attacks
//! are only ever started by the scheduler. Every resolution, whatever its
//! source, finishes through [`Engine::conclude`], which prunes, advances,
//! reports and settles in that order.

use tracing::{debug, info};

use super::{build_view, combatant_status, Engine, IgnoreReason, Outcome};
use crate::battle::BattleId;
use crate::combatant::{CombatantId, Directory};
use crate::error::BattleError;
use crate::event::{ActionKind, CombatEvent, Notifier};

/// How a combatant left the battle during a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Departure {
    /// The target died; the actor is the killer.
    Slain(CombatantId),
    /// The actor fled.
    Fled,
    /// The actor's connection dropped.
    Disconnected,
}

/// Everything the report of one resolved action needs.
#[derive(Debug, Clone, Copy)]
pub(super) struct Resolution {
    pub actor: CombatantId,
    pub target: Option<CombatantId>,
    pub action: ActionKind,
    pub damage: Option<u32>,
    pub blocked: bool,
    pub departure: Option<Departure>,
}

impl Resolution {
    pub(super) fn new(actor: CombatantId, action: ActionKind) -> Self {
        Self {
            actor,
            target: None,
            action,
            damage: None,
            blocked: false,
            departure: None,
        }
    }

    /// The combatant that leaves the battle, if any.
    fn departed(&self) -> Option<CombatantId> {
        match self.departure? {
            Departure::Slain(victim) => Some(victim),
            Departure::Fled | Departure::Disconnected => Some(self.actor),
        }
    }
}

impl<D: Directory, N: Notifier> Engine<D, N> {
    // -------------------------------------------------------------------------
    // Player actions
    // -------------------------------------------------------------------------

    /// Resolves an attack by the current turn holder.
    pub(super) fn attack(
        &mut self,
        battle_id: BattleId,
        actor: CombatantId,
        explicit: Option<CombatantId>,
    ) -> Result<Outcome, BattleError> {
        let battle = self.battle_ref(battle_id)?;
        let target = match explicit {
            Some(target) if target == actor => {
                return Ok(Outcome::Ignored(IgnoreReason::InvalidTarget));
            }
            Some(target) => target,
            None => {
                let opponents: Vec<CombatantId> = battle
                    .opponents_of(actor)
                    .into_iter()
                    .filter(|id| self.directory.is_alive(*id))
                    .collect();
                match opponents.as_slice() {
                    [] => return Ok(Outcome::Ignored(IgnoreReason::NotInBattle)),
                    [only] => *only,
                    _ => {
                        let targets = opponents
                            .iter()
                            .filter_map(|id| combatant_status(&self.directory, battle, *id))
                            .collect();
                        self.notifier
                            .notify(actor, CombatEvent::TargetRequest { targets });
                        debug!(battle = %battle_id, actor = %actor, choices = opponents.len(), "target required");
                        return Ok(Outcome::TargetRequired { targets: opponents });
                    }
                }
            }
        };
        if !battle.is_member(target) || !self.directory.is_alive(target) {
            debug!(battle = %battle_id, actor = %actor, target = %target, "stale target");
            return Ok(Outcome::StaleTarget(target));
        }

        let mut resolution = Resolution::new(actor, ActionKind::Attack);
        resolution.target = Some(target);

        let was_defending = self.battle_mut(battle_id)?.take_defending(target);
        if was_defending && self.dice.chance(self.config.block_chance) {
            debug!(battle = %battle_id, actor = %actor, target = %target, "attack blocked");
            resolution.blocked = true;
            self.conclude(battle_id, resolution, true)?;
            return Ok(Outcome::Blocked {
                attacker: actor,
                target,
            });
        }

        let damage = self.dice.roll(self.config.attack_damage);
        let (killed, remaining) = self.strike(target, damage)?;
        debug!(battle = %battle_id, actor = %actor, target = %target, damage, remaining, "attack hit");

        resolution.damage = Some(damage);
        resolution.departure = killed.then_some(Departure::Slain(target));
        self.conclude(battle_id, resolution, true)?;

        Ok(if killed {
            Outcome::Killed {
                attacker: actor,
                target,
                damage,
            }
        } else {
            Outcome::Hit {
                attacker: actor,
                target,
                damage,
                remaining,
            }
        })
    }

    /// Raises the turn holder's guard and passes the turn.
    pub(super) fn defend(&mut self, battle_id: BattleId, actor: CombatantId) -> Result<Outcome, BattleError> {
        self.battle_mut(battle_id)?.set_defending(actor);
        debug!(battle = %battle_id, actor = %actor, "defending");
        self.conclude(battle_id, Resolution::new(actor, ActionKind::Defend), true)?;
        Ok(Outcome::Defended { actor })
    }

    // -------------------------------------------------------------------------
    // Monster turns
    // -------------------------------------------------------------------------

    /// Runs one monster turn: a strike at a random living player.
    ///
    /// Monsters never defend and are never blocked. A defending player takes
    /// damage from the reduced range instead, which consumes their guard.
    pub(super) fn monster_turn(&mut self, battle_id: BattleId, monster: CombatantId) -> Result<(), BattleError> {
        let battle = self.battle_ref(battle_id)?;
        let prey: Vec<CombatantId> = battle
            .participants()
            .iter()
            .copied()
            .filter(|player| self.directory.is_alive(*player))
            .collect();
        if prey.is_empty() {
            self.step_to_live(battle_id)?;
            return Ok(());
        }

        let target = prey[self.dice.pick(prey.len()) % prey.len()];
        let range = if self.battle_mut(battle_id)?.take_defending(target) {
            self.config.monster_damage_vs_defending
        } else {
            self.config.monster_damage
        };
        let damage = self.dice.roll(range);
        let (killed, remaining) = self.strike(target, damage)?;
        debug!(battle = %battle_id, actor = %monster, target = %target, damage, remaining, "monster attack");

        let mut resolution = Resolution::new(monster, ActionKind::Attack);
        resolution.target = Some(target);
        resolution.damage = Some(damage);
        resolution.departure = killed.then_some(Departure::Slain(target));
        self.conclude(battle_id, resolution, true)
    }

    /// Applies damage through the directory. Returns `(killed, remaining)`.
    fn strike(&mut self, target: CombatantId, damage: u32) -> Result<(bool, i32), BattleError> {
        let combatant = self
            .directory
            .combatant_mut(target)
            .ok_or(BattleError::UnknownCombatant(target))?;
        let killed = combatant.apply_damage(damage);
        Ok((killed, combatant.hit_points()))
    }

    // -------------------------------------------------------------------------
    // Settlement
    // -------------------------------------------------------------------------

    /// Finishes a resolution: prune the departed, advance the pointer if
    /// `advance`, report to every player, bury the dead, then end the
    /// battle if no fight is left.
    ///
    /// The pointer moves before the report so every view already names the
    /// next turn holder.
    pub(super) fn conclude(
        &mut self,
        battle_id: BattleId,
        resolution: Resolution,
        advance: bool,
    ) -> Result<(), BattleError> {
        let departed = resolution.departed();
        if let Some(id) = departed {
            self.remove_combatant(battle_id, id)?;
        }
        if advance && !self.battle_ref(battle_id)?.should_end() {
            self.step_to_live(battle_id)?;
        }

        self.report(battle_id, &resolution)?;
        match resolution.departure {
            Some(Departure::Slain(victim)) => self.bury(battle_id, victim, resolution.actor),
            Some(Departure::Fled) => self.notifier.notify(
                resolution.actor,
                CombatEvent::CombatEnd {
                    battle_id,
                    message: "You flee from battle.".to_owned(),
                },
            ),
            Some(Departure::Disconnected) | None => {}
        }

        self.check_end(battle_id);
        Ok(())
    }

    /// Sends the `CombatAction` of a resolution to every player involved.
    fn report(&self, battle_id: BattleId, resolution: &Resolution) -> Result<(), BattleError> {
        let battle = self.battle_ref(battle_id)?;
        let actor_name = self.name_of(resolution.actor);
        let target_name = resolution.target.map(|target| self.name_of(target));

        let mut recipients = battle.participants().to_vec();
        let departed_player = resolution
            .departed()
            .filter(|_| !matches!(resolution.departure, Some(Departure::Disconnected)))
            .filter(|id| self.directory.combatant(*id).is_some_and(|c| !c.is_monster()));
        if let Some(id) = departed_player {
            if !recipients.contains(&id) {
                recipients.push(id);
            }
        }

        for recipient in recipients {
            let message = describe(resolution, recipient, &actor_name, target_name.as_deref());
            self.notifier.notify(
                recipient,
                CombatEvent::CombatAction {
                    actor: resolution.actor,
                    target: resolution.target,
                    action: resolution.action,
                    damage_dealt: resolution.damage.filter(|_| recipient == resolution.actor),
                    damage_taken: resolution.damage.filter(|_| Some(recipient) == resolution.target),
                    blocked: resolution.blocked,
                    message,
                    view: build_view(&self.directory, battle, recipient),
                },
            );
        }
        Ok(())
    }

    /// Death notices, then the corpse leaves the map.
    fn bury(&mut self, battle_id: BattleId, victim: CombatantId, killer: CombatantId) {
        let victim_name = self.name_of(victim);
        let killer_name = self.name_of(killer);
        let victim_is_monster = self.directory.combatant(victim).is_some_and(|c| c.is_monster());
        let witnesses = self
            .registry
            .get(battle_id)
            .map(|battle| battle.participants().to_vec())
            .unwrap_or_default();

        if victim_is_monster {
            for &player in &witnesses {
                self.notifier.notify(
                    player,
                    CombatEvent::MonsterDeath {
                        monster_id: victim,
                        killer_id: killer,
                    },
                );
            }
            self.notifier
                .announce(&format!("{killer_name} has slain {victim_name}!"));
        } else {
            for &player in witnesses.iter().chain(std::iter::once(&victim)) {
                self.notifier
                    .notify(player, CombatEvent::PlayerDeath { player_id: victim });
            }
            self.notifier.notify(
                victim,
                CombatEvent::CombatEnd {
                    battle_id,
                    message: "Thou art dead.".to_owned(),
                },
            );
            self.notifier
                .announce(&format!("{victim_name} has been slain by {killer_name}!"));
        }

        self.directory.remove_from_world(victim);
        info!(battle = %battle_id, victim = %victim, killer = %killer, "combatant slain");
    }
}

/// Text of a `CombatAction` for one recipient.
fn describe(resolution: &Resolution, recipient: CombatantId, actor: &str, target: Option<&str>) -> String {
    let target = target.unwrap_or("nobody");
    let is_actor = recipient == resolution.actor;
    let is_target = Some(recipient) == resolution.target;

    match resolution.action {
        ActionKind::Attack if resolution.blocked => match (is_actor, is_target) {
            (true, _) => format!("{target} blocks your attack!"),
            (_, true) => format!("You block {actor}'s attack!"),
            _ => format!("{target} blocks {actor}'s attack."),
        },
        ActionKind::Attack => {
            let damage = resolution.damage.unwrap_or_default();
            let slain = matches!(resolution.departure, Some(Departure::Slain(_)));
            match (is_actor, is_target) {
                (true, _) if slain => {
                    format!("You attack {target}....You deal {damage} damage! {target} has been defeated!")
                }
                (true, _) => format!("You attack {target}....You deal {damage} damage!"),
                (_, true) => format!("{actor} attacks you....You take {damage} damage!"),
                _ if slain => format!("{actor} hits {target} for {damage} damage. {target} falls!"),
                _ => format!("{actor} hits {target} for {damage} damage."),
            }
        }
        ActionKind::Defend if is_actor => "You raise your guard.".to_owned(),
        ActionKind::Defend => format!("{actor} raises their guard."),
        ActionKind::Flee if is_actor => "You flee from battle.".to_owned(),
        ActionKind::Flee if matches!(resolution.departure, Some(Departure::Disconnected)) => {
            format!("{actor} has left the battle.")
        }
        ActionKind::Flee => format!("{actor} flees from battle!"),
    }
}
