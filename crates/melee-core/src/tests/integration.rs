//! End-to-end battle scenarios through the engine façade.

use glam::IVec2;

use crate::combatant::{CombatantId, Directory};
use crate::engine::{Action, IgnoreReason, Outcome};
use crate::error::BattleError;
use crate::event::CombatEvent;
use crate::registry::Engagement;
use crate::world::{StatusFlags, World};

use super::helpers::{
    events_of_kind, holder_of, hp, scripted_engine, setup_duel, setup_three_way, ThreeWay,
};

fn flags(engine: &super::TestEngine, id: CombatantId) -> StatusFlags {
    engine.directory().get(id).map(|entity| entity.flags).unwrap_or_default()
}

fn last_message(events: &[CombatEvent]) -> Option<&str> {
    events.iter().rev().find_map(|event| match event {
        CombatEvent::CombatAction { message, .. }
        | CombatEvent::CombatEnd { message, .. }
        | CombatEvent::CombatStart { message, .. }
        | CombatEvent::TurnNotification { message, .. } => Some(message.as_str()),
        _ => None,
    })
}

// =============================================================================
// Engagement
// =============================================================================

mod engagement_tests {
    use super::*;

    #[test]
    fn collision_merges_into_existing_battle() {
        let mut world = World::new();
        let a = world.spawn_player("alice", 30, IVec2::new(0, 0));
        let b = world.spawn_monster("Goblin", 20, IVec2::new(0, 1));
        let c = world.spawn_monster("Rat", 5, IVec2::new(2, 2));
        let (mut engine, _dice) = scripted_engine(world);

        let x = engine.engage(a, b).unwrap().battle();
        assert_eq!(engine.battle(x).unwrap().turn_order(), &[a, b]);

        let joined = engine.engage_at(a, IVec2::new(2, 2)).unwrap();
        assert_eq!(joined, Some(Engagement::Joined { battle: x, newcomer: c }));
        assert_eq!(engine.battle(x).unwrap().turn_order(), &[a, b, c]);
        assert_eq!(engine.registry().len(), 1);
        assert!(flags(&engine, c).contains(StatusFlags::ENGAGED));

        assert_eq!(engine.engage(c, b), Err(BattleError::MonsterVsMonster(c, b)));
        assert_eq!(engine.engage(b, a).unwrap(), Engagement::AlreadyEngaged(x));
        assert_eq!(engine.battle(x).unwrap().turn_order(), &[a, b, c]);
    }

    #[test]
    fn start_event_describes_opponents() {
        let mut world = World::new();
        let hero = world.spawn_player("alice", 30, IVec2::ZERO);
        let goblin = world.spawn_monster("Goblin", 20, IVec2::ONE);
        let (mut engine, _dice) = scripted_engine(world);

        engine.engage(hero, goblin).unwrap();

        let starts = events_of_kind(&engine, hero, "combat_start");
        assert_eq!(starts.len(), 1);
        let CombatEvent::CombatStart { message, view, .. } = &starts[0] else {
            panic!("expected combat_start");
        };
        assert_eq!(message, "alice engages Goblin in combat!");
        assert!(view.your_turn);
        assert_eq!(view.your_hp, Some(30));
        assert_eq!(view.opponents.len(), 1);
        assert_eq!(view.opponents[0].id, goblin);
        assert!(view.opponents[0].is_monster);

        let json = serde_json::to_value(&starts[0]).unwrap();
        assert_eq!(json["type"], "combat_start");
        assert_eq!(json["your_turn"], true);
        assert_eq!(json["opponents"][0]["hp"], 20);
    }

    #[test]
    fn joining_player_refreshes_everyone() {
        let ThreeWay { mut engine, p1, m1, .. } = setup_three_way(20);
        let p3 = engine.directory_mut().spawn_player("carol", 30, IVec2::new(4, 4));

        engine.engage(p3, m1).unwrap();

        for player in [p1, p3] {
            let starts = events_of_kind(&engine, player, "combat_start");
            assert_eq!(last_message(&starts), Some("carol joins the battle!"));
        }
        assert_eq!(holder_of(&engine, p3), Some(p1));
    }

    #[test]
    fn monster_initiated_battle_runs_opening_turn() {
        let mut world = World::new();
        let hero = world.spawn_player("alice", 30, IVec2::ZERO);
        let goblin = world.spawn_monster("Goblin", 20, IVec2::ONE);
        let (mut engine, dice) = scripted_engine(world);
        dice.push_roll(4);

        engine.engage(goblin, hero).unwrap();

        assert_eq!(hp(&engine, hero), 26);
        assert_eq!(holder_of(&engine, hero), Some(hero));
        let kinds: Vec<&str> = engine
            .notifier()
            .events_for(hero)
            .iter()
            .map(CombatEvent::kind)
            .collect();
        assert_eq!(kinds, vec!["combat_start", "combat_action", "turn_notification"]);
    }

    #[test]
    fn refused_engagements_change_nothing() {
        let mut world = World::new();
        let hero = world.spawn_player("alice", 30, IVec2::ZERO);
        let corpse = world.spawn_monster("Goblin", 20, IVec2::ONE);
        world.combatant_mut(corpse).unwrap().apply_damage(50);
        let (mut engine, _dice) = scripted_engine(world);

        assert_eq!(engine.engage(hero, corpse), Err(BattleError::AlreadyDead(corpse)));
        let ghost = CombatantId::new(77);
        assert_eq!(engine.engage(hero, ghost), Err(BattleError::UnknownCombatant(ghost)));
        assert_eq!(engine.engage_at(hero, IVec2::new(9, 9)), Ok(None));
        assert!(engine.registry().is_empty());
        assert!(engine.notifier().is_empty());
    }
}

// =============================================================================
// Action Resolution
// =============================================================================

mod action_tests {
    use super::*;

    #[test]
    fn killing_blow_repairs_order_and_advances_once() {
        let ThreeWay { mut engine, dice, p1, m1, p2 } = setup_three_way(5);
        dice.push_roll(8);

        let outcome = engine.submit_action(p1, Action::Attack, Some(m1));

        assert_eq!(
            outcome,
            Outcome::Killed {
                attacker: p1,
                target: m1,
                damage: 8
            }
        );
        let battle = engine.battle(engine.battle_for(p1).unwrap()).unwrap();
        assert_eq!(battle.turn_order(), &[p1, p2]);
        assert_eq!(battle.current_holder(), Some(p2));

        let actions = events_of_kind(&engine, p1, "combat_action");
        assert!(last_message(&actions).unwrap().ends_with("Goblin has been defeated!"));
        assert_eq!(events_of_kind(&engine, p1, "monster_death").len(), 1);
        assert_eq!(events_of_kind(&engine, p2, "monster_death").len(), 1);

        let turns = events_of_kind(&engine, p2, "turn_notification");
        assert!(matches!(
            turns.last(),
            Some(CombatEvent::TurnNotification { your_turn: true, active_player, .. }) if *active_player == p2
        ));

        assert_eq!(engine.directory().monster_at(IVec2::new(0, 1)), None);
        assert!(flags(&engine, m1).contains(StatusFlags::SLAIN));
        assert_eq!(engine.battle_for(m1), None);
        assert_eq!(
            engine.notifier().take_announcements(),
            vec!["alice has slain Goblin!".to_string()]
        );
    }

    #[test]
    fn ambiguous_attack_requests_target() {
        let ThreeWay { mut engine, dice, p1, m1, p2 } = setup_three_way(20);

        let outcome = engine.submit_action(p1, Action::Attack, None);

        assert_eq!(outcome, Outcome::TargetRequired { targets: vec![m1, p2] });
        assert_eq!(hp(&engine, m1), 20);
        assert_eq!(hp(&engine, p2), 30);
        assert_eq!(holder_of(&engine, p1), Some(p1));
        let requests = events_of_kind(&engine, p1, "target_request");
        assert!(matches!(&requests[..], [CombatEvent::TargetRequest { targets }] if targets.len() == 2));

        dice.push_roll(4);
        let outcome = engine.submit_action(p1, Action::Attack, Some(m1));
        assert_eq!(
            outcome,
            Outcome::Hit {
                attacker: p1,
                target: m1,
                damage: 4,
                remaining: 16
            }
        );
    }

    #[test]
    fn stale_and_invalid_targets_are_no_ops() {
        let ThreeWay { mut engine, p1, m1, .. } = setup_three_way(20);
        let stranger = CombatantId::new(99);

        assert_eq!(
            engine.submit_action(p1, Action::Attack, Some(stranger)),
            Outcome::StaleTarget(stranger)
        );
        assert_eq!(
            engine.submit_action(p1, Action::Attack, Some(p1)),
            Outcome::Ignored(IgnoreReason::InvalidTarget)
        );
        assert_eq!(holder_of(&engine, p1), Some(p1));
        assert_eq!(hp(&engine, m1), 20);
        assert!(engine.notifier().is_empty());
    }

    #[test]
    fn out_of_turn_input_is_ignored() {
        let ThreeWay { mut engine, p1, m1, p2, .. } = setup_three_way(20);

        assert_eq!(
            engine.submit_action(p2, Action::Attack, Some(m1)),
            Outcome::Ignored(IgnoreReason::NotYourTurn)
        );
        assert_eq!(
            engine.submit_action(CombatantId::new(42), Action::Defend, None),
            Outcome::Ignored(IgnoreReason::NotInBattle)
        );
        assert_eq!(hp(&engine, m1), 20);
        assert_eq!(holder_of(&engine, p1), Some(p1));
    }

    #[test]
    fn dead_turn_holder_cannot_act() {
        let ThreeWay { mut engine, dice, p1, m1, p2 } = setup_three_way(20);
        let battle_id = engine.battle_for(p1).unwrap();
        engine.directory_mut().combatant_mut(p1).unwrap().apply_damage(100);
        // Only the goblin rolls, so this lands on bob.
        dice.push_roll(5);

        let outcome = engine.submit_action(p1, Action::Attack, Some(m1));

        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::NotInBattle));
        assert_eq!(hp(&engine, m1), 20);
        assert_eq!(engine.battle_for(p1), None);

        let battle = engine.battle(battle_id).unwrap();
        assert_eq!(battle.turn_order(), &[m1, p2]);
        assert_eq!(battle.current_holder(), Some(p2));
        assert_eq!(hp(&engine, p2), 25);
        let turns = events_of_kind(&engine, p2, "turn_notification");
        assert!(matches!(
            turns.last(),
            Some(CombatEvent::TurnNotification { your_turn: true, active_player, .. }) if *active_player == p2
        ));
    }

    #[test]
    fn dead_opponents_are_not_targets() {
        let ThreeWay { mut engine, dice, p1, m1, p2 } = setup_three_way(20);
        engine.directory_mut().combatant_mut(p2).unwrap().apply_damage(100);
        dice.push_roll(3);

        let outcome = engine.submit_action(p1, Action::Attack, None);

        assert_eq!(
            outcome,
            Outcome::Hit {
                attacker: p1,
                target: m1,
                damage: 3,
                remaining: 17
            }
        );
        assert!(events_of_kind(&engine, p1, "target_request").is_empty());
        assert_eq!(engine.battle_for(p2), None);
        assert_eq!(holder_of(&engine, p1), Some(p1));
    }

    #[test]
    fn successful_block_leaves_hit_points() {
        let mut world = World::new();
        let p1 = world.spawn_player("alice", 30, IVec2::ZERO);
        let p2 = world.spawn_player("bob", 30, IVec2::ONE);
        let (mut engine, dice) = scripted_engine(world);
        engine.engage(p1, p2).unwrap();

        assert_eq!(engine.submit_action(p1, Action::Defend, None), Outcome::Defended { actor: p1 });
        let battle = engine.battle_for(p1).unwrap();
        assert!(engine.battle(battle).unwrap().is_defending(p1));

        dice.push_chance(true);
        assert_eq!(
            engine.submit_action(p2, Action::Attack, None),
            Outcome::Blocked { attacker: p2, target: p1 }
        );
        assert_eq!(hp(&engine, p1), 30);
        assert!(!engine.battle(battle).unwrap().is_defending(p1));

        let actions = events_of_kind(&engine, p1, "combat_action");
        assert!(matches!(
            actions.last(),
            Some(CombatEvent::CombatAction { blocked: true, damage_taken: None, .. })
        ));
        assert_eq!(last_message(&actions), Some("You block bob's attack!"));
    }

    #[test]
    fn failed_block_still_spends_guard() {
        let mut world = World::new();
        let p1 = world.spawn_player("alice", 30, IVec2::ZERO);
        let p2 = world.spawn_player("bob", 30, IVec2::ONE);
        let p3 = world.spawn_player("carol", 30, IVec2::NEG_ONE);
        let (mut engine, dice) = scripted_engine(world);
        engine.engage(p1, p2).unwrap();
        engine.engage(p3, p1).unwrap();

        engine.submit_action(p1, Action::Defend, None);
        dice.push_chance(false).push_roll(5);
        assert_eq!(
            engine.submit_action(p2, Action::Attack, Some(p1)),
            Outcome::Hit {
                attacker: p2,
                target: p1,
                damage: 5,
                remaining: 25
            }
        );
        let battle = engine.battle_for(p1).unwrap();
        assert!(!engine.battle(battle).unwrap().is_defending(p1));
        assert_eq!(holder_of(&engine, p1), Some(p3));
    }

    #[test]
    fn guard_drops_when_owner_turn_comes_round() {
        let mut world = World::new();
        let p1 = world.spawn_player("alice", 30, IVec2::ZERO);
        let p2 = world.spawn_player("bob", 30, IVec2::ONE);
        let (mut engine, _dice) = scripted_engine(world);
        let battle = engine.engage(p1, p2).unwrap().battle();

        engine.submit_action(p1, Action::Defend, None);
        engine.submit_action(p2, Action::Defend, None);

        let battle = engine.battle(battle).unwrap();
        assert_eq!(battle.current_holder(), Some(p1));
        assert!(!battle.is_defending(p1));
        assert!(battle.is_defending(p2));
    }
}

// =============================================================================
// Monster Turns
// =============================================================================

mod monster_tests {
    use super::*;

    #[test]
    fn monster_answers_immediately() {
        let (mut engine, dice, player, monster) = setup_duel(30, 20);
        dice.push_roll(6).push_roll(6);

        engine.submit_action(player, Action::Attack, None);

        assert_eq!(hp(&engine, monster), 14);
        assert_eq!(hp(&engine, player), 24);
        assert_eq!(holder_of(&engine, player), Some(player));
        let taken = events_of_kind(&engine, player, "combat_action");
        assert_eq!(last_message(&taken), Some("Goblin attacks you....You take 6 damage!"));
    }

    #[test]
    fn defending_player_takes_reduced_damage() {
        let (mut engine, dice, player, _monster) = setup_duel(30, 20);
        dice.push_roll(6);

        assert_eq!(
            engine.submit_action(player, Action::Defend, None),
            Outcome::Defended { actor: player }
        );

        assert_eq!(hp(&engine, player), 27);
        let battle = engine.battle_for(player).unwrap();
        assert!(!engine.battle(battle).unwrap().is_defending(player));
    }

    #[test]
    fn monster_picks_among_living_players() {
        let ThreeWay { mut engine, dice, p1, m1, p2 } = setup_three_way(20);
        dice.push_roll(3).push_pick(1).push_roll(2);

        engine.submit_action(p1, Action::Attack, Some(m1));

        assert_eq!(hp(&engine, m1), 17);
        assert_eq!(hp(&engine, p2), 28);
        assert_eq!(hp(&engine, p1), 30);
        assert_eq!(holder_of(&engine, p1), Some(p2));
    }

    #[test]
    fn player_death_ends_battle_without_players() {
        let (mut engine, dice, player, monster) = setup_duel(2, 20);
        dice.push_roll(1).push_roll(6);

        let outcome = engine.submit_action(player, Action::Attack, None);

        assert!(matches!(outcome, Outcome::Hit { remaining: 19, .. }));
        assert!(engine.registry().is_empty());
        assert_eq!(engine.battle_for(player), None);
        assert_eq!(engine.battle_for(monster), None);
        assert!(!flags(&engine, monster).contains(StatusFlags::ENGAGED));
        assert!(flags(&engine, player).contains(StatusFlags::SLAIN));

        assert_eq!(events_of_kind(&engine, player, "player_death").len(), 1);
        let ends = events_of_kind(&engine, player, "combat_end");
        assert_eq!(last_message(&ends), Some("Thou art dead."));
        assert_eq!(
            engine.notifier().take_announcements(),
            vec!["alice has been slain by Goblin!".to_string()]
        );
    }

    #[test]
    fn vanished_members_are_pruned_on_the_way() {
        let ThreeWay { mut engine, dice, p1, m1, p2 } = setup_three_way(20);
        engine.directory_mut().combatant_mut(p2).unwrap().apply_damage(100);
        dice.push_roll(4);

        engine.submit_action(p1, Action::Attack, Some(m1));

        let battle = engine.battle(engine.battle_for(p1).unwrap()).unwrap();
        assert_eq!(battle.turn_order(), &[p1, m1]);
        assert_eq!(battle.current_holder(), Some(p1));
        assert_eq!(hp(&engine, p1), 29);
        assert_eq!(engine.battle_for(p2), None);
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

mod lifecycle_tests {
    use super::*;

    #[test]
    fn last_player_standing_is_victorious() {
        let (mut engine, dice, player, monster) = setup_duel(30, 3);
        dice.push_roll(8);

        assert!(matches!(
            engine.submit_action(player, Action::Attack, None),
            Outcome::Killed { target, .. } if target == monster
        ));
        assert!(engine.registry().is_empty());
        assert_eq!(engine.battle_for(player), None);
        assert!(!flags(&engine, player).contains(StatusFlags::ENGAGED));

        let ends = events_of_kind(&engine, player, "combat_end");
        assert_eq!(last_message(&ends), Some("You are victorious in battle!"));
        let actions = events_of_kind(&engine, player, "combat_action");
        assert!(matches!(
            actions.last(),
            Some(CombatEvent::CombatAction { view, damage_dealt: Some(8), .. })
                if !view.your_turn && view.active_player.is_none()
        ));

        assert_eq!(
            engine.submit_action(player, Action::Attack, None),
            Outcome::Ignored(IgnoreReason::NotInBattle)
        );
    }

    #[test]
    fn disconnect_of_turn_holder_advances_once() {
        let ThreeWay { mut engine, p1, m1, p2, .. } = setup_three_way(20);

        let left = engine.on_disconnect(p1);

        let battle = engine.battle(left.unwrap()).unwrap();
        assert_eq!(battle.turn_order(), &[m1, p2]);
        assert_eq!(battle.current_holder(), Some(p2));
        assert_eq!(hp(&engine, p2), 29);
        assert_eq!(engine.battle_for(p1), None);
        assert!(engine.notifier().events_for(p1).is_empty());

        let actions = events_of_kind(&engine, p2, "combat_action");
        assert!(actions.iter().any(|event| matches!(
            event,
            CombatEvent::CombatAction { message, .. } if message == "alice has left the battle."
        )));
    }

    #[test]
    fn disconnect_of_waiting_player_keeps_turn() {
        let ThreeWay { mut engine, p1, m1, p2, .. } = setup_three_way(20);

        engine.on_disconnect(p2);

        let battle = engine.battle(engine.battle_for(p1).unwrap()).unwrap();
        assert_eq!(battle.turn_order(), &[p1, m1]);
        assert_eq!(battle.current_holder(), Some(p1));
        assert_eq!(hp(&engine, p1), 30);
        assert_eq!(engine.on_disconnect(p2), None);
    }

    #[test]
    fn disconnect_in_duel_hands_victory_to_survivor() {
        let mut world = World::new();
        let p1 = world.spawn_player("alice", 30, IVec2::ZERO);
        let p2 = world.spawn_player("bob", 30, IVec2::ONE);
        let (mut engine, _dice) = scripted_engine(world);
        engine.engage(p1, p2).unwrap();

        engine.on_disconnect(p1);

        assert!(engine.registry().is_empty());
        let ends = events_of_kind(&engine, p2, "combat_end");
        assert_eq!(last_message(&ends), Some("You are victorious in battle!"));
    }

    #[test]
    fn fleeing_leaves_the_world_intact() {
        let (mut engine, _dice, player, monster) = setup_duel(30, 20);

        assert_eq!(
            engine.submit_action(player, Action::Flee, None),
            Outcome::Fled { actor: player }
        );

        assert!(engine.registry().is_empty());
        assert_eq!(hp(&engine, player), 30);
        assert!(flags(&engine, player).is_empty());
        assert!(flags(&engine, monster).is_empty());
        assert_eq!(engine.directory().monster_at(IVec2::new(0, 1)), Some(monster));
        let ends = events_of_kind(&engine, player, "combat_end");
        assert_eq!(last_message(&ends), Some("You flee from battle."));
    }

    #[test]
    fn corrupt_battle_aborts_alone() {
        let ThreeWay { mut engine, p1, m1, p2, .. } = setup_three_way(20);
        let p3 = engine.directory_mut().spawn_player("carol", 30, IVec2::new(5, 5));
        let m2 = engine.directory_mut().spawn_monster("Rat", 5, IVec2::new(5, 6));
        let other = engine.engage(p3, m2).unwrap().battle();

        let broken = engine.battle_for(p1).unwrap();
        engine
            .registry_mut()
            .get_mut(broken)
            .unwrap()
            .corrupt_pointer(9);

        let outcome = engine.submit_action(p1, Action::Attack, Some(m1));

        assert!(matches!(
            outcome,
            Outcome::Aborted { battle, error: BattleError::TurnIndexOutOfRange { index: 9, .. } }
                if battle == broken
        ));
        assert!(engine.battle(broken).is_none());
        for id in [p1, m1, p2] {
            assert_eq!(engine.battle_for(id), None);
            assert!(!flags(&engine, id).contains(StatusFlags::ENGAGED));
        }
        assert_eq!(events_of_kind(&engine, p2, "combat_end").len(), 1);
        assert_eq!(engine.battle_for(p3), Some(other));
        assert_eq!(holder_of(&engine, p3), Some(p3));
    }

    #[test]
    fn dangling_turn_entry_aborts() {
        let ThreeWay { mut engine, p1, m1, p2, .. } = setup_three_way(20);
        let broken = engine.battle_for(p1).unwrap();
        engine
            .registry_mut()
            .get_mut(broken)
            .unwrap()
            .corrupt_turn_order(vec![p1, m1, p2, CombatantId::new(50)]);

        let outcome = engine.submit_action(p1, Action::Defend, None);

        assert!(matches!(
            outcome,
            Outcome::Aborted { error: BattleError::DanglingTurnEntry { .. }, .. }
        ));
        assert!(engine.registry().is_empty());
    }
}
