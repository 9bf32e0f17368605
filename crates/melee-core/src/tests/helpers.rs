//! Test helpers: scripted dice and scenario setup.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use glam::IVec2;

use crate::combatant::{CombatantId, Directory};
use crate::config::{DamageRange, EngineConfig};
use crate::dice::Dice;
use crate::engine::Engine;
use crate::event::{CombatEvent, EventLog};
use crate::world::World;

/// Engine over the in-memory world with a recording notifier.
pub type TestEngine = Engine<World, EventLog>;

// =============================================================================
// Scripted Dice
// =============================================================================

#[derive(Debug, Default)]
struct Script {
    rolls: VecDeque<u32>,
    chances: VecDeque<bool>,
    picks: VecDeque<usize>,
}

/// Dice that replay queued results.
///
/// Clones share one script, so a test can keep a handle and queue results
/// after handing the dice to an engine. An empty queue falls back to the
/// minimum roll, a failed chance and the first pick.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDice {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a damage roll. Values outside the rolled range are clamped.
    pub fn push_roll(&self, value: u32) -> &Self {
        self.script().rolls.push_back(value);
        self
    }

    /// Queues the result of a block chance.
    pub fn push_chance(&self, value: bool) -> &Self {
        self.script().chances.push_back(value);
        self
    }

    /// Queues a monster target pick.
    pub fn push_pick(&self, index: usize) -> &Self {
        self.script().picks.push_back(index);
        self
    }
}

impl Dice for ScriptedDice {
    fn roll(&mut self, range: DamageRange) -> u32 {
        let value = self.script().rolls.pop_front().unwrap_or(range.min);
        value.clamp(range.min, range.max)
    }

    fn chance(&mut self, _probability: f64) -> bool {
        self.script().chances.pop_front().unwrap_or(false)
    }

    fn pick(&mut self, len: usize) -> usize {
        self.script().picks.pop_front().unwrap_or(0).min(len.saturating_sub(1))
    }
}

// =============================================================================
// Scenario Setup
// =============================================================================

/// Builds an engine with default config over `world`, plus a handle on its
/// scripted dice.
pub fn scripted_engine(world: World) -> (TestEngine, ScriptedDice) {
    let dice = ScriptedDice::new();
    let engine = Engine::with_dice(world, EventLog::new(), EngineConfig::default(), dice.clone())
        .expect("default config is valid");
    (engine, dice)
}

/// Three-way battle with turn order `[p1, m1, p2]` and `p1` to act.
pub struct ThreeWay {
    pub engine: TestEngine,
    pub dice: ScriptedDice,
    pub p1: CombatantId,
    pub m1: CombatantId,
    pub p2: CombatantId,
}

/// Sets up the classic three-way battle: `p1` runs into `m1`, then `p2`
/// joins. Every player has 30 hit points; the monster has `monster_hp`.
pub fn setup_three_way(monster_hp: i32) -> ThreeWay {
    let mut world = World::new();
    let p1 = world.spawn_player("alice", 30, IVec2::new(0, 0));
    let m1 = world.spawn_monster("Goblin", monster_hp, IVec2::new(0, 1));
    let p2 = world.spawn_player("bob", 30, IVec2::new(1, 1));

    let (mut engine, dice) = scripted_engine(world);
    engine.engage(p1, m1).expect("fresh engagement");
    engine.engage(p2, m1).expect("join engagement");
    engine.notifier().take_events();

    ThreeWay {
        engine,
        dice,
        p1,
        m1,
        p2,
    }
}

/// Sets up a one-on-one battle between a player and a monster, player first.
pub fn setup_duel(player_hp: i32, monster_hp: i32) -> (TestEngine, ScriptedDice, CombatantId, CombatantId) {
    let mut world = World::new();
    let player = world.spawn_player("alice", player_hp, IVec2::new(0, 0));
    let monster = world.spawn_monster("Goblin", monster_hp, IVec2::new(0, 1));

    let (mut engine, dice) = scripted_engine(world);
    engine.engage(player, monster).expect("fresh engagement");
    engine.notifier().take_events();
    (engine, dice, player, monster)
}

// =============================================================================
// Inspection
// =============================================================================

/// Hit points of a combatant in the engine's directory.
pub fn hp(engine: &TestEngine, id: CombatantId) -> i32 {
    engine
        .directory()
        .combatant(id)
        .map_or(i32::MIN, |c| c.hit_points())
}

/// Current turn holder of `id`'s battle.
pub fn holder_of(engine: &TestEngine, id: CombatantId) -> Option<CombatantId> {
    let battle = engine.battle_for(id)?;
    engine.battle(battle)?.current_holder()
}

/// Undrained events of one kind delivered to `recipient`.
pub fn events_of_kind(engine: &TestEngine, recipient: CombatantId, kind: &str) -> Vec<CombatEvent> {
    engine
        .notifier()
        .events_for(recipient)
        .into_iter()
        .filter(|event| event.kind() == kind)
        .collect()
}
