//! Scripted skirmishes on a small grid.
//!
//! Players stand on row 0 and monsters on row 1. Each monster is walked
//! into by one player (round robin), so a skirmish may hold several
//! battles at once. Players then follow a fixed policy: guard up when
//! below a third of their hit points, otherwise strike the first monster
//! in the turn order, or the first opponent once no monster is left.

use anyhow::Context;
use glam::IVec2;
use melee_core::{Action, Battle, CombatantId, Directory, Engine, EngineConfig, EventLog, World};
use serde::Serialize;
use tracing::{debug, info};

/// Shape of one skirmish.
#[derive(Debug, Clone)]
pub struct SkirmishSpec {
    pub players: usize,
    pub monsters: usize,
    pub player_hp: i32,
    pub monster_hp: i32,
    pub max_turns: u32,
}

/// Who was left standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Victor {
    Players,
    Monsters,
    /// The turn cap was hit first.
    Stalemate,
}

/// Result of one skirmish.
#[derive(Debug, Clone, Serialize)]
pub struct SkirmishReport {
    pub seed: u64,
    pub battles: usize,
    pub turns: u32,
    pub events: usize,
    pub surviving_players: usize,
    pub surviving_monsters: usize,
    pub victor: Victor,
}

type SimEngine = Engine<World, EventLog>;

/// Runs one skirmish to completion (or to the turn cap).
///
/// # Errors
///
/// Fails if there are no players, the config is invalid, or an opening
/// collision is refused.
pub fn run(spec: &SkirmishSpec, config: &EngineConfig, seed: u64) -> anyhow::Result<SkirmishReport> {
    anyhow::ensure!(spec.players > 0, "a skirmish needs at least one player");

    let mut world = World::new();
    let players: Vec<CombatantId> = (0..spec.players)
        .map(|i| world.spawn_player(format!("player-{i}"), spec.player_hp, IVec2::new(column(i), 0)))
        .collect();
    let monsters: Vec<CombatantId> = (0..spec.monsters)
        .map(|j| world.spawn_monster(format!("monster-{j}"), spec.monster_hp, IVec2::new(column(j), 1)))
        .collect();

    let config = EngineConfig {
        seed: Some(seed),
        ..config.clone()
    };
    let mut engine = Engine::new(world, EventLog::new(), config).context("invalid engine config")?;

    let mut battles = 0;
    for j in 0..monsters.len() {
        let player = players[j % players.len()];
        let engagement = engine
            .engage_at(player, IVec2::new(column(j), 1))
            .with_context(|| format!("collision of {player} with monster {j} refused"))?;
        if matches!(engagement, Some(melee_core::Engagement::Created(_))) {
            battles += 1;
        }
    }
    debug!(seed, battles, "skirmish opened");

    let mut turns = 0;
    let mut events = engine.notifier().take_events().len();
    while turns < spec.max_turns {
        let Some((actor, action, target)) = next_move(&engine) else {
            break;
        };
        engine.submit_action(actor, action, target);
        events += engine.notifier().take_events().len();
        turns += 1;
    }

    let surviving_players = count_alive(&engine, &players);
    let surviving_monsters = count_alive(&engine, &monsters);
    let victor = if !engine.registry().is_empty() {
        Victor::Stalemate
    } else if surviving_monsters == 0 && surviving_players > 0 {
        Victor::Players
    } else {
        Victor::Monsters
    };
    info!(seed, turns, ?victor, "skirmish finished");

    Ok(SkirmishReport {
        seed,
        battles,
        turns,
        events,
        surviving_players,
        surviving_monsters,
        victor,
    })
}

fn column(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

fn count_alive(engine: &SimEngine, ids: &[CombatantId]) -> usize {
    ids.iter().filter(|id| engine.directory().is_alive(**id)).count()
}

/// The next player move of the first battle still running.
fn next_move(engine: &SimEngine) -> Option<(CombatantId, Action, Option<CombatantId>)> {
    let battle = engine.registry().battles().next()?;
    let holder = battle.current_holder()?;
    Some(choose(engine, battle, holder))
}

fn choose(engine: &SimEngine, battle: &Battle, holder: CombatantId) -> (CombatantId, Action, Option<CombatantId>) {
    let wounded = engine.directory().combatant(holder).is_some_and(|c| {
        c.max_hit_points()
            .is_some_and(|max| c.hit_points().saturating_mul(3) < max)
    });
    let opponents = battle.opponents_of(holder);
    if wounded && opponents.iter().any(|id| battle.is_monster(*id)) {
        return (holder, Action::Defend, None);
    }
    let target = opponents
        .iter()
        .copied()
        .find(|id| battle.is_monster(*id))
        .or_else(|| opponents.first().copied());
    (holder, Action::Attack, target)
}
