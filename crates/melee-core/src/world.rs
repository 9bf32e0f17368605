//! In-memory entity directory.
//!
//! [`World`] is the reference [`Directory`] implementation. It stores players
//! and monsters, tracks where they stand on the grid, and carries the status
//! flags the engine toggles while they fight. Games with their own entity
//! store implement [`Directory`] directly instead.
//!
//! # Storage
//!
//! Entities live in a `BTreeMap` keyed by [`CombatantId`]. Ids are assigned
//! monotonically, so iteration order is the spawn order and identical worlds
//! always iterate identically.
//!
//! # Position Index
//!
//! The [`PositionIndex`] is updated by [`World::spawn`], [`World::move_to`],
//! [`World::despawn`] and [`Directory::remove_from_world`]. Writing to an
//! entity's position through [`World::get_mut`] does **not** update it.
//!
//! # Example
//!
//! ```
//! use melee_core::combatant::Directory;
//! use melee_core::world::World;
//! use glam::IVec2;
//!
//! let mut world = World::new();
//! let hero = world.spawn_player("hero", 15, IVec2::new(1, 1));
//! let goblin = world.spawn_monster("Goblin", 20, IVec2::new(1, 2));
//!
//! assert_eq!(world.monster_at(IVec2::new(1, 2)), Some(goblin));
//! assert_eq!(world.monster_at(IVec2::new(1, 1)), None);
//! assert!(world.get(hero).unwrap().is_player());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::combatant::{subtract_hit_points, Combatant, CombatantId, Directory, Position};

/// Hit points of a freshly spawned monster when none is given.
pub const DEFAULT_MONSTER_HP: i32 = 20;

bitflags! {
    /// Per-entity status flags maintained by the engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StatusFlags: u8 {
        /// Currently locked in a battle.
        const ENGAGED = 0b0000_0001;
        /// Killed and taken off the map.
        const SLAIN = 0b0000_0010;
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Kind of entity, used to decide who controls it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityTag {
    /// Human-controlled adventurer.
    Player,
    /// Computer-controlled monster.
    Monster,
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "Player"),
            Self::Monster => write!(f, "Monster"),
        }
    }
}

/// Hit-point state of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Current hit points.
    pub hp: i32,
    /// Hit-point ceiling.
    pub max_hp: i32,
}

impl PlayerStats {
    /// Creates stats for a player at full health.
    #[must_use]
    pub const fn full(max_hp: i32) -> Self {
        Self { hp: max_hp, max_hp }
    }
}

/// Hit-point state of a monster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterStats {
    /// Remaining hit points of the fixed pool.
    pub hp: i32,
}

impl Default for MonsterStats {
    fn default() -> Self {
        Self {
            hp: DEFAULT_MONSTER_HP,
        }
    }
}

/// Type-specific entity state. The variant always matches the entity's tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityInner {
    /// Player state.
    Player(PlayerStats),
    /// Monster state.
    Monster(MonsterStats),
}

impl EntityInner {
    /// Returns the tag matching this variant.
    #[must_use]
    pub const fn tag(&self) -> EntityTag {
        match self {
            Self::Player(_) => EntityTag::Player,
            Self::Monster(_) => EntityTag::Monster,
        }
    }
}

/// A player or monster living in the [`World`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    id: CombatantId,
    name: String,
    inner: EntityInner,
    /// Grid position. Call [`World::move_to`] to keep the index in sync.
    pub position: Position,
    /// Engine-maintained status flags.
    pub flags: StatusFlags,
}

impl Entity {
    /// Creates a new entity.
    #[must_use]
    pub fn new(id: CombatantId, name: impl Into<String>, inner: EntityInner, position: Position) -> Self {
        Self {
            id,
            name: name.into(),
            inner,
            position,
            flags: StatusFlags::empty(),
        }
    }

    /// Returns the entity's tag.
    #[must_use]
    pub const fn tag(&self) -> EntityTag {
        self.inner.tag()
    }

    /// Returns the type-specific state.
    #[must_use]
    pub const fn inner(&self) -> &EntityInner {
        &self.inner
    }

    /// Returns true if this is a player.
    #[must_use]
    pub const fn is_player(&self) -> bool {
        matches!(self.inner, EntityInner::Player(_))
    }

    /// Returns the player stats, if this is a player.
    #[must_use]
    pub const fn as_player(&self) -> Option<&PlayerStats> {
        match &self.inner {
            EntityInner::Player(stats) => Some(stats),
            EntityInner::Monster(_) => None,
        }
    }

    /// Returns the monster stats, if this is a monster.
    #[must_use]
    pub const fn as_monster(&self) -> Option<&MonsterStats> {
        match &self.inner {
            EntityInner::Monster(stats) => Some(stats),
            EntityInner::Player(_) => None,
        }
    }
}

impl Combatant for Entity {
    fn id(&self) -> CombatantId {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn hit_points(&self) -> i32 {
        match &self.inner {
            EntityInner::Player(stats) => stats.hp,
            EntityInner::Monster(stats) => stats.hp,
        }
    }

    fn max_hit_points(&self) -> Option<i32> {
        self.as_player().map(|stats| stats.max_hp)
    }

    fn apply_damage(&mut self, amount: u32) -> bool {
        match &mut self.inner {
            EntityInner::Player(stats) => subtract_hit_points(&mut stats.hp, amount),
            EntityInner::Monster(stats) => subtract_hit_points(&mut stats.hp, amount),
        }
    }

    fn is_monster(&self) -> bool {
        matches!(self.inner, EntityInner::Monster(_))
    }
}

// =============================================================================
// Position Index
// =============================================================================

/// Entity positions for tile lookups.
///
/// `HashMap` is fine here: lookups are by id, and tile scans sort their
/// results before returning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionIndex {
    positions: HashMap<CombatantId, Position>,
}

impl PositionIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or moves an entity.
    pub fn insert(&mut self, id: CombatantId, position: Position) {
        self.positions.insert(id, position);
    }

    /// Removes an entity from the index.
    pub fn remove(&mut self, id: CombatantId) {
        self.positions.remove(&id);
    }

    /// Returns the indexed position of an entity.
    #[must_use]
    pub fn get(&self, id: CombatantId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    /// Returns every entity standing on `position`, sorted by id.
    #[must_use]
    pub fn occupants(&self, position: Position) -> Vec<CombatantId> {
        let mut ids: Vec<CombatantId> = self
            .positions
            .iter()
            .filter(|(_, pos)| **pos == position)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

// =============================================================================
// World
// =============================================================================

/// In-memory entity directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    next_id: u64,
    entities: BTreeMap<CombatantId, Entity>,
    positions: PositionIndex,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity and returns its freshly assigned id.
    pub fn spawn(&mut self, name: impl Into<String>, inner: EntityInner, position: Position) -> CombatantId {
        let id = CombatantId::new(self.next_id);
        self.next_id += 1;

        self.positions.insert(id, position);
        self.entities.insert(id, Entity::new(id, name, inner, position));
        id
    }

    /// Spawns a player at full health.
    pub fn spawn_player(&mut self, name: impl Into<String>, max_hp: i32, position: Position) -> CombatantId {
        self.spawn(name, EntityInner::Player(PlayerStats::full(max_hp)), position)
    }

    /// Spawns a monster with the given hit-point pool.
    pub fn spawn_monster(&mut self, kind: impl Into<String>, hp: i32, position: Position) -> CombatantId {
        self.spawn(kind, EntityInner::Monster(MonsterStats { hp }), position)
    }

    /// Removes an entity entirely, returning it.
    pub fn despawn(&mut self, id: CombatantId) -> Option<Entity> {
        self.positions.remove(id);
        self.entities.remove(&id)
    }

    /// Returns an entity by id.
    #[must_use]
    pub fn get(&self, id: CombatantId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns a mutable entity by id.
    #[must_use]
    pub fn get_mut(&mut self, id: CombatantId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Moves an entity and updates the position index.
    ///
    /// Returns false if the entity is unknown or no longer on the map.
    pub fn move_to(&mut self, id: CombatantId, position: Position) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if entity.flags.contains(StatusFlags::SLAIN) {
            return false;
        }
        entity.position = position;
        self.positions.insert(id, position);
        true
    }

    /// Entity ids in spawn order.
    pub fn ids_sorted(&self) -> impl Iterator<Item = CombatantId> + '_ {
        self.entities.keys().copied()
    }

    /// Entities in spawn order.
    pub fn entities_sorted(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// Returns the position index.
    #[must_use]
    pub fn positions(&self) -> &PositionIndex {
        &self.positions
    }

    /// Number of entities, living or slain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity was ever spawned or all were despawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Directory for World {
    fn combatant(&self, id: CombatantId) -> Option<&dyn Combatant> {
        self.entities.get(&id).map(|entity| entity as &dyn Combatant)
    }

    fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut dyn Combatant> {
        self.entities
            .get_mut(&id)
            .map(|entity| entity as &mut dyn Combatant)
    }

    fn monster_at(&self, position: Position) -> Option<CombatantId> {
        self.positions.occupants(position).into_iter().find(|id| {
            self.entities
                .get(id)
                .is_some_and(|entity| entity.is_monster() && entity.is_alive())
        })
    }

    fn remove_from_world(&mut self, id: CombatantId) {
        self.positions.remove(id);
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.flags.remove(StatusFlags::ENGAGED);
            entity.flags.insert(StatusFlags::SLAIN);
        }
    }

    fn set_engaged(&mut self, id: CombatantId, engaged: bool) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.flags.set(StatusFlags::ENGAGED, engaged);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
