//! Combatant abstraction and the entity directory seam.
//!
//! The battle engine never owns the entities it arbitrates. Players and
//! monsters live in a [`Directory`] owned by the surrounding game; battles
//! only hold [`CombatantId`]s and reach back into the directory whenever
//! they need a name, a hit-point total, or to apply damage.
//!
//! # Contract
//!
//! - [`Combatant::apply_damage`] is the only way hit points go down.
//! - Death is signaled exactly once: the call that takes hit points from
//!   above zero to zero or below returns `true`. Later calls return `false`.
//! - The engine depends only on [`Combatant`], never on a concrete kind.
//!
//! # Example
//!
//! ```
//! use melee_core::combatant::{Combatant, CombatantId, Directory};
//! use melee_core::world::World;
//! use glam::IVec2;
//!
//! let mut world = World::new();
//! let hero = world.spawn_player("hero", 10, IVec2::new(1, 1));
//!
//! let combatant = world.combatant_mut(hero).unwrap();
//! assert!(!combatant.apply_damage(8));
//! assert_eq!(combatant.hit_points(), 2);
//! assert!(combatant.apply_damage(8));
//! assert!(!combatant.apply_damage(8));
//! ```

use std::fmt;

use glam::IVec2;
use serde::{Deserialize, Serialize};

/// Grid coordinate of an entity on the shared map.
pub type Position = IVec2;

// =============================================================================
// Combatant Identity
// =============================================================================

/// Stable identifier for a combatant.
///
/// Ids are assigned by the directory and never reused while the entity is
/// alive. Ordering follows the numeric value.
///
/// ```
/// use melee_core::combatant::CombatantId;
///
/// let id = CombatantId::new(7);
/// assert_eq!(id.as_u64(), 7);
/// assert_eq!(id.to_string(), "7");
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombatantId(u64);

impl CombatantId {
    /// Creates a new `CombatantId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CombatantId({})", self.0)
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CombatantId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<CombatantId> for u64 {
    fn from(id: CombatantId) -> Self {
        id.0
    }
}

// =============================================================================
// Combatant Trait
// =============================================================================

/// Uniform view over player- and monster-controlled entities.
///
/// Implementors must guarantee that [`apply_damage`](Self::apply_damage)
/// reports death exactly once and never increases hit points.
pub trait Combatant {
    /// Stable identity of this combatant.
    fn id(&self) -> CombatantId;

    /// Name shown to other players.
    fn display_name(&self) -> &str;

    /// Current hit points. Zero or below means dead.
    fn hit_points(&self) -> i32;

    /// Hit-point ceiling. Only players have one; monsters have a fixed pool.
    fn max_hit_points(&self) -> Option<i32>;

    /// Subtracts `amount` from hit points.
    ///
    /// Returns `true` iff this call killed the combatant.
    fn apply_damage(&mut self, amount: u32) -> bool;

    /// Whether this combatant is computer-controlled.
    fn is_monster(&self) -> bool;

    /// Whether this combatant still has hit points left.
    fn is_alive(&self) -> bool {
        self.hit_points() > 0
    }
}

/// Subtracts damage from a hit-point counter and reports a fresh death.
///
/// Shared by every [`Combatant`] implementation so the "dies exactly once"
/// rule lives in one place.
pub(crate) fn subtract_hit_points(hp: &mut i32, amount: u32) -> bool {
    if *hp <= 0 {
        return false;
    }
    let amount = i32::try_from(amount).unwrap_or(i32::MAX);
    *hp = hp.saturating_sub(amount);
    *hp <= 0
}

// =============================================================================
// Directory
// =============================================================================

/// The entity directory the engine reads from and damages through.
///
/// The surrounding game owns the canonical players and monsters. The engine
/// only looks them up by id, mutates them through [`Combatant::apply_damage`]
/// and asks for dead entities to be taken off the map.
pub trait Directory {
    /// Looks up a combatant by id.
    fn combatant(&self, id: CombatantId) -> Option<&dyn Combatant>;

    /// Looks up a combatant by id for damage application.
    fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut dyn Combatant>;

    /// Returns the living monster standing on `position`, if any.
    fn monster_at(&self, position: Position) -> Option<CombatantId>;

    /// Clears the entity from the map after death.
    fn remove_from_world(&mut self, id: CombatantId);

    /// Records whether the entity is currently locked in a battle.
    fn set_engaged(&mut self, _id: CombatantId, _engaged: bool) {}

    /// Returns true if `id` refers to a combatant that is still alive.
    fn is_alive(&self, id: CombatantId) -> bool {
        self.combatant(id).is_some_and(|c| c.is_alive())
    }
}
