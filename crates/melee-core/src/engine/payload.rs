//! Per-recipient battle views.

use crate::battle::Battle;
use crate::combatant::{CombatantId, Directory};
use crate::event::{BattleView, CombatantStatus};

/// The turn holder while the battle still has a fight left in it.
fn live_holder(battle: &Battle) -> Option<CombatantId> {
    if battle.should_end() {
        None
    } else {
        battle.current_holder()
    }
}

/// The `(active_player, your_turn)` pair every turn-bearing payload carries.
pub(crate) fn turn_fields(battle: &Battle, viewer: CombatantId) -> (Option<CombatantId>, bool) {
    let active_player = live_holder(battle);
    (active_player, active_player == Some(viewer))
}

/// Describes one member of `battle` as other members see it.
///
/// Returns `None` if the directory no longer knows `id`.
#[must_use]
pub fn combatant_status<D: Directory + ?Sized>(
    directory: &D,
    battle: &Battle,
    id: CombatantId,
) -> Option<CombatantStatus> {
    let combatant = directory.combatant(id)?;
    Some(CombatantStatus {
        id,
        name: combatant.display_name().to_owned(),
        hp: combatant.hit_points(),
        max_hp: combatant.max_hit_points(),
        is_monster: combatant.is_monster(),
        is_current_turn: live_holder(battle) == Some(id),
        defending: battle.is_defending(id),
    })
}

/// Builds the view of `battle` for `viewer`.
///
/// A battle with no fight left reports no active player, so nobody is told
/// it is their turn in the report of the final blow.
#[must_use]
pub fn build_view<D: Directory + ?Sized>(directory: &D, battle: &Battle, viewer: CombatantId) -> BattleView {
    let (active_player, your_turn) = turn_fields(battle, viewer);
    BattleView {
        your_turn,
        active_player,
        your_hp: directory.combatant(viewer).map(|c| c.hit_points()),
        opponents: battle
            .members()
            .filter(|id| *id != viewer)
            .filter_map(|id| combatant_status(directory, battle, id))
            .collect(),
    }
}
