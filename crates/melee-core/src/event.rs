//! Events delivered to players, and the transport seam.
//!
//! The engine reports everything through a [`Notifier`]: one
//! [`CombatEvent`] per recipient, fire and forget. Events describe field
//! sets, not a wire format; they serialize to JSON objects tagged by a
//! `"type"` field for transports that want that.
//!
//! Every event that shows the state of a battle embeds a [`BattleView`]
//! built for its recipient, so turn flags and rosters are always computed
//! the same way.
//!
//! [`EventLog`] is a recording notifier for tests and headless runs.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::battle::BattleId;
use crate::combatant::CombatantId;

// =============================================================================
// Payloads
// =============================================================================

/// How one combatant looks to the other members of its battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantStatus {
    /// Combatant id.
    pub id: CombatantId,
    /// Display name.
    pub name: String,
    /// Current hit points.
    pub hp: i32,
    /// Hit-point ceiling, players only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<i32>,
    /// Computer-controlled.
    pub is_monster: bool,
    /// Holds the current turn.
    pub is_current_turn: bool,
    /// Guard is up.
    pub defending: bool,
}

/// A battle as seen by one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleView {
    /// The recipient holds the current turn.
    pub your_turn: bool,
    /// Current turn holder, if the battle still runs.
    pub active_player: Option<CombatantId>,
    /// The recipient's own hit points.
    pub your_hp: Option<i32>,
    /// Every other member, in turn order.
    pub opponents: Vec<CombatantStatus>,
}

/// What a combatant did on its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Struck at a target.
    Attack,
    /// Raised their guard.
    Defend,
    /// Left the battle.
    Flee,
}

/// Structured event sent to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CombatEvent {
    /// The recipient entered a battle, or its roster changed by a join.
    CombatStart {
        /// Battle joined.
        battle: BattleId,
        /// Human-readable summary.
        message: String,
        /// Battle state for the recipient.
        #[serde(flatten)]
        view: BattleView,
    },
    /// The recipient must resubmit its attack with an explicit target.
    TargetRequest {
        /// Valid targets.
        targets: Vec<CombatantStatus>,
    },
    /// Someone acted.
    CombatAction {
        /// Who acted.
        actor: CombatantId,
        /// Who was aimed at, for attacks.
        target: Option<CombatantId>,
        /// What was done.
        action: ActionKind,
        /// Damage the recipient dealt.
        damage_dealt: Option<u32>,
        /// Damage the recipient took.
        damage_taken: Option<u32>,
        /// The attack was blocked.
        blocked: bool,
        /// Human-readable summary.
        message: String,
        /// Battle state for the recipient.
        #[serde(flatten)]
        view: BattleView,
    },
    /// The turn moved to a player.
    TurnNotification {
        /// The player whose turn it is.
        active_player: CombatantId,
        /// The recipient is that player.
        your_turn: bool,
        /// Human-readable summary.
        message: String,
    },
    /// A monster died.
    MonsterDeath {
        /// The slain monster.
        monster_id: CombatantId,
        /// Who struck the final blow.
        killer_id: CombatantId,
    },
    /// A player died.
    PlayerDeath {
        /// The slain player.
        player_id: CombatantId,
    },
    /// The battle is over for the recipient.
    CombatEnd {
        /// Battle that ended.
        battle_id: BattleId,
        /// Human-readable summary.
        message: String,
    },
}

impl CombatEvent {
    /// Snake-case name of the variant, as used in the `"type"` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CombatStart { .. } => "combat_start",
            Self::TargetRequest { .. } => "target_request",
            Self::CombatAction { .. } => "combat_action",
            Self::TurnNotification { .. } => "turn_notification",
            Self::MonsterDeath { .. } => "monster_death",
            Self::PlayerDeath { .. } => "player_death",
            Self::CombatEnd { .. } => "combat_end",
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Per-recipient delivery of combat events.
///
/// Delivery is fire and forget: the engine never waits for or retries a
/// notification.
pub trait Notifier {
    /// Delivers `event` to `recipient`.
    fn notify(&self, recipient: CombatantId, event: CombatEvent);

    /// Publishes a message to everyone in the game, e.g. a death notice.
    fn announce(&self, _message: &str) {}
}

/// A notifier that records everything it is given.
///
/// The logs sit behind mutexes so a shared log can be read from another
/// thread while an engine writes to it.
///
/// ```
/// use melee_core::combatant::CombatantId;
/// use melee_core::event::{CombatEvent, EventLog, Notifier};
///
/// let log = EventLog::new();
/// log.notify(CombatantId::new(1), CombatEvent::PlayerDeath { player_id: CombatantId::new(1) });
/// log.announce("1 has been slain by 2!");
///
/// assert_eq!(log.take_events().len(), 1);
/// assert_eq!(log.take_announcements(), vec!["1 has been slain by 2!".to_string()]);
/// assert!(log.take_events().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<(CombatantId, CombatEvent)>>,
    announcements: Mutex<Vec<String>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains every recorded event, in delivery order.
    pub fn take_events(&self) -> Vec<(CombatantId, CombatEvent)> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }

    /// Drains every recorded announcement.
    pub fn take_announcements(&self) -> Vec<String> {
        let mut announcements = self
            .announcements
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *announcements)
    }

    /// Copies the events delivered to `recipient` without draining.
    #[must_use]
    pub fn events_for(&self, recipient: CombatantId) -> Vec<CombatEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(to, _)| *to == recipient)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Number of undrained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no event is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for EventLog {
    fn notify(&self, recipient: CombatantId, event: CombatEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((recipient, event));
    }

    fn announce(&self, message: &str) {
        self.announcements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_owned());
    }
}
