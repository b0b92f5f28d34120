//! Game Events
//!
//! Events raised by the state machine for the session controller.

use serde::{Deserialize, Serialize};

use crate::game::state::{EntityId, Weapon};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Player switched weapons
    WeaponChanged {
        from: Weapon,
        to: Weapon,
    },

    /// Player was killed
    PlayerDied {
        attacker: Option<EntityId>,
    },

    /// Death overlay expired and the level restarted
    PlayerRespawned {
        lives_left: u32,
    },

    /// Death overlay expired with no lives left
    GameOver,

    /// Player reached an exit
    LevelExited {
        secret: bool,
    },

    /// Episode boss defeated
    VictoryStarted,

    /// Victory sequence finished
    EpisodeEnded,
}

/// A game event with the logic cycle it happened on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Logic cycle when event occurred
    pub cycle: u64,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(cycle: u64, data: GameEventData) -> Self {
        Self { cycle, data }
    }

    /// Create weapon changed event.
    pub fn weapon_changed(cycle: u64, from: Weapon, to: Weapon) -> Self {
        Self::new(cycle, GameEventData::WeaponChanged { from, to })
    }

    /// Create player died event.
    pub fn player_died(cycle: u64, attacker: Option<EntityId>) -> Self {
        Self::new(cycle, GameEventData::PlayerDied { attacker })
    }

    /// Create player respawned event.
    pub fn player_respawned(cycle: u64, lives_left: u32) -> Self {
        Self::new(cycle, GameEventData::PlayerRespawned { lives_left })
    }

    /// Create level exited event.
    pub fn level_exited(cycle: u64, secret: bool) -> Self {
        Self::new(cycle, GameEventData::LevelExited { secret })
    }

    /// Whether this event ends the level (intermission or game over follows).
    pub fn ends_level(&self) -> bool {
        matches!(
            self.data,
            GameEventData::GameOver
                | GameEventData::LevelExited { .. }
                | GameEventData::EpisodeEnded
        )
    }
}
