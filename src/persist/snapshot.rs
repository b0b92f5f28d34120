//! Save Snapshot
//!
//! JSON-serializable picture of a running session: level identity and skill,
//! copies of the mutable grids, the player, level statistics, every
//! collectible and every actor.
//!
//! Every field has a serde default, and null or wrongly typed values fall
//! back to it, so damaged saves still load with safe values. The version tag
//! is the exception: a snapshot without the current version is
//! rejected rather than guessed at.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::core::lenient::or_default;
use crate::game::state::{
    ActorKind, ActorState, EntityId, LevelStatistics, PowerupCategory, PowerupKind, Session, Skill,
};
use crate::level::data::{Grid, Rgb};
use crate::level::pipeline::{ActorRestore, LevelOverrides, PlayerRestore, SavedProgress};
use crate::persist::store::StoreError;

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistError {
    /// No session to save.
    #[error("no active session")]
    NoSession,

    /// Session has no level loaded yet.
    #[error("no level loaded")]
    NoLevel,

    /// Snapshot could not be encoded or decoded.
    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot from an incompatible build.
    #[error("snapshot version {found}, expected {expected}")]
    Version {
        /// Version in the snapshot (0 when absent).
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// Slot store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Level identity and mutable map state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedLevel {
    /// Episode index.
    #[serde(deserialize_with = "or_default")]
    pub episode: usize,
    /// Level index.
    #[serde(deserialize_with = "or_default")]
    pub level_index: usize,
    /// Difficulty.
    #[serde(deserialize_with = "or_default")]
    pub skill: Skill,
    /// Tile flags.
    #[serde(deserialize_with = "or_default")]
    pub tiles: Option<Grid<u32>>,
    /// Wall textures, x sides.
    #[serde(deserialize_with = "or_default")]
    pub wall_tex_x: Option<Grid<u16>>,
    /// Wall textures, y sides.
    #[serde(deserialize_with = "or_default")]
    pub wall_tex_y: Option<Grid<u16>>,
    /// Floor color.
    #[serde(deserialize_with = "or_default")]
    pub floor: Option<Rgb>,
    /// Ceiling color.
    #[serde(deserialize_with = "or_default")]
    pub ceiling: Option<Rgb>,
}

/// One collectible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedCollectible {
    /// Stable id.
    #[serde(deserialize_with = "or_default")]
    pub id: EntityId,
    /// Type.
    #[serde(deserialize_with = "or_default")]
    pub kind: PowerupKind,
    /// Snapshot grouping.
    #[serde(deserialize_with = "or_default")]
    pub category: PowerupCategory,
    /// World x, -1 when collected.
    #[serde(deserialize_with = "or_default")]
    pub x: i32,
    /// World y, -1 when collected.
    #[serde(deserialize_with = "or_default")]
    pub y: i32,
    /// Picked up.
    #[serde(deserialize_with = "or_default")]
    pub collected: bool,
}

/// One actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedActor {
    /// Stable id.
    #[serde(deserialize_with = "or_default")]
    pub id: EntityId,
    /// Enemy type.
    #[serde(deserialize_with = "or_default")]
    pub kind: ActorKind,
    /// Behavior state.
    #[serde(deserialize_with = "or_default")]
    pub state: ActorState,
    /// Health.
    #[serde(deserialize_with = "or_default")]
    pub health: i32,
    /// Killed.
    #[serde(deserialize_with = "or_default")]
    pub dead: bool,
    /// World x.
    #[serde(deserialize_with = "or_default")]
    pub x: i32,
    /// World y.
    #[serde(deserialize_with = "or_default")]
    pub y: i32,
    /// Facing.
    #[serde(deserialize_with = "or_default")]
    pub angle: i32,
}

/// Finished-level history of the session, for episode averages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionHistory {
    /// Kill ratio per finished level.
    #[serde(deserialize_with = "or_default")]
    pub kill_ratios: Vec<u32>,
    /// Secret ratio per finished level.
    #[serde(deserialize_with = "or_default")]
    pub secret_ratios: Vec<u32>,
    /// Treasure ratio per finished level.
    #[serde(deserialize_with = "or_default")]
    pub treasure_ratios: Vec<u32>,
    /// Seconds spent in finished levels.
    #[serde(deserialize_with = "or_default")]
    pub total_time_secs: u32,
}

impl SessionHistory {
    /// Copy into a session.
    pub fn apply(&self, session: &mut Session) {
        session.kill_ratios = self.kill_ratios.clone();
        session.secret_ratios = self.secret_ratios.clone();
        session.treasure_ratios = self.treasure_ratios.clone();
        session.total_time_secs = self.total_time_secs;
    }
}

/// A saved game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSnapshot {
    /// Format version; must equal [`SNAPSHOT_VERSION`].
    #[serde(default, deserialize_with = "or_default")]
    pub version: u32,
    /// When the snapshot was taken.
    #[serde(default = "Utc::now", deserialize_with = "saved_at_or_now")]
    pub saved_at: DateTime<Utc>,
    /// Level identity and map state.
    #[serde(default, deserialize_with = "or_default")]
    pub level: SavedLevel,
    /// Player; a fresh player spawns when absent.
    #[serde(default, deserialize_with = "or_default")]
    pub player: Option<PlayerRestore>,
    /// Level statistics.
    #[serde(default, deserialize_with = "or_default")]
    pub statistics: LevelStatistics,
    /// Level time played so far (ms).
    #[serde(default, deserialize_with = "or_default")]
    pub elapsed_ms: i64,
    /// Every collectible.
    #[serde(default, deserialize_with = "or_default")]
    pub collectibles: Vec<SavedCollectible>,
    /// Every actor.
    #[serde(default, deserialize_with = "or_default")]
    pub actors: Vec<SavedActor>,
    /// Session history.
    #[serde(default, deserialize_with = "or_default")]
    pub history: SessionHistory,
}

fn saved_at_or_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(DateTime::<Utc>::deserialize(value).unwrap_or_else(|_| Utc::now()))
}

/// Everything needed to restart a saved game.
#[derive(Debug, Clone, PartialEq)]
pub struct Restore {
    /// Difficulty.
    pub skill: Skill,
    /// Episode index.
    pub episode: usize,
    /// Level index.
    pub level_index: usize,
    /// State to overlay on the loaded level.
    pub overrides: LevelOverrides,
    /// Session history.
    pub history: SessionHistory,
}

impl SaveSnapshot {
    /// Capture a session at `now_ms`.
    ///
    /// Grids are copied; the live level keeps its own.
    pub fn capture(session: &Session, now_ms: i64) -> Result<Self, PersistError> {
        let level = session.level.as_ref().ok_or(PersistError::NoLevel)?;

        let collectibles = level
            .state
            .powerups
            .iter()
            .map(|p| SavedCollectible {
                id: p.id,
                kind: p.kind,
                category: p.kind.category(),
                x: p.x,
                y: p.y,
                collected: p.is_collected(),
            })
            .collect();

        let actors = level
            .state
            .actors
            .iter()
            .map(|a| SavedActor {
                id: a.id,
                kind: a.kind,
                state: a.state,
                health: a.health,
                dead: a.dead,
                x: a.x,
                y: a.y,
                angle: a.angle,
            })
            .collect();

        Ok(Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            level: SavedLevel {
                episode: session.episode,
                level_index: session.level_index,
                skill: session.skill,
                tiles: Some(level.tiles.clone()),
                wall_tex_x: Some(level.wall_tex_x.clone()),
                wall_tex_y: Some(level.wall_tex_y.clone()),
                floor: Some(level.floor),
                ceiling: Some(level.ceiling),
            },
            player: session.player.as_ref().map(PlayerRestore::capture),
            statistics: level.state.stats,
            elapsed_ms: level.state.level_time_ms(now_ms),
            collectibles,
            actors,
            history: SessionHistory {
                kill_ratios: session.kill_ratios.clone(),
                secret_ratios: session.secret_ratios.clone(),
                treasure_ratios: session.treasure_ratios.clone(),
                total_time_secs: session.total_time_secs,
            },
        })
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON, rejecting other versions.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistError::Version {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Turn into level overrides.
    pub fn into_restore(self) -> Restore {
        let collected: BTreeSet<EntityId> = self
            .collectibles
            .iter()
            .filter(|c| c.collected)
            .map(|c| c.id)
            .collect();

        let actors = self
            .actors
            .iter()
            .map(|a| {
                (
                    a.id,
                    ActorRestore {
                        state: a.state,
                        health: a.health,
                        dead: a.dead,
                        x: a.x,
                        y: a.y,
                        angle: a.angle,
                    },
                )
            })
            .collect();

        let colors = match (self.level.floor, self.level.ceiling) {
            (Some(floor), Some(ceiling)) => Some((floor, ceiling)),
            _ => None,
        };

        Restore {
            skill: self.level.skill,
            episode: self.level.episode,
            level_index: self.level.level_index,
            overrides: LevelOverrides {
                tiles: self.level.tiles,
                wall_tex_x: self.level.wall_tex_x,
                wall_tex_y: self.level.wall_tex_y,
                colors,
                progress: Some(SavedProgress {
                    stats: self.statistics,
                    elapsed_ms: self.elapsed_ms.max(0),
                }),
                collected,
                actors,
                player: self.player,
            },
            history: self.history,
        }
    }
}
