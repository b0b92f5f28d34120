//! Level Transition Pipeline
//!
//! Asynchronous level start:
//!
//! ```text
//! begin (stop loops, bump generation)
//!   -> await level file
//!   -> install (colors, overrides, placement scan, actor restore, loading screen)
//!   -> await asset preload
//!   -> finish (music, player spawn, clocks, input, start loops)
//! ```
//!
//! Every continuation re-checks its [`LoadTicket`] against the controller.
//! A load that was superseded by a newer load, or whose session ended, makes
//! no further changes and resolves to [`LoadOutcome::Superseded`].

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::core::lenient::or_default;
use crate::game::state::{
    ActorState, EntityId, Level, LevelStatistics, Player, Weapon, AMMO_TYPES, ITEM_WEAPON_1,
    ITEM_WEAPON_2,
};
use crate::level::data::{Grid, LevelData, Rgb};
use crate::level::preload::{fetch_plan, PreloadPlan};
use crate::level::source::{AssetError, AssetFetcher, LevelLoadError, LevelSource};
use crate::runtime::controller::SharedGame;
use crate::runtime::scheduler::start_loops;
use crate::runtime::services::WorldServices;

// =============================================================================
// ERRORS AND OUTCOMES
// =============================================================================

/// Level start errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// No session has been started.
    #[error("no active session")]
    NoSession,

    /// Episode is disabled or missing.
    #[error("episode {0} is not available")]
    EpisodeUnavailable(usize),

    /// Level index outside the episode.
    #[error("episode {episode} has no level {level}")]
    UnknownLevel {
        /// Episode index.
        episode: usize,
        /// Level index.
        level: usize,
    },

    /// Level file failed to load.
    #[error(transparent)]
    Level(#[from] LevelLoadError),

    /// Asset preload failed.
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// How a load ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Level is running.
    Started,
    /// A newer load or a session change took over; nothing was applied.
    Superseded,
}

/// Identifies one load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    /// Session the load belongs to.
    pub session: Uuid,
    /// Load generation within the controller.
    pub generation: u64,
    /// Episode being loaded.
    pub episode: usize,
    /// Level being loaded.
    pub level: usize,
}

/// What the first await of a load needs.
pub struct LoadRequest {
    /// Load identity.
    pub ticket: LoadTicket,
    /// Level file name.
    pub file: String,
    /// Where to load it from.
    pub source: Rc<dyn LevelSource>,
}

/// What the preload await needs.
pub struct PreloadRequest {
    /// Files to fetch.
    pub plan: PreloadPlan,
    /// Fetcher.
    pub fetcher: Rc<dyn AssetFetcher>,
    /// Per-file timeout.
    pub timeout: Duration,
}

// =============================================================================
// OVERRIDES
// =============================================================================

/// Saved runtime state of one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRestore {
    /// Behavior state.
    pub state: ActorState,
    /// Health.
    pub health: i32,
    /// Killed.
    pub dead: bool,
    /// World x.
    pub x: i32,
    /// World y.
    pub y: i32,
    /// Facing.
    pub angle: i32,
}

/// Saved player transform and inventory.
///
/// Missing fields take the values of a freshly spawned player; null or
/// malformed ones fall back to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerRestore {
    /// World x.
    #[serde(deserialize_with = "or_default")]
    pub x: i32,
    /// World y.
    #[serde(deserialize_with = "or_default")]
    pub y: i32,
    /// Facing.
    #[serde(deserialize_with = "or_default")]
    pub angle: i32,
    /// Health.
    #[serde(deserialize_with = "or_default")]
    pub health: i32,
    /// Score.
    #[serde(deserialize_with = "or_default")]
    pub score: u32,
    /// Lives.
    #[serde(deserialize_with = "or_default")]
    pub lives: u32,
    /// Ammo per type.
    #[serde(deserialize_with = "or_default")]
    pub ammo: [u32; AMMO_TYPES],
    /// Owned weapons and keys.
    #[serde(deserialize_with = "or_default")]
    pub items: u32,
    /// Held weapon.
    #[serde(deserialize_with = "or_default")]
    pub weapon: Weapon,
}

impl Default for PlayerRestore {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            angle: 0,
            health: Player::START_HEALTH,
            score: 0,
            lives: Player::START_LIVES,
            ammo: [Player::START_AMMO; AMMO_TYPES],
            items: ITEM_WEAPON_1 | ITEM_WEAPON_2,
            weapon: Weapon::Pistol,
        }
    }
}

impl PlayerRestore {
    /// Capture a player.
    pub fn capture(player: &Player) -> Self {
        Self {
            x: player.x,
            y: player.y,
            angle: player.angle,
            health: player.health,
            score: player.score,
            lives: player.lives,
            ammo: player.ammo,
            items: player.items,
            weapon: player.weapon,
        }
    }

    /// Overlay onto a freshly spawned player.
    ///
    /// A saved position of (0, 0) or a non-positive health keeps the spawn
    /// values.
    pub fn apply(&self, player: &mut Player) {
        if (self.x, self.y) != (0, 0) {
            player.x = self.x;
            player.y = self.y;
            player.angle = crate::core::normalize_angle(self.angle);
        }
        if self.health > 0 {
            player.health = self.health;
        }
        player.score = self.score;
        player.start_score = self.score;
        player.lives = self.lives;
        player.ammo = self.ammo;
        player.items = self.items;
        player.weapon = self.weapon;
        player.pending_weapon = self.weapon;
    }
}

/// Restored statistics and the level time already played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SavedProgress {
    /// Aggregate counters.
    pub stats: LevelStatistics,
    /// Time played before the save.
    pub elapsed_ms: i64,
}

/// State to overlay onto a freshly loaded level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelOverrides {
    /// Tile flags.
    pub tiles: Option<Grid<u32>>,
    /// Wall textures, x sides.
    pub wall_tex_x: Option<Grid<u16>>,
    /// Wall textures, y sides.
    pub wall_tex_y: Option<Grid<u16>>,
    /// Floor and ceiling colors.
    pub colors: Option<(Rgb, Rgb)>,
    /// Statistics and elapsed time.
    pub progress: Option<SavedProgress>,
    /// Powerups already picked up.
    pub collected: BTreeSet<EntityId>,
    /// Actor states by id.
    pub actors: BTreeMap<EntityId, ActorRestore>,
    /// Player state.
    pub player: Option<PlayerRestore>,
}

fn replace_grid<T: Clone>(target: &mut Grid<T>, saved: Option<&Grid<T>>, name: &str) {
    let Some(saved) = saved else {
        return;
    };
    if saved.width() == target.width()
        && saved.height() == target.height()
        && saved.is_consistent()
    {
        *target = saved.clone();
    } else {
        warn!(grid = name, "saved grid does not match level, keeping level data");
    }
}

impl LevelOverrides {
    /// Overlay grids, colors and statistics before the placement scan.
    pub fn apply_to_level(&self, level: &mut Level) {
        replace_grid(&mut level.tiles, self.tiles.as_ref(), "tiles");
        replace_grid(&mut level.wall_tex_x, self.wall_tex_x.as_ref(), "wall_tex_x");
        replace_grid(&mut level.wall_tex_y, self.wall_tex_y.as_ref(), "wall_tex_y");

        if let Some((floor, ceiling)) = self.colors {
            level.floor = floor;
            level.ceiling = ceiling;
        }

        if let Some(progress) = self.progress {
            level.state.stats = progress.stats;
            level.state.elapsed_ms = progress.elapsed_ms.max(0);
            level.state.loading_saved = true;
        }
    }

    /// Overlay actor states after the placement scan.
    ///
    /// Dead actors jump straight to their terminal frame.
    pub fn restore_actors(&self, level: &mut Level, world: &mut dyn WorldServices) {
        for actor in level.state.actors.iter_mut() {
            let Some(saved) = self.actors.get(&actor.id) else {
                continue;
            };

            if saved.dead || saved.health <= 0 {
                actor.force_dead(|frame| world.actor_frame_changed(frame));
            } else {
                actor.state = saved.state;
                actor.health = saved.health;
                actor.angle = saved.angle;
                actor.x = saved.x;
                actor.y = saved.y;
                actor.speed = actor.kind.patrol_speed();
                actor.shootable = true;
            }
        }
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

fn validated(data: LevelData, file: &str) -> Result<LevelData, LevelLoadError> {
    match data.validate() {
        Ok(()) => Ok(data),
        Err(reason) => Err(LevelLoadError::Malformed {
            file: file.to_string(),
            reason,
        }),
    }
}

/// Load and start a level for the current session.
///
/// Resolves once the level is running (or the load was superseded). Errors
/// from the level source or the asset fetcher propagate unchanged unless a
/// newer load or the end of the session has already superseded this one.
#[instrument(skip(game, overrides), fields(restoring = overrides.is_some()))]
pub async fn load_level(
    game: &SharedGame,
    episode: usize,
    level: usize,
    overrides: Option<LevelOverrides>,
) -> Result<LoadOutcome, PipelineError> {
    let request = game.borrow_mut().begin_level_load(episode, level)?;
    info!(file = %request.file, "loading level");

    let loaded = request.source.load(&request.file).await;
    let data = match loaded.and_then(|data| validated(data, &request.file)) {
        Ok(data) => data,
        Err(_) if !game.borrow().is_current(&request.ticket) => {
            info!("superseded level load failed, dropping error");
            return Ok(LoadOutcome::Superseded);
        }
        Err(e) => {
            error!(error = %e, "level load failed");
            return Err(e.into());
        }
    };

    let Some(preload) = game
        .borrow_mut()
        .install_level(&request.ticket, data, overrides.as_ref())
    else {
        info!("level load superseded before install");
        return Ok(LoadOutcome::Superseded);
    };

    if let Err(e) = fetch_plan(preload.fetcher.as_ref(), &preload.plan, preload.timeout).await {
        if !game.borrow().is_current(&request.ticket) {
            info!("superseded asset preload failed, dropping error");
            return Ok(LoadOutcome::Superseded);
        }
        error!(error = %e, "asset preload failed");
        return Err(e.into());
    }

    let restore = overrides.as_ref().and_then(|o| o.player);
    let started = game
        .borrow_mut()
        .finish_level_load(&request.ticket, &preload.plan, restore.as_ref());
    if !started {
        info!("level load superseded before start");
        return Ok(LoadOutcome::Superseded);
    }

    start_loops(game);
    info!("level started");
    Ok(LoadOutcome::Started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Actor, ActorKind, Skill};
    use crate::runtime::headless::{sample_level, ScriptedWorld};

    #[test]
    fn test_overrides_replace_grids_and_stats() {
        let data = Rc::new(sample_level("override"));
        let mut level = Level::from_data(Rc::clone(&data));

        let mut tiles = data.tiles.clone();
        tiles.set(3, 3, 0x7);
        let overrides = LevelOverrides {
            tiles: Some(tiles),
            colors: Some((Rgb([9, 9, 9]), Rgb([8, 8, 8]))),
            progress: Some(SavedProgress {
                stats: LevelStatistics {
                    killed_monsters: 2,
                    ..LevelStatistics::default()
                },
                elapsed_ms: 12_000,
            }),
            ..LevelOverrides::default()
        };
        overrides.apply_to_level(&mut level);

        assert_eq!(level.tile(3, 3), 0x7);
        assert_eq!(level.floor, Rgb([9, 9, 9]));
        assert_eq!(level.state.stats.killed_monsters, 2);
        assert_eq!(level.state.elapsed_ms, 12_000);
        assert!(level.state.loading_saved);

        // Saved grid is a copy: editing the level leaves the override alone
        level.tiles.set(3, 3, 0);
        assert_eq!(overrides.tiles.as_ref().unwrap().get(3, 3), Some(&0x7));
    }

    #[test]
    fn test_mismatched_grid_ignored() {
        let mut level = Level::from_data(Rc::new(sample_level("override")));
        let before = level.tiles.clone();
        let overrides = LevelOverrides {
            tiles: Some(Grid::filled(2, 2, 1)),
            ..LevelOverrides::default()
        };
        overrides.apply_to_level(&mut level);
        assert_eq!(level.tiles, before);
    }

    #[test]
    fn test_restore_actors() {
        let mut level = Level::from_data(Rc::new(sample_level("actors")));
        level.state.actors = vec![
            Actor::new(EntityId(0), ActorKind::Guard, (0, 0), 0, false, Skill::Easy),
            Actor::new(EntityId(1), ActorKind::Dog, (0, 0), 0, false, Skill::Easy),
            Actor::new(EntityId(2), ActorKind::Ss, (0, 0), 0, false, Skill::Easy),
        ];

        let mut overrides = LevelOverrides::default();
        overrides.actors.insert(
            EntityId(0),
            ActorRestore {
                state: ActorState::Stand,
                health: 0,
                dead: true,
                x: 0,
                y: 0,
                angle: 0,
            },
        );
        overrides.actors.insert(
            EntityId(1),
            ActorRestore {
                state: ActorState::Chase,
                health: 1,
                dead: false,
                x: 500,
                y: 600,
                angle: 1800,
            },
        );

        let mut world = ScriptedWorld::new();
        overrides.restore_actors(&mut level, &mut world);

        let actors = &level.state.actors;
        assert_eq!(actors[0].state, ActorState::Dead);
        assert!(actors[0].dead);
        assert_eq!(world.log().actor_frames.len(), 4);

        assert_eq!(actors[1].state, ActorState::Chase);
        assert_eq!((actors[1].x, actors[1].y, actors[1].angle), (500, 600, 1800));
        assert_eq!(actors[1].speed, crate::game::state::SPD_DOG);

        // Not in the save: untouched
        assert_eq!(actors[2].state, ActorState::Stand);
    }

    #[test]
    fn test_player_restore_sets_start_score() {
        let mut player = Player::spawn(&crate::level::data::SpawnPoint::at_tile(1, 1, 0), None);
        player.score = 777;
        player.angle = 100;
        player.switch_weapon(Weapon::Knife);
        let saved = PlayerRestore::capture(&player);

        let mut fresh = Player::spawn(&crate::level::data::SpawnPoint::at_tile(4, 4, 0), None);
        saved.apply(&mut fresh);
        assert_eq!(fresh.score, 777);
        assert_eq!(fresh.start_score, 777);
        assert_eq!(fresh.position(), player.position());
        assert_eq!(fresh.weapon, Weapon::Knife);
    }

    #[test]
    fn test_player_restore_defaults_keep_spawn() {
        let saved: PlayerRestore =
            serde_json::from_str(r#"{"health": null, "score": 40, "angle": "north"}"#).unwrap();
        assert_eq!(saved.health, 0);
        assert_eq!(saved.lives, Player::START_LIVES);

        let spawn = crate::level::data::SpawnPoint::at_tile(4, 4, 900);
        let mut fresh = Player::spawn(&spawn, None);
        saved.apply(&mut fresh);
        assert_eq!((fresh.x, fresh.y, fresh.angle), (spawn.x, spawn.y, 900));
        assert_eq!(fresh.health, Player::START_HEALTH);
        assert_eq!(fresh.score, 40);
    }

    #[test]
    fn test_oversized_saved_grid_ignored() {
        let mut level = Level::from_data(Rc::new(sample_level("override")));
        let before = level.tiles.clone();
        let huge: Grid<u32> =
            serde_json::from_str(r#"{"width": 18446744073709551615, "height": 3, "cells": []}"#)
                .unwrap();
        assert!(!huge.is_consistent());

        let overrides = LevelOverrides {
            tiles: Some(huge),
            ..LevelOverrides::default()
        };
        overrides.apply_to_level(&mut level);
        assert_eq!(level.tiles, before);
    }
}
