//! Level Data
//!
//! Immutable level description as delivered by a [`LevelSource`], plus the
//! episode table that maps (episode, level) to a file and a par time.
//!
//! [`LevelSource`]: crate::level::source::LevelSource

use serde::{Deserialize, Serialize};

use crate::game::state::{ActorKind, PowerupKind, Skill};
use crate::{MAP_SIZE, TILE_GLOBAL};

// =============================================================================
// TILE FLAGS
// =============================================================================

/// Blocks movement and rays.
pub const SOLID_TILE: u32 = 0x0001;
/// Door tile.
pub const DOOR_TILE: u32 = 0x0002;
/// Secret push wall.
pub const SECRET_TILE: u32 = 0x0004;
/// Elevator switch wall.
pub const ELEVATOR_TILE: u32 = 0x0008;

// =============================================================================
// GRID
// =============================================================================

/// Row-major 2D grid indexed by `(x, y)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Create a grid with every cell set to `value`.
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            cells: vec![value; width * height],
        }
    }
}

impl<T: Clone + Default> Grid<T> {
    /// Create a map-sized grid of default cells.
    pub fn map_sized() -> Self {
        Self::filled(MAP_SIZE, MAP_SIZE, T::default())
    }
}

impl<T> Grid<T> {
    /// Grid width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether the cell storage matches the declared dimensions.
    pub fn is_consistent(&self) -> bool {
        self.width.checked_mul(self.height) == Some(self.cells.len())
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Cell at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        self.index(x, y).and_then(|i| self.cells.get(i))
    }

    /// Overwrite a cell. Returns false when out of bounds.
    pub fn set(&mut self, x: usize, y: usize, value: T) -> bool {
        match self.index(x, y).and_then(|i| self.cells.get_mut(i)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// All cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width.max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (i % width, i / width, cell))
    }
}

// =============================================================================
// LEVEL DATA
// =============================================================================

/// RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

/// Player start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// World x.
    pub x: i32,
    /// World y.
    pub y: i32,
    /// Facing angle.
    pub angle: i32,
}

impl SpawnPoint {
    /// Spawn in the center of a tile.
    pub fn at_tile(tile_x: i32, tile_y: i32, angle: i32) -> Self {
        Self {
            x: tile_center(tile_x),
            y: tile_center(tile_y),
            angle,
        }
    }
}

/// World coordinate of a tile's center.
pub fn tile_center(tile: i32) -> i32 {
    tile * TILE_GLOBAL + TILE_GLOBAL / 2
}

/// What a placement spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementKind {
    /// An enemy.
    Actor {
        /// Enemy type.
        kind: ActorKind,
        /// Initial facing.
        angle: i32,
        /// Starts on a patrol path instead of standing.
        patrol: bool,
    },
    /// A collectible.
    Powerup(PowerupKind),
    /// A secret push wall marker.
    SecretWall,
}

/// One entry of the level's placement plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Tile x.
    pub tile_x: i32,
    /// Tile y.
    pub tile_y: i32,
    /// What to spawn.
    pub kind: PlacementKind,
    /// Lowest difficulty the placement appears at.
    pub min_skill: Skill,
}

/// Static description of one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    /// Display name.
    pub name: String,
    /// Tile flags.
    pub tiles: Grid<u32>,
    /// Wall texture ids on x-facing sides.
    pub wall_tex_x: Grid<u16>,
    /// Wall texture ids on y-facing sides.
    pub wall_tex_y: Grid<u16>,
    /// Floor color.
    pub floor: Rgb,
    /// Ceiling color.
    pub ceiling: Rgb,
    /// Music track.
    pub music: String,
    /// Player start.
    pub spawn: SpawnPoint,
    /// Entity placements.
    pub placements: Vec<Placement>,
}

impl LevelData {
    /// Check grid dimensions agree with each other and with their storage.
    pub fn validate(&self) -> Result<(), String> {
        fn shape<T>(grid: &Grid<T>) -> (usize, usize, bool) {
            (grid.width(), grid.height(), grid.is_consistent())
        }

        let grids = [
            ("tiles", shape(&self.tiles)),
            ("wall_tex_x", shape(&self.wall_tex_x)),
            ("wall_tex_y", shape(&self.wall_tex_y)),
        ];

        for (name, (width, height, consistent)) in grids {
            if !consistent {
                return Err(format!("{name} storage does not match {width}x{height}"));
            }
            if (width, height) != (self.tiles.width(), self.tiles.height()) {
                return Err(format!(
                    "{name} is {width}x{height}, tiles are {}x{}",
                    self.tiles.width(),
                    self.tiles.height()
                ));
            }
        }

        Ok(())
    }
}

// =============================================================================
// EPISODES
// =============================================================================

/// Index of the boss level in every episode.
pub const BOSS_LEVEL: usize = 8;
/// Index of the secret level in every episode.
pub const SECRET_LEVEL: usize = 9;

/// One level of an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    /// File handed to the level source.
    pub file: String,
    /// Par time in seconds (0 = no par).
    pub par_secs: u32,
}

/// One episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// Display name.
    pub name: String,
    /// Disabled episodes refuse to start.
    pub enabled: bool,
    /// Levels in play order.
    pub levels: Vec<LevelInfo>,
}

/// All episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeTable {
    episodes: Vec<Episode>,
}

impl Default for EpisodeTable {
    fn default() -> Self {
        const NAMES: [&str; 6] = [
            "Escape from Wolfenstein",
            "Operation: Eisenfaust",
            "Die, Fuhrer, Die!",
            "A Dark Secret",
            "Trail of the Madman",
            "Confrontation",
        ];
        const PAR: [[u32; 10]; 6] = [
            [90, 120, 120, 210, 180, 180, 150, 150, 0, 0],
            [90, 210, 180, 120, 240, 360, 60, 180, 0, 0],
            [90, 90, 150, 150, 210, 150, 120, 360, 0, 0],
            [120, 120, 90, 60, 270, 210, 120, 270, 0, 0],
            [150, 90, 150, 150, 240, 180, 270, 210, 0, 0],
            [390, 240, 240, 360, 210, 390, 270, 270, 0, 0],
        ];

        let episodes = NAMES
            .iter()
            .zip(PAR.iter())
            .enumerate()
            .map(|(ep, (name, pars))| Episode {
                name: name.to_string(),
                enabled: true,
                levels: pars
                    .iter()
                    .enumerate()
                    .map(|(lvl, &par_secs)| LevelInfo {
                        file: format!("maps/w{:02}.json", ep * 10 + lvl),
                        par_secs,
                    })
                    .collect(),
            })
            .collect();

        Self { episodes }
    }
}

impl EpisodeTable {
    /// Build a table from explicit episodes.
    pub fn new(episodes: Vec<Episode>) -> Self {
        Self { episodes }
    }

    /// Episode by index.
    pub fn episode(&self, episode: usize) -> Option<&Episode> {
        self.episodes.get(episode)
    }

    /// Mutable episode by index.
    pub fn episode_mut(&mut self, episode: usize) -> Option<&mut Episode> {
        self.episodes.get_mut(episode)
    }

    /// Level by episode and index.
    pub fn level(&self, episode: usize, level: usize) -> Option<&LevelInfo> {
        self.episode(episode).and_then(|e| e.levels.get(level))
    }

    /// Whether an episode exists and is enabled.
    pub fn is_enabled(&self, episode: usize) -> bool {
        self.episode(episode).is_some_and(|e| e.enabled)
    }

    /// Par time for a level, 0 when unknown.
    pub fn par_secs(&self, episode: usize, level: usize) -> u32 {
        self.level(episode, level).map_or(0, |l| l.par_secs)
    }

    /// Number of episodes.
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}
