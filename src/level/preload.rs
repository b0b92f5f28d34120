//! Asset Preload
//!
//! Works out which wall textures and sprite sheets a level needs and skips
//! the ones already loaded earlier in the process. The cache outlives
//! sessions; a path is only marked once its fetch succeeded.

use std::collections::BTreeSet;
use std::time::Duration;

use futures_util::future::try_join_all;
use tracing::{debug, warn};

use crate::config::AssetConfig;
use crate::game::state::Level;
use crate::level::source::{AssetError, AssetFetcher};

/// Normalize a wall texture id to the file that holds it.
///
/// Id 0 means no texture. Light and dark variants share one file: even ids
/// map to the odd id below them.
pub fn texture_file_id(id: u16) -> Option<u16> {
    match id {
        0 => None,
        id if id % 2 == 0 => Some(id - 1),
        id => Some(id),
    }
}

/// Files a level needs that are not cached yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadPlan {
    /// Wall texture paths.
    pub textures: Vec<String>,
    /// Sprite sheet paths.
    pub sprites: Vec<String>,
}

impl PreloadPlan {
    /// Whether there is nothing to fetch.
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty() && self.sprites.is_empty()
    }

    /// Every path in the plan.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.textures
            .iter()
            .chain(self.sprites.iter())
            .map(String::as_str)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.textures.len() + self.sprites.len()
    }
}

/// Process-wide record of assets already loaded.
#[derive(Debug, Clone, Default)]
pub struct AssetCache {
    textures: BTreeSet<String>,
    sprites: BTreeSet<String>,
}

impl AssetCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan the fetches for a level.
    pub fn plan(&self, level: &Level, assets: &AssetConfig) -> PreloadPlan {
        let texture_dir = format!("{}/{}", assets.wall_dir, assets.resolution);
        let sprite_dir = format!("{}/{}", assets.sprite_dir, assets.resolution);

        let ids: BTreeSet<u16> = level
            .wall_tex_x
            .iter()
            .chain(level.wall_tex_y.iter())
            .filter_map(|(_, _, &id)| texture_file_id(id))
            .collect();

        let textures = ids
            .into_iter()
            .map(|id| format!("{texture_dir}/w_{id}.png"))
            .filter(|path| !self.textures.contains(path))
            .collect();

        let sprites = assets
            .static_sprites
            .iter()
            .map(|sheet| format!("{sprite_dir}/{sheet}"))
            .filter(|path| !self.sprites.contains(path))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        PreloadPlan { textures, sprites }
    }

    /// Record a plan as loaded.
    pub fn commit(&mut self, plan: &PreloadPlan) {
        self.textures.extend(plan.textures.iter().cloned());
        self.sprites.extend(plan.sprites.iter().cloned());
    }

    /// Whether a path is cached.
    pub fn contains(&self, path: &str) -> bool {
        self.textures.contains(path) || self.sprites.contains(path)
    }

    /// Number of cached files.
    pub fn len(&self) -> usize {
        self.textures.len() + self.sprites.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetch every file of a plan concurrently, each under `timeout`.
pub async fn fetch_plan(
    fetcher: &dyn AssetFetcher,
    plan: &PreloadPlan,
    timeout: Duration,
) -> Result<(), AssetError> {
    if plan.is_empty() {
        debug!("nothing to preload");
        return Ok(());
    }

    debug!(files = plan.len(), "preloading level assets");

    try_join_all(plan.paths().map(|path| async move {
        match tokio::time::timeout(timeout, fetcher.fetch(path)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(path, "asset fetch timed out");
                Err(AssetError::Timeout(path.to_string()))
            }
        }
    }))
    .await?;

    Ok(())
}
