//! Placement Scan
//!
//! Populates a level's actors and collectibles from its placement plane and
//! counts the level totals (monsters, secrets, treasure).
//!
//! Totals are only counted for a fresh level. When statistics were restored
//! from a save (`LevelState::loading_saved`), the restored totals stand.

use std::collections::BTreeSet;

use tracing::debug;

use crate::game::state::{Actor, EntityId, Level, Powerup, PowerupCategory, Skill};
use crate::level::data::{tile_center, PlacementKind};

/// What a scan spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpawnSummary {
    /// Actors spawned.
    pub actors: usize,
    /// Powerups spawned (collected ones included).
    pub powerups: usize,
    /// Secret markers seen.
    pub secrets: usize,
}

/// Spawn every placement the skill allows.
///
/// Powerups whose ids are in `collected` are spawned already collected.
pub fn scan_placements(
    level: &mut Level,
    skill: Skill,
    collected: Option<&BTreeSet<EntityId>>,
) -> SpawnSummary {
    let placements = level.data().placements.clone();
    let count_totals = !level.state.loading_saved;
    let mut summary = SpawnSummary::default();

    level.state.actors.clear();
    level.state.powerups.clear();

    for (index, placement) in placements.iter().enumerate() {
        if skill < placement.min_skill {
            continue;
        }

        let id = EntityId(index as u32);
        let position = (tile_center(placement.tile_x), tile_center(placement.tile_y));

        match placement.kind {
            PlacementKind::Actor { kind, angle, patrol } => {
                level
                    .state
                    .actors
                    .push(Actor::new(id, kind, position, angle, patrol, skill));
                if count_totals {
                    level.state.stats.total_monsters += 1;
                }
                summary.actors += 1;
            }
            PlacementKind::Powerup(kind) => {
                let mut powerup = Powerup {
                    id,
                    kind,
                    x: position.0,
                    y: position.1,
                };
                if collected.is_some_and(|ids| ids.contains(&id)) {
                    powerup.mark_collected();
                }
                if count_totals && kind.category() == PowerupCategory::Treasure {
                    level.state.stats.total_treasure += 1;
                }
                level.state.powerups.push(powerup);
                summary.powerups += 1;
            }
            PlacementKind::SecretWall => {
                if count_totals {
                    level.state.stats.total_secrets += 1;
                }
                summary.secrets += 1;
            }
        }
    }

    debug!(
        actors = summary.actors,
        powerups = summary.powerups,
        secrets = summary.secrets,
        ?skill,
        "placements scanned"
    );

    summary
}
