//! Session State
//!
//! Complete mutable state of one play session: the session itself, the loaded
//! level with its actors and collectibles, and the player.
//!
//! Entities never hold references to each other. Cross references (such as the
//! player's last attacker) are [`EntityId`]s resolved through the level.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::lenient::or_default;
use crate::level::data::{Grid, LevelData, Rgb, SpawnPoint};

// =============================================================================
// IDENTIFIERS AND ENUMS
// =============================================================================

/// Stable entity id: the index of the entity's placement in the level data.
///
/// Ids survive reloads and save/load because placements never move.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u32);

/// Difficulty.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Skill {
    /// "Can I play, Daddy?"
    Baby,
    /// "Don't hurt me."
    #[default]
    Easy,
    /// "Bring 'em on!"
    Medium,
    /// "I am Death incarnate!"
    Hard,
}

impl Skill {
    /// Skill from its menu index, clamped to the hardest level.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Skill::Baby,
            1 => Skill::Easy,
            2 => Skill::Medium,
            _ => Skill::Hard,
        }
    }

    /// Menu index.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Player life state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Playstate {
    /// Playing normally.
    #[default]
    Alive,
    /// Killed; the death sequence is running.
    Dead,
    /// Episode won; victory sequence running.
    Victory,
    /// Left through the secret exit.
    SecretLevel,
}

/// Weapons, in slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Weapon {
    /// Slot 1, melee.
    Knife,
    /// Slot 2.
    #[default]
    Pistol,
    /// Slot 3.
    MachineGun,
    /// Slot 4.
    ChainGun,
}

impl Weapon {
    /// Inventory bit that marks the weapon as owned.
    pub fn item(self) -> u32 {
        match self {
            Weapon::Knife => ITEM_WEAPON_1,
            Weapon::Pistol => ITEM_WEAPON_2,
            Weapon::MachineGun => ITEM_WEAPON_3,
            Weapon::ChainGun => ITEM_WEAPON_4,
        }
    }

    /// Whether firing needs ammo.
    pub fn uses_ammo(self) -> bool {
        self != Weapon::Knife
    }

    /// Slot index (0-based).
    pub fn slot(self) -> u32 {
        self as u32
    }
}

/// Owns the knife.
pub const ITEM_WEAPON_1: u32 = 0x0001;
/// Owns the pistol.
pub const ITEM_WEAPON_2: u32 = 0x0002;
/// Owns the machine gun.
pub const ITEM_WEAPON_3: u32 = 0x0004;
/// Owns the chain gun.
pub const ITEM_WEAPON_4: u32 = 0x0008;
/// Gold key.
pub const ITEM_KEY_1: u32 = 0x0010;
/// Silver key.
pub const ITEM_KEY_2: u32 = 0x0020;
/// All key bits.
pub const ITEM_KEYS: u32 = ITEM_KEY_1 | ITEM_KEY_2;

/// Bullet ammo slot.
pub const AMMO_BULLETS: usize = 0;
/// Number of ammo types.
pub const AMMO_TYPES: usize = 1;

// =============================================================================
// PLAYER
// =============================================================================

/// The player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// World x.
    pub x: i32,
    /// World y.
    pub y: i32,
    /// Facing angle in `[0, ANGLES)`.
    pub angle: i32,
    /// Health.
    pub health: i32,
    /// Spare lives.
    pub lives: u32,
    /// Score.
    pub score: u32,
    /// Score at level start; restored on death respawn.
    pub start_score: u32,
    /// Ammo per type.
    pub ammo: [u32; AMMO_TYPES],
    /// Owned weapons and keys.
    pub items: u32,
    /// Current weapon.
    pub weapon: Weapon,
    /// Weapon being raised.
    pub pending_weapon: Weapon,
    /// Weapon held before the last switch.
    pub previous_weapon: Weapon,
    /// Weapon animation frame (0..4).
    pub weapon_frame: u8,
    /// Life state.
    pub playstate: Playstate,
    /// Whoever damaged the player last.
    pub last_attacker: Option<EntityId>,
}

impl Player {
    /// Health of a fresh player.
    pub const START_HEALTH: i32 = 100;
    /// Lives of a fresh player.
    pub const START_LIVES: u32 = 3;
    /// Bullets of a fresh player.
    pub const START_AMMO: u32 = 8;

    /// Spawn a player at `spawn`.
    ///
    /// With `carry`, health, lives, score, ammo and weapons come from the
    /// previous player; keys are always dropped.
    pub fn spawn(spawn: &SpawnPoint, carry: Option<&Player>) -> Self {
        let mut player = Self {
            x: spawn.x,
            y: spawn.y,
            angle: crate::core::normalize_angle(spawn.angle),
            health: Self::START_HEALTH,
            lives: Self::START_LIVES,
            score: 0,
            start_score: 0,
            ammo: [Self::START_AMMO; AMMO_TYPES],
            items: ITEM_WEAPON_1 | ITEM_WEAPON_2,
            weapon: Weapon::Pistol,
            pending_weapon: Weapon::Pistol,
            previous_weapon: Weapon::Knife,
            weapon_frame: 0,
            playstate: Playstate::Alive,
            last_attacker: None,
        };

        if let Some(prev) = carry {
            player.health = prev.health;
            player.lives = prev.lives;
            player.score = prev.score;
            player.ammo = prev.ammo;
            player.items = prev.items & !ITEM_KEYS;
            player.weapon = prev.weapon;
            player.pending_weapon = prev.pending_weapon;
            player.previous_weapon = prev.previous_weapon;
        }

        player.start_score = player.score;
        player
    }

    /// Position in world units.
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Bullets left.
    pub fn bullets(&self) -> u32 {
        self.ammo[AMMO_BULLETS]
    }

    /// Whether all bits of `item` are owned.
    pub fn has_item(&self, item: u32) -> bool {
        self.items & item == item
    }

    /// Whether the player can switch to `weapon` right now.
    pub fn can_select(&self, weapon: Weapon) -> bool {
        self.has_item(weapon.item()) && (!weapon.uses_ammo() || self.bullets() > 0)
    }

    /// Switch weapons, remembering the weapon held before.
    pub fn switch_weapon(&mut self, weapon: Weapon) {
        self.previous_weapon = self.weapon;
        self.weapon = weapon;
        self.pending_weapon = weapon;
    }

    /// Add points.
    pub fn give_points(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
    }

    /// Whether the player is alive and in control.
    pub fn is_alive(&self) -> bool {
        self.playstate == Playstate::Alive
    }
}

// =============================================================================
// ACTORS
// =============================================================================

/// Patrol speed of most actors.
pub const SPD_PATROL: i32 = 512;
/// Patrol speed of dogs.
pub const SPD_DOG: i32 = 1500;

/// Enemy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActorKind {
    /// Brown guard.
    #[default]
    Guard,
    /// Officer.
    Officer,
    /// SS.
    Ss,
    /// Dog.
    Dog,
    /// Mutant.
    Mutant,
    /// Episode boss.
    Boss,
}

impl ActorKind {
    /// Starting health at a skill.
    pub fn base_health(self, skill: Skill) -> i32 {
        match self {
            ActorKind::Guard => 25,
            ActorKind::Officer => 50,
            ActorKind::Ss => 100,
            ActorKind::Dog => 1,
            ActorKind::Mutant => [45, 55, 55, 65][skill.index()],
            ActorKind::Boss => [850, 950, 1050, 1200][skill.index()],
        }
    }

    /// Movement speed while patrolling.
    pub fn patrol_speed(self) -> i32 {
        match self {
            ActorKind::Dog => SPD_DOG,
            _ => SPD_PATROL,
        }
    }
}

/// Actor animation / behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActorState {
    /// Standing guard.
    #[default]
    Stand,
    /// Walking a patrol path.
    Path,
    /// Chasing the player.
    Chase,
    /// Firing.
    Shoot,
    /// Hurt.
    Pain,
    /// Dying, first frame.
    Die1,
    /// Dying, second frame.
    Die2,
    /// Dying, third frame.
    Die3,
    /// Corpse.
    Dead,
}

impl ActorState {
    /// Frames an actor passes through when killed outright.
    pub const DEATH_SEQUENCE: [ActorState; 4] = [
        ActorState::Die1,
        ActorState::Die2,
        ActorState::Die3,
        ActorState::Dead,
    ];
}

/// An enemy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable id.
    pub id: EntityId,
    /// Enemy type.
    pub kind: ActorKind,
    /// Current state.
    pub state: ActorState,
    /// Health.
    pub health: i32,
    /// Killed.
    pub dead: bool,
    /// World x.
    pub x: i32,
    /// World y.
    pub y: i32,
    /// Facing angle.
    pub angle: i32,
    /// Movement speed.
    pub speed: i32,
    /// Can be hit.
    pub shootable: bool,
}

impl Actor {
    /// Create a live actor.
    pub fn new(
        id: EntityId,
        kind: ActorKind,
        position: (i32, i32),
        angle: i32,
        patrol: bool,
        skill: Skill,
    ) -> Self {
        Self {
            id,
            kind,
            state: if patrol { ActorState::Path } else { ActorState::Stand },
            health: kind.base_health(skill),
            dead: false,
            x: position.0,
            y: position.1,
            angle,
            speed: kind.patrol_speed(),
            shootable: true,
        }
    }

    /// Kill the actor immediately, stepping through every death frame.
    ///
    /// `on_frame` sees the actor after each frame change so sprites can follow.
    pub fn force_dead(&mut self, mut on_frame: impl FnMut(&Actor)) {
        self.health = 0;
        self.speed = 0;
        self.shootable = false;
        self.dead = true;

        for state in ActorState::DEATH_SEQUENCE {
            self.state = state;
            on_frame(self);
        }
    }
}

// =============================================================================
// POWERUPS
// =============================================================================

/// Coordinate of a collected powerup.
pub const COLLECTED_POS: i32 = -1;

/// Collectible types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerupKind {
    /// Treasure: cross.
    #[default]
    Cross,
    /// Treasure: chalice.
    Chalice,
    /// Treasure: chest.
    Chest,
    /// Treasure: crown.
    Crown,
    /// Extra life.
    ExtraLife,
    /// Food.
    Food,
    /// First aid kit.
    FirstAid,
    /// Dog food.
    DogFood,
    /// Ammo clip.
    Clip,
    /// Machine gun pickup.
    MachineGun,
    /// Chain gun pickup.
    ChainGun,
    /// Gold key.
    GoldKey,
    /// Silver key.
    SilverKey,
}

/// Snapshot grouping of collectibles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerupCategory {
    /// Counts towards the treasure ratio.
    Treasure,
    /// Restores health.
    Health,
    /// Ammo or weapons.
    AmmoWeapon,
    /// Keys.
    #[default]
    Other,
}

impl PowerupKind {
    /// Category of the collectible.
    pub fn category(self) -> PowerupCategory {
        match self {
            PowerupKind::Cross
            | PowerupKind::Chalice
            | PowerupKind::Chest
            | PowerupKind::Crown
            | PowerupKind::ExtraLife => PowerupCategory::Treasure,
            PowerupKind::Food | PowerupKind::FirstAid | PowerupKind::DogFood => {
                PowerupCategory::Health
            }
            PowerupKind::Clip | PowerupKind::MachineGun | PowerupKind::ChainGun => {
                PowerupCategory::AmmoWeapon
            }
            PowerupKind::GoldKey | PowerupKind::SilverKey => PowerupCategory::Other,
        }
    }
}

/// A collectible in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Powerup {
    /// Stable id.
    pub id: EntityId,
    /// Type.
    pub kind: PowerupKind,
    /// World x, or [`COLLECTED_POS`].
    pub x: i32,
    /// World y, or [`COLLECTED_POS`].
    pub y: i32,
}

impl Powerup {
    /// Whether the powerup was picked up.
    pub fn is_collected(&self) -> bool {
        self.x == COLLECTED_POS && self.y == COLLECTED_POS
    }

    /// Remove from the world.
    pub fn mark_collected(&mut self) {
        self.x = COLLECTED_POS;
        self.y = COLLECTED_POS;
    }
}

// =============================================================================
// LEVEL
// =============================================================================

/// Aggregate per-level counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelStatistics {
    /// Enemies placed.
    #[serde(deserialize_with = "or_default")]
    pub total_monsters: u32,
    /// Enemies killed.
    #[serde(deserialize_with = "or_default")]
    pub killed_monsters: u32,
    /// Secrets placed.
    #[serde(deserialize_with = "or_default")]
    pub total_secrets: u32,
    /// Secrets found.
    #[serde(deserialize_with = "or_default")]
    pub found_secrets: u32,
    /// Treasure placed.
    #[serde(deserialize_with = "or_default")]
    pub total_treasure: u32,
    /// Treasure collected.
    #[serde(deserialize_with = "or_default")]
    pub found_treasure: u32,
}

/// Mutable per-level state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LevelState {
    /// Aggregate counters.
    pub stats: LevelStatistics,
    /// Wall-clock start of the current level clock (ms).
    pub start_time_ms: i64,
    /// Time played before `start_time_ms` (restored saves).
    pub elapsed_ms: i64,
    /// Enemies.
    pub actors: Vec<Actor>,
    /// Collectibles.
    pub powerups: Vec<Powerup>,
    /// Statistics came from a save; the placement scan must not count totals.
    pub loading_saved: bool,
}

impl LevelState {
    /// Total time spent in the level at `now_ms`.
    pub fn level_time_ms(&self, now_ms: i64) -> i64 {
        self.elapsed_ms + (now_ms - self.start_time_ms).max(0)
    }

    /// Restart the level clock.
    pub fn restart_clock(&mut self, now_ms: i64, elapsed_ms: i64) {
        self.start_time_ms = now_ms;
        self.elapsed_ms = elapsed_ms;
    }

    /// Actor by id.
    pub fn actor(&self, id: EntityId) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == id)
    }

    /// Mutable actor by id.
    pub fn actor_mut(&mut self, id: EntityId) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|a| a.id == id)
    }

    /// Mutable powerup by id.
    pub fn powerup_mut(&mut self, id: EntityId) -> Option<&mut Powerup> {
        self.powerups.iter_mut().find(|p| p.id == id)
    }
}

/// A loaded level: mutable copies of the level data plus live state.
#[derive(Debug, Clone)]
pub struct Level {
    data: Rc<LevelData>,
    /// Tile flags.
    pub tiles: Grid<u32>,
    /// Wall textures, x sides.
    pub wall_tex_x: Grid<u16>,
    /// Wall textures, y sides.
    pub wall_tex_y: Grid<u16>,
    /// Floor color.
    pub floor: Rgb,
    /// Ceiling color.
    pub ceiling: Rgb,
    /// Music track.
    pub music: String,
    /// Player start.
    pub spawn: SpawnPoint,
    /// Live state.
    pub state: LevelState,
}

impl Level {
    /// Build a fresh level from its data.
    pub fn from_data(data: Rc<LevelData>) -> Self {
        Self {
            tiles: data.tiles.clone(),
            wall_tex_x: data.wall_tex_x.clone(),
            wall_tex_y: data.wall_tex_y.clone(),
            floor: data.floor,
            ceiling: data.ceiling,
            music: data.music.clone(),
            spawn: data.spawn,
            state: LevelState::default(),
            data,
        }
    }

    /// Fresh copy of this level as originally loaded.
    pub fn reload(&self) -> Self {
        Self::from_data(Rc::clone(&self.data))
    }

    /// Immutable level description.
    pub fn data(&self) -> &LevelData {
        &self.data
    }

    /// Tile flags at a tile, 0 outside the map.
    pub fn tile(&self, x: usize, y: usize) -> u32 {
        self.tiles.get(x, y).copied().unwrap_or(0)
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One play session, from new game to game over or episode end.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session id; level loads started for another session are discarded.
    pub id: Uuid,
    /// Difficulty.
    pub skill: Skill,
    /// Current episode.
    pub episode: usize,
    /// Current level within the episode.
    pub level_index: usize,
    /// Kill ratio of every finished level.
    pub kill_ratios: Vec<u32>,
    /// Secret ratio of every finished level.
    pub secret_ratios: Vec<u32>,
    /// Treasure ratio of every finished level.
    pub treasure_ratios: Vec<u32>,
    /// Seconds spent in finished levels.
    pub total_time_secs: u32,
    /// Loaded level.
    pub level: Option<Level>,
    /// The player.
    pub player: Option<Player>,
}

impl Session {
    /// Create a new session.
    pub fn new(skill: Skill) -> Self {
        Self {
            id: Uuid::new_v4(),
            skill,
            episode: 0,
            level_index: 0,
            kill_ratios: Vec::new(),
            secret_ratios: Vec::new(),
            treasure_ratios: Vec::new(),
            total_time_secs: 0,
            level: None,
            player: None,
        }
    }

    /// Level and player, once both exist.
    pub fn world(&self) -> Option<(&Level, &Player)> {
        match (self.level.as_ref(), self.player.as_ref()) {
            (Some(level), Some(player)) => Some((level, player)),
            _ => None,
        }
    }

    /// Mutable level and player, once both exist.
    pub fn world_mut(&mut self) -> Option<(&mut Level, &mut Player)> {
        match (self.level.as_mut(), self.player.as_mut()) {
            (Some(level), Some(player)) => Some((level, player)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::data::{Grid, Rgb};

    fn test_data() -> Rc<LevelData> {
        Rc::new(LevelData {
            name: "test".to_string(),
            tiles: Grid::filled(8, 8, 0),
            wall_tex_x: Grid::filled(8, 8, 1),
            wall_tex_y: Grid::filled(8, 8, 2),
            floor: Rgb([1, 2, 3]),
            ceiling: Rgb([4, 5, 6]),
            music: "music/GETTHEM.ogg".to_string(),
            spawn: SpawnPoint::at_tile(2, 2, 900),
            placements: Vec::new(),
        })
    }

    #[test]
    fn test_fresh_spawn() {
        let player = Player::spawn(&SpawnPoint::at_tile(1, 1, 0), None);
        assert_eq!(player.health, 100);
        assert_eq!(player.lives, 3);
        assert_eq!(player.bullets(), 8);
        assert_eq!(player.weapon, Weapon::Pistol);
        assert!(player.has_item(ITEM_WEAPON_1 | ITEM_WEAPON_2));
        assert!(player.is_alive());
    }

    #[test]
    fn test_spawn_carries_inventory_drops_keys() {
        let mut prev = Player::spawn(&SpawnPoint::at_tile(1, 1, 0), None);
        prev.score = 4200;
        prev.health = 57;
        prev.items |= ITEM_WEAPON_3 | ITEM_KEY_1 | ITEM_KEY_2;
        prev.switch_weapon(Weapon::MachineGun);

        let next = Player::spawn(&SpawnPoint::at_tile(5, 5, 0), Some(&prev));
        assert_eq!(next.score, 4200);
        assert_eq!(next.start_score, 4200);
        assert_eq!(next.health, 57);
        assert_eq!(next.weapon, Weapon::MachineGun);
        assert!(next.has_item(ITEM_WEAPON_3));
        assert_eq!(next.items & ITEM_KEYS, 0);
        assert_eq!(next.position(), (5 * 65536 + 32768, 5 * 65536 + 32768));
    }

    #[test]
    fn test_switch_weapon_remembers_previous() {
        let mut player = Player::spawn(&SpawnPoint::at_tile(1, 1, 0), None);
        player.switch_weapon(Weapon::Knife);
        assert_eq!(player.previous_weapon, Weapon::Pistol);
        assert_eq!(player.weapon, Weapon::Knife);
        assert_eq!(player.pending_weapon, Weapon::Knife);
    }

    #[test]
    fn test_can_select_needs_ammo() {
        let mut player = Player::spawn(&SpawnPoint::at_tile(1, 1, 0), None);
        assert!(player.can_select(Weapon::Pistol));
        player.ammo[AMMO_BULLETS] = 0;
        assert!(!player.can_select(Weapon::Pistol));
        assert!(player.can_select(Weapon::Knife));
        assert!(!player.can_select(Weapon::ChainGun));
    }

    #[test]
    fn test_force_dead_walks_death_frames() {
        let mut actor = Actor::new(EntityId(3), ActorKind::Dog, (0, 0), 0, true, Skill::Hard);
        assert_eq!(actor.speed, SPD_DOG);
        assert_eq!(actor.state, ActorState::Path);

        let mut frames = Vec::new();
        actor.force_dead(|a| frames.push(a.state));

        assert_eq!(frames, ActorState::DEATH_SEQUENCE.to_vec());
        assert!(actor.dead);
        assert!(!actor.shootable);
        assert_eq!(actor.health, 0);
        assert_eq!(actor.speed, 0);
    }

    #[test]
    fn test_powerup_collected_sentinel() {
        let mut powerup = Powerup {
            id: EntityId(0),
            kind: PowerupKind::Chest,
            x: 100,
            y: 100,
        };
        assert!(!powerup.is_collected());
        powerup.mark_collected();
        assert!(powerup.is_collected());
        assert_eq!(powerup.kind.category(), PowerupCategory::Treasure);
    }

    #[test]
    fn test_reload_restores_pristine_grids() {
        let mut level = Level::from_data(test_data());
        level.tiles.set(1, 1, 0xff);
        level.state.stats.killed_monsters = 4;

        let fresh = level.reload();
        assert_eq!(fresh.tile(1, 1), 0);
        assert_eq!(fresh.state.stats.killed_monsters, 0);
        assert_eq!(fresh.floor, Rgb([1, 2, 3]));
    }

    #[test]
    fn test_level_time() {
        let mut state = LevelState::default();
        state.restart_clock(1_000, 5_000);
        assert_eq!(state.level_time_ms(3_500), 7_500);
        assert_eq!(state.level_time_ms(500), 5_000);
    }

    #[test]
    fn test_session_world_requires_both() {
        let mut session = Session::new(Skill::Medium);
        assert!(session.world().is_none());
        let level = Level::from_data(test_data());
        session.player = Some(Player::spawn(&level.spawn, None));
        session.level = Some(level);
        assert!(session.world_mut().is_some());
    }
}
