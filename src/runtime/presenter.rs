//! Presentation Contract
//!
//! The core never draws. It hands presentation models to a [`Presenter`]:
//! which screens are visible, the HUD, the death overlay, a viewpoint per
//! rendered frame, the intermission report and the overhead map.

use serde::{Deserialize, Serialize};

use crate::core::{angle_to_radians, layout_digits, DigitCell};
use crate::game::intermission::IntermissionReport;
use crate::game::state::{Level, Player, Playstate, ITEM_KEY_1, ITEM_KEY_2};
use crate::level::data::{Rgb, ELEVATOR_TILE, SECRET_TILE, SOLID_TILE};
use crate::TILE_SHIFT;

/// Screens the presenter can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Screen {
    /// The game container.
    Game,
    /// The 3D view.
    Renderer,
    /// Level loading indicator.
    Loading,
    /// Game over.
    GameOver,
    /// Level tally.
    Intermission,
    /// Overhead map.
    Map,
    /// Pause overlay.
    Pause,
}

/// Short full-view flashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flash {
    /// Player took damage.
    Damage,
    /// Player picked something up.
    Bonus,
}

/// Camera for one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewpoint {
    /// World x.
    pub x: i32,
    /// World y.
    pub y: i32,
    /// Facing angle.
    pub angle: i32,
}

impl Viewpoint {
    /// Viewpoint of the player.
    pub fn of(player: &Player) -> Self {
        Self {
            x: player.x,
            y: player.y,
            angle: player.angle,
        }
    }
}

/// HUD contents for one logic cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HudSnapshot {
    /// Weapon sprite shown (hidden while dead or in victory).
    pub weapon_visible: bool,
    /// Weapon sprite frame (`weapon * 4 + weapon_frame`).
    pub weapon_frame: u32,
    /// Weapon icon slot.
    pub weapon_icon: u32,
    /// Gold key held.
    pub key1: bool,
    /// Silver key held.
    pub key2: bool,
    /// Ammo digits.
    pub ammo: Vec<DigitCell>,
    /// Health digits.
    pub health: Vec<DigitCell>,
    /// Lives digits.
    pub lives: Vec<DigitCell>,
    /// Score digits.
    pub score: Vec<DigitCell>,
    /// Floor digits.
    pub floor: Vec<DigitCell>,
    /// Face picture index.
    pub face: u32,
}

impl HudSnapshot {
    /// Build the HUD for `player` on level `level_index`.
    pub fn capture(player: &Player, level_index: usize) -> Self {
        let health = player.health.clamp(0, 999) as u32;
        let face = if player.health > 0 {
            3 * ((100 - health.min(100)) / 16)
        } else {
            21
        };

        Self {
            weapon_visible: !matches!(player.playstate, Playstate::Dead | Playstate::Victory),
            weapon_frame: player.weapon.slot() * 4 + u32::from(player.weapon_frame),
            weapon_icon: player.weapon.slot(),
            key1: player.has_item(ITEM_KEY_1),
            key2: player.has_item(ITEM_KEY_2),
            ammo: layout_digits(player.bullets(), 2, false),
            health: layout_digits(health, 3, false),
            lives: layout_digits(player.lives, 1, false),
            score: layout_digits(player.score, 6, false),
            floor: layout_digits(level_index as u32 + 1, 2, false),
            face,
        }
    }
}

/// Overhead map model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automap {
    /// Map width in tiles.
    pub width: usize,
    /// Map height in tiles.
    pub height: usize,
    /// Solid tiles, row 0 at the top.
    pub walls: Vec<(usize, usize)>,
    /// Secret push walls.
    pub secrets: Vec<(usize, usize)>,
    /// Elevator tiles.
    pub elevators: Vec<(usize, usize)>,
    /// Player tile, row 0 at the top.
    pub player_tile: (usize, usize),
    /// Player heading in radians.
    pub player_heading: f64,
}

impl Automap {
    /// Build the overhead map for a level and player.
    pub fn build(level: &Level, player: &Player) -> Self {
        let width = level.tiles.width();
        let height = level.tiles.height();
        let flip = |y: usize| height.saturating_sub(1).saturating_sub(y);

        let mut walls = Vec::new();
        let mut secrets = Vec::new();
        let mut elevators = Vec::new();

        for (x, y, &flags) in level.tiles.iter() {
            let cell = (x, flip(y));
            if flags & ELEVATOR_TILE != 0 {
                elevators.push(cell);
            } else if flags & SECRET_TILE != 0 {
                secrets.push(cell);
            } else if flags & SOLID_TILE != 0 {
                walls.push(cell);
            }
        }

        let tile_x = (player.x.max(0) >> TILE_SHIFT) as usize;
        let tile_y = (player.y.max(0) >> TILE_SHIFT) as usize;

        Self {
            width,
            height,
            walls,
            secrets,
            elevators,
            player_tile: (tile_x, flip(tile_y)),
            player_heading: angle_to_radians(player.angle),
        }
    }
}

/// Presentation collaborator.
///
/// Implementations own all drawing; every method is a command or a query about
/// screen visibility. Called only from the logic and render loops.
pub trait Presenter {
    /// Show a screen.
    fn show(&mut self, screen: Screen);

    /// Hide a screen.
    fn hide(&mut self, screen: Screen);

    /// Whether a screen is visible.
    fn is_visible(&self, screen: Screen) -> bool;

    /// Set floor and ceiling colors.
    fn set_floor_ceiling(&mut self, floor: Rgb, ceiling: Rgb);

    /// Set the red death overlay opacity; `None` hides it.
    fn set_death_overlay(&mut self, opacity: Option<f32>);

    /// Start a flash.
    fn flash(&mut self, flash: Flash);

    /// Hide all flashes.
    fn clear_flashes(&mut self);

    /// Update the HUD.
    fn update_hud(&mut self, hud: &HudSnapshot);

    /// Show or hide the weapon sprite.
    fn set_weapon_visible(&mut self, visible: bool);

    /// Render one frame.
    fn draw_frame(&mut self, view: &Viewpoint, level: &Level);

    /// Drop renderer caches.
    fn reset_renderer(&mut self);

    /// Fill in the intermission screen.
    fn show_intermission(&mut self, report: &IntermissionReport);

    /// Show episode victory text pages.
    fn show_victory_text(&mut self, name: &str, pages: u32);

    /// Hand control to the main menu.
    fn show_menu(&mut self);

    /// Draw the overhead map.
    fn draw_map(&mut self, map: &Automap);

    /// Set the presentation zoom.
    fn set_scale(&mut self, zoom: f32);
}
