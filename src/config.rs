//! Game Configuration
//!
//! Tunables for timing, controls, scoring, assets and display, plus the
//! rebindable control table. Everything can be loaded from a TOML file;
//! missing sections and fields fall back to the defaults below.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::TIC_RATE;

// =============================================================================
// ERRORS
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Unknown control action name.
    #[error("unknown control action: {0}")]
    UnknownAction(String),
}

// =============================================================================
// CONFIG
// =============================================================================

/// Top-level game configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Simulation tics per modeled second.
    pub tic_rate: u32,
    /// Logic loop frequency (wall clock).
    pub logic_hz: u32,
    /// Render loop frequency (wall clock).
    pub render_hz: u32,
    /// Seconds the death overlay fades before respawn / game over.
    pub death_seconds: u32,
    /// Run actor AI each cycle.
    pub process_ai: bool,
    /// Control tuning.
    pub controls: ControlConfig,
    /// Intermission scoring.
    pub scoring: ScoringConfig,
    /// Asset preload paths.
    pub assets: AssetConfig,
    /// Presentation scaling.
    pub display: DisplayConfig,
    /// Key bindings.
    pub bindings: ControlBindings,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tic_rate: TIC_RATE,
            logic_hz: 30,
            render_hz: 60,
            death_seconds: 2,
            process_ai: true,
            controls: ControlConfig::default(),
            scoring: ScoringConfig::default(),
            assets: AssetConfig::default(),
            display: DisplayConfig::default(),
            bindings: ControlBindings::default(),
        }
    }
}

impl GameConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Tics the death overlay runs before it expires.
    pub fn death_tics(&self) -> u32 {
        self.tic_rate * self.death_seconds
    }

    /// Logic loop period in milliseconds.
    pub fn logic_period_ms(&self) -> u64 {
        1000 / u64::from(self.logic_hz.max(1))
    }

    /// Render loop period in milliseconds.
    pub fn render_period_ms(&self) -> u64 {
        1000 / u64::from(self.render_hz.max(1))
    }
}

/// Movement and turning scales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Walking move value.
    pub base_move: i32,
    /// Running move value.
    pub run_move: i32,
    /// Forward / strafe multiplier.
    pub move_scale: i32,
    /// Backward multiplier.
    pub back_move_scale: i32,
    /// Angle units turned per tic by the turn keys.
    pub turn_angle_scale: i32,
    /// Pointer motion to angle multiplier while the pointer is locked.
    pub pointer_scale: f32,
    /// Pointer x dead band (normalized coordinates).
    pub pointer_dead_band: f32,
    /// Angle units per tic of the death turn.
    pub death_rotate: i32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            base_move: 35,
            run_move: 70,
            move_scale: 150,
            back_move_scale: 100,
            turn_angle_scale: 20,
            pointer_scale: 1.0,
            pointer_dead_band: 0.2,
            death_rotate: 20,
        }
    }
}

/// Intermission bonus rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points per second under par.
    pub par_bonus_per_second: u32,
    /// Points for each 100% ratio.
    pub perfect_ratio_bonus: u32,
    /// Flat bonus for finishing a secret level.
    pub secret_level_bonus: u32,
    /// Level time clamp in seconds.
    pub max_level_secs: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            par_bonus_per_second: 500,
            perfect_ratio_bonus: 10_000,
            secret_level_bonus: 15_000,
            max_level_secs: 99 * 60,
        }
    }
}

/// Asset paths used by the preload step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Texture resolution directory.
    pub resolution: String,
    /// Wall texture directory.
    pub wall_dir: String,
    /// Sprite directory.
    pub sprite_dir: String,
    /// Sprite sheets every level needs.
    pub static_sprites: Vec<String>,
    /// Per-file fetch timeout in milliseconds.
    pub fetch_timeout_ms: u64,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            resolution: "128".to_string(),
            wall_dir: "art/walls-shaded".to_string(),
            sprite_dir: "art/sprites".to_string(),
            static_sprites: vec!["002_053.png".to_string()],
            fetch_timeout_ms: 5_000,
        }
    }
}

/// Presentation scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Width of the unscaled view.
    pub reference_width: u32,
    /// Width of one ray slice in pixels.
    pub slice_width: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            reference_width: 640,
            slice_width: 3,
        }
    }
}

impl DisplayConfig {
    /// Zoom factor for a fullscreen window, snapped to whole slices.
    pub fn fullscreen_zoom(&self, window_width: u32) -> f32 {
        let slice = self.slice_width.max(1) as f32;
        let reference = self.reference_width.max(1) as f32;
        (slice * window_width as f32 / reference).floor() / slice
    }
}

// =============================================================================
// CONTROL BINDINGS
// =============================================================================

/// Abstract control actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Move forward.
    Up,
    /// Turn / strafe left.
    Left,
    /// Move backward.
    Down,
    /// Turn / strafe right.
    Right,
    /// Run modifier.
    Run,
    /// Fire.
    Attack,
    /// Open doors, push walls.
    Use,
    /// Strafe modifier.
    Strafe,
    /// Select knife.
    Weapon1,
    /// Select pistol.
    Weapon2,
    /// Select machine gun.
    Weapon3,
    /// Select chain gun.
    Weapon4,
}

impl Action {
    /// All actions in binding-table order.
    pub const ALL: [Action; 12] = [
        Action::Up,
        Action::Left,
        Action::Down,
        Action::Right,
        Action::Run,
        Action::Attack,
        Action::Use,
        Action::Strafe,
        Action::Weapon1,
        Action::Weapon2,
        Action::Weapon3,
        Action::Weapon4,
    ];

    /// Lowercase action name.
    pub fn name(self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Left => "left",
            Action::Down => "down",
            Action::Right => "right",
            Action::Run => "run",
            Action::Attack => "attack",
            Action::Use => "use",
            Action::Strafe => "strafe",
            Action::Weapon1 => "weapon1",
            Action::Weapon2 => "weapon2",
            Action::Weapon3 => "weapon3",
            Action::Weapon4 => "weapon4",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownAction(s.to_string()))
    }
}

/// Action to physical key table.
///
/// Key identifiers are upper-case names (`"UP"`, `"SHIFT"`, `"X"`, `"1"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlBindings(BTreeMap<Action, Vec<String>>);

impl Default for ControlBindings {
    fn default() -> Self {
        let table = [
            (Action::Up, "UP"),
            (Action::Left, "LEFT"),
            (Action::Down, "DOWN"),
            (Action::Right, "RIGHT"),
            (Action::Run, "SHIFT"),
            (Action::Attack, "X"),
            (Action::Use, "SPACE"),
            (Action::Strafe, "Z"),
            (Action::Weapon1, "1"),
            (Action::Weapon2, "2"),
            (Action::Weapon3, "3"),
            (Action::Weapon4, "4"),
        ];

        Self(
            table
                .into_iter()
                .map(|(action, key)| (action, vec![key.to_string()]))
                .collect(),
        )
    }
}

impl ControlBindings {
    /// Keys bound to an action. Unbound actions have no keys.
    pub fn keys(&self, action: Action) -> &[String] {
        self.0.get(&action).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the keys bound to one action.
    pub fn bind(&mut self, action: Action, keys: Vec<String>) {
        self.0.insert(action, keys);
    }

    /// Iterate over all bindings.
    pub fn iter(&self) -> impl Iterator<Item = (Action, &[String])> {
        self.0.iter().map(|(action, keys)| (*action, keys.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.tic_rate, 70);
        assert_eq!(config.death_tics(), 140);
        assert_eq!(config.logic_period_ms(), 33);
        assert_eq!(config.bindings.keys(Action::Attack), ["X".to_string()]);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = r#"
            logic_hz = 35

            [scoring]
            secret_level_bonus = 20000

            [bindings]
            up = ["UP", "W"]
        "#;
        let config = GameConfig::from_toml_str(text).unwrap();

        assert_eq!(config.logic_hz, 35);
        assert_eq!(config.render_hz, 60);
        assert_eq!(config.scoring.secret_level_bonus, 20_000);
        assert_eq!(config.scoring.par_bonus_per_second, 500);
        assert_eq!(config.bindings.keys(Action::Up), ["UP".to_string(), "W".to_string()]);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = GameConfig::from_toml_str("tic_rate = \"fast\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GameConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wolf.toml");
        std::fs::write(&path, "death_seconds = 3\n").unwrap();

        let config = GameConfig::load(&path).unwrap();
        assert_eq!(config.death_tics(), 210);
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("weapon3".parse::<Action>().unwrap(), Action::Weapon3);
        assert_eq!("STRAFE".parse::<Action>().unwrap(), Action::Strafe);
        assert!(matches!(
            "jump".parse::<Action>(),
            Err(ConfigError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_bind_replaces_keys() {
        let mut bindings = ControlBindings::default();
        bindings.bind(Action::Use, vec!["E".to_string()]);
        assert_eq!(bindings.keys(Action::Use), ["E".to_string()]);
        assert_eq!(bindings.iter().count(), Action::ALL.len());
    }

    #[test]
    fn test_fullscreen_zoom_snaps_to_slices() {
        let display = DisplayConfig::default();
        assert_eq!(display.fullscreen_zoom(640), 1.0);
        // floor(3 * 1920 / 640) / 3 = 3
        assert_eq!(display.fullscreen_zoom(1920), 3.0);
        // floor(3 * 1000 / 640) / 3 = 4 / 3
        assert!((display.fullscreen_zoom(1000) - 4.0 / 3.0).abs() < 1e-6);
    }
}
