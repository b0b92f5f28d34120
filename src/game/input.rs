//! Control Sampling
//!
//! Turns the raw device state (held keys and pointer) into a per-tic
//! [`Command`] for the player: button bits, forward and side movement, a turn
//! delta and an optional weapon switch.
//!
//! Sampling is pure. It reads the raw input, the bindings and the player's
//! loadout and writes nothing; the state machine applies the command.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{Action, ControlBindings, ControlConfig};
use crate::game::state::{Player, Weapon};

// =============================================================================
// COMMAND
// =============================================================================

/// Attack held.
pub const BUTTON_ATTACK: u8 = 0x01;
/// Use held.
pub const BUTTON_USE: u8 = 0x02;
/// Any key held.
pub const BUTTON_ANY: u8 = 0x80;

/// Player command for one logic cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Button bits (`BUTTON_*`).
    pub buttons: u8,
    /// Forward (+) / backward (-) movement.
    pub forward_move: i32,
    /// Right (+) / left (-) movement.
    pub side_move: i32,
    /// Angle units to add to the facing angle.
    pub angle_turn: i32,
    /// Weapon requested this cycle.
    pub weapon_change: Option<Weapon>,
}

impl Command {
    /// Check if a button bit is set.
    #[inline]
    pub fn has_button(&self, button: u8) -> bool {
        self.buttons & button != 0
    }

    /// Check if attack is held.
    #[inline]
    pub fn attack(&self) -> bool {
        self.has_button(BUTTON_ATTACK)
    }

    /// Check if use is held.
    #[inline]
    pub fn use_pressed(&self) -> bool {
        self.has_button(BUTTON_USE)
    }

    /// Apply the turn and weapon switch to the player.
    pub fn apply(&self, player: &mut Player) {
        player.angle += self.angle_turn;
        if let Some(weapon) = self.weapon_change {
            player.switch_weapon(weapon);
        }
    }
}

// =============================================================================
// RAW INPUT
// =============================================================================

/// Pointer (mouse) state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    /// Pointer lock active.
    pub locked: bool,
    /// Horizontal motion since the last sample, while locked.
    pub movement_x: f32,
    /// Position in normalized view coordinates (-1..1), if over the view.
    pub coords: Option<(f32, f32)>,
    /// Left button held.
    pub left_down: bool,
    /// Right button held.
    pub right_down: bool,
}

/// Device state at sampling time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawInput {
    keys: BTreeSet<String>,
    /// Pointer state.
    pub pointer: PointerState,
}

impl RawInput {
    /// Create an empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an input with the given keys held.
    pub fn with_keys(keys: &[&str]) -> Self {
        let mut input = Self::new();
        for key in keys {
            input.press(key);
        }
        input
    }

    /// Hold a key.
    pub fn press(&mut self, key: &str) {
        self.keys.insert(key.to_ascii_uppercase());
    }

    /// Release a key.
    pub fn release(&mut self, key: &str) {
        self.keys.remove(&key.to_ascii_uppercase());
    }

    /// Release everything.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.pointer = PointerState::default();
    }

    /// Whether a key is held.
    pub fn is_down(&self, key: &str) -> bool {
        self.keys.contains(&key.to_ascii_uppercase())
    }

    /// Whether any key of a binding is held.
    pub fn any_down(&self, keys: &[String]) -> bool {
        keys.iter().any(|key| self.is_down(key))
    }

    /// Whether any key at all is held.
    pub fn has_keys(&self) -> bool {
        !self.keys.is_empty()
    }
}

// =============================================================================
// SAMPLING
// =============================================================================

/// Everything sampling needs besides the raw input.
#[derive(Clone, Copy, Debug)]
pub struct SampleContext<'a> {
    /// Key bindings.
    pub bindings: &'a ControlBindings,
    /// Movement scales.
    pub controls: &'a ControlConfig,
    /// Pointer-look enabled.
    pub pointer_enabled: bool,
    /// Tics in this cycle.
    pub tics: u32,
}

/// Slot order for weapon keys; later entries win.
const WEAPON_KEYS: [(Action, Weapon); 4] = [
    (Action::Weapon1, Weapon::Knife),
    (Action::Weapon2, Weapon::Pistol),
    (Action::Weapon3, Weapon::MachineGun),
    (Action::Weapon4, Weapon::ChainGun),
];

/// Sample the controls into a command for `player`.
pub fn sample(input: &RawInput, player: &Player, ctx: &SampleContext<'_>) -> Command {
    let mut cmd = Command::default();
    let controls = ctx.controls;
    let held = |action: Action| input.any_down(ctx.bindings.keys(action));
    let tics = ctx.tics as i32;
    let pointer = &input.pointer;

    if input.has_keys() {
        cmd.buttons |= BUTTON_ANY;
    }

    let up = held(Action::Up);
    let down = held(Action::Down);
    let left = held(Action::Left);
    let right = held(Action::Right);
    let strafing = held(Action::Strafe);
    let move_value = if held(Action::Run) {
        controls.run_move
    } else {
        controls.base_move
    };

    if held(Action::Attack) || (ctx.pointer_enabled && pointer.left_down) {
        cmd.buttons |= BUTTON_ATTACK;
    }

    // Forward / back
    if ctx.pointer_enabled && pointer.right_down {
        if let Some((_, y)) = pointer.coords {
            let scale = if y < 0.0 {
                controls.move_scale
            } else {
                controls.back_move_scale
            };
            cmd.forward_move += (-(scale as f32) * move_value as f32 * y) as i32;
        }
    } else if !(up && down) {
        if up {
            cmd.forward_move += move_value * controls.move_scale;
        }
        if down {
            cmd.forward_move -= move_value * controls.back_move_scale;
        }
    }

    // Turning / strafing
    if ctx.pointer_enabled && pointer.locked {
        let turn = pointer.movement_x * controls.pointer_scale * controls.turn_angle_scale as f32;
        cmd.angle_turn -= (turn * tics as f32) as i32;
    } else {
        if left {
            if strafing {
                cmd.side_move -= move_value * controls.move_scale;
            } else {
                cmd.angle_turn += controls.turn_angle_scale * tics;
            }
        }
        if right {
            if strafing {
                cmd.side_move += move_value * controls.move_scale;
            } else {
                cmd.angle_turn -= controls.turn_angle_scale * tics;
            }
        }

        if ctx.pointer_enabled {
            if let Some((x, _)) = pointer.coords {
                let band = controls.pointer_dead_band;
                if x.abs() > band {
                    let edge = if x < 0.0 { band } else { -band };
                    let turn = controls.turn_angle_scale as f32 * tics as f32 * (x + edge);
                    cmd.angle_turn -= turn as i32;
                }
            }
        }
    }

    // Weapon switch: every eligible key is checked, the highest slot wins.
    for (action, weapon) in WEAPON_KEYS {
        if held(action) && player.can_select(weapon) {
            cmd.weapon_change = Some(weapon);
        }
    }

    if held(Action::Use) {
        cmd.buttons |= BUTTON_USE;
    }

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{AMMO_BULLETS, ITEM_WEAPON_3, ITEM_WEAPON_4};
    use crate::level::data::SpawnPoint;

    fn player() -> Player {
        Player::spawn(&SpawnPoint::at_tile(1, 1, 0), None)
    }

    fn sample_with(input: &RawInput, player: &Player, pointer_enabled: bool, tics: u32) -> Command {
        let bindings = ControlBindings::default();
        let controls = ControlConfig::default();
        let ctx = SampleContext {
            bindings: &bindings,
            controls: &controls,
            pointer_enabled,
            tics,
        };
        sample(input, player, &ctx)
    }

    #[test]
    fn test_idle_input_is_empty() {
        let cmd = sample_with(&RawInput::new(), &player(), false, 2);
        assert_eq!(cmd, Command::default());
    }

    #[test]
    fn test_walk_and_run_forward() {
        let cmd = sample_with(&RawInput::with_keys(&["UP"]), &player(), false, 2);
        assert_eq!(cmd.forward_move, 35 * 150);
        assert!(cmd.has_button(BUTTON_ANY));

        let cmd = sample_with(&RawInput::with_keys(&["UP", "SHIFT"]), &player(), false, 2);
        assert_eq!(cmd.forward_move, 70 * 150);
    }

    #[test]
    fn test_back_uses_back_scale() {
        let cmd = sample_with(&RawInput::with_keys(&["DOWN"]), &player(), false, 1);
        assert_eq!(cmd.forward_move, -35 * 100);
    }

    #[test]
    fn test_up_and_down_cancel() {
        let cmd = sample_with(&RawInput::with_keys(&["UP", "DOWN"]), &player(), false, 1);
        assert_eq!(cmd.forward_move, 0);
    }

    #[test]
    fn test_turn_scales_with_tics() {
        let controls = ControlConfig::default();
        let cmd = sample_with(&RawInput::with_keys(&["LEFT"]), &player(), false, 3);
        assert_eq!(cmd.angle_turn, controls.turn_angle_scale * 3);

        let cmd = sample_with(&RawInput::with_keys(&["RIGHT"]), &player(), false, 3);
        assert_eq!(cmd.angle_turn, -controls.turn_angle_scale * 3);
    }

    #[test]
    fn test_strafe_turns_keys_into_side_move() {
        let cmd = sample_with(&RawInput::with_keys(&["Z", "LEFT"]), &player(), false, 3);
        assert_eq!(cmd.angle_turn, 0);
        assert_eq!(cmd.side_move, -35 * 150);
    }

    #[test]
    fn test_attack_and_use_buttons() {
        let cmd = sample_with(&RawInput::with_keys(&["X", "SPACE"]), &player(), false, 1);
        assert!(cmd.attack());
        assert!(cmd.use_pressed());
    }

    #[test]
    fn test_pointer_buttons_need_pointer_enabled() {
        let mut input = RawInput::new();
        input.pointer.left_down = true;

        assert!(!sample_with(&input, &player(), false, 1).attack());
        assert!(sample_with(&input, &player(), true, 1).attack());
    }

    #[test]
    fn test_locked_pointer_suppresses_key_turning() {
        let mut input = RawInput::with_keys(&["LEFT"]);
        input.pointer.locked = true;
        input.pointer.movement_x = 2.0;

        let controls = ControlConfig::default();
        let cmd = sample_with(&input, &player(), true, 1);
        assert_eq!(cmd.angle_turn, -(2 * controls.turn_angle_scale));
    }

    #[test]
    fn test_pointer_dead_band() {
        let mut input = RawInput::new();
        input.pointer.coords = Some((0.1, 0.0));
        assert_eq!(sample_with(&input, &player(), true, 2).angle_turn, 0);

        input.pointer.coords = Some((0.7, 0.0));
        let controls = ControlConfig::default();
        let expected =
            (controls.turn_angle_scale as f32 * 2.0 * (0.7f32 - controls.pointer_dead_band)) as i32;
        assert_eq!(sample_with(&input, &player(), true, 2).angle_turn, -expected);
    }

    #[test]
    fn test_right_button_drives_forward_from_pointer() {
        let mut input = RawInput::with_keys(&["DOWN"]);
        input.pointer.right_down = true;
        input.pointer.coords = Some((0.0, -0.5));

        let cmd = sample_with(&input, &player(), true, 1);
        assert_eq!(cmd.forward_move, (150.0f32 * 35.0 * 0.5) as i32);
    }

    #[test]
    fn test_highest_weapon_slot_wins() {
        let mut p = player();
        p.items |= ITEM_WEAPON_3;
        let cmd = sample_with(&RawInput::with_keys(&["1", "3"]), &p, false, 1);
        assert_eq!(cmd.weapon_change, Some(Weapon::MachineGun));
    }

    #[test]
    fn test_weapon_switch_requires_ownership_and_ammo() {
        let mut p = player();
        let cmd = sample_with(&RawInput::with_keys(&["4"]), &p, false, 1);
        assert_eq!(cmd.weapon_change, None);

        p.items |= ITEM_WEAPON_4;
        p.ammo[AMMO_BULLETS] = 0;
        let cmd = sample_with(&RawInput::with_keys(&["4"]), &p, false, 1);
        assert_eq!(cmd.weapon_change, None);

        let cmd = sample_with(&RawInput::with_keys(&["1", "4"]), &p, false, 1);
        assert_eq!(cmd.weapon_change, Some(Weapon::Knife));
    }

    #[test]
    fn test_apply_turns_and_switches() {
        let mut p = player();
        let cmd = Command {
            angle_turn: 40,
            weapon_change: Some(Weapon::Knife),
            ..Command::default()
        };
        cmd.apply(&mut p);
        assert_eq!(p.angle, 40);
        assert_eq!(p.weapon, Weapon::Knife);
        assert_eq!(p.previous_weapon, Weapon::Pistol);
    }
}
