//! Death Sequence
//!
//! A dead player first swings around to face whoever killed them, then a red
//! overlay fades in over [`DeathTimer::max_tics`] tics. When it expires the
//! level restarts (lives left) or the game ends.

use crate::core::{angle_toward, normalize_angle};
use crate::game::state::{Level, Player};
use crate::ANGLES;

/// Result of one step of the death turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStep {
    /// Already facing the target; the turn is over.
    Facing,
    /// Turned towards the target; the new angle.
    Turned(i32),
}

/// Step `current` towards `target` along the shorter arc.
///
/// Moves at most `budget` units and never overshoots. Reports [`TurnStep::Facing`]
/// only when the angles are already equal on entry.
pub fn turn_toward(current: i32, target: i32, budget: i32) -> TurnStep {
    let mut current = normalize_angle(current);
    let target = normalize_angle(target);

    if current == target {
        return TurnStep::Facing;
    }

    let (clockwise, counter) = if current > target {
        (ANGLES - current + target, current - target)
    } else {
        (target - current, current + ANGLES - target)
    };

    let budget = budget.max(0);
    if clockwise < counter {
        if current > target {
            current -= ANGLES;
        }
        current += budget.min(target - current);
    } else {
        if current < target {
            current += ANGLES;
        }
        current -= budget.min(current - target);
    }

    TurnStep::Turned(normalize_angle(current))
}

/// Turn a dead player towards the last attacker.
///
/// Returns true once the player faces the attacker. A missing attacker (never
/// recorded, or no longer in the level) counts as already facing.
pub fn face_killer(level: &Level, player: &mut Player, tics: u32, rotate_per_tic: i32) -> bool {
    let Some(killer) = player
        .last_attacker
        .and_then(|id| level.state.actor(id))
    else {
        return true;
    };

    let target = angle_toward(player.position(), (killer.x, killer.y));
    let budget = (tics as i32).saturating_mul(rotate_per_tic);

    match turn_toward(player.angle, target, budget) {
        TurnStep::Facing => true,
        TurnStep::Turned(angle) => {
            player.angle = angle;
            false
        }
    }
}

/// Progress of the death overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeathProgress {
    /// Still fading; overlay opacity in `[0, 1)`.
    Fading(f32),
    /// Timer expired.
    Expired,
}

/// Death overlay timer.
#[derive(Debug, Clone)]
pub struct DeathTimer {
    tics: u32,
    max_tics: u32,
}

impl DeathTimer {
    /// Create a new timer that expires after `max_tics`.
    pub fn new(max_tics: u32) -> Self {
        Self {
            tics: 0,
            max_tics: max_tics.max(1),
        }
    }

    /// Tics until expiry.
    pub fn max_tics(&self) -> u32 {
        self.max_tics
    }

    /// Tics accumulated so far.
    pub fn tics(&self) -> u32 {
        self.tics
    }

    /// Accumulate tics. Resets itself on expiry.
    pub fn advance(&mut self, tics: u32) -> DeathProgress {
        self.tics = self.tics.saturating_add(tics);
        if self.tics >= self.max_tics {
            self.tics = 0;
            DeathProgress::Expired
        } else {
            DeathProgress::Fading(self.tics as f32 / self.max_tics as f32)
        }
    }

    /// Clear accumulated tics.
    pub fn reset(&mut self) {
        self.tics = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Actor, ActorKind, EntityId, Skill};
    use crate::level::data::{Grid, LevelData, Rgb, SpawnPoint};
    use proptest::prelude::*;
    use std::rc::Rc;

    fn level_with_killer(at: (i32, i32)) -> Level {
        let data = Rc::new(LevelData {
            name: "death".to_string(),
            tiles: Grid::filled(8, 8, 0),
            wall_tex_x: Grid::filled(8, 8, 0),
            wall_tex_y: Grid::filled(8, 8, 0),
            floor: Rgb::default(),
            ceiling: Rgb::default(),
            music: String::new(),
            spawn: SpawnPoint { x: 0, y: 0, angle: 0 },
            placements: Vec::new(),
        });
        let mut level = Level::from_data(data);
        level
            .state
            .actors
            .push(Actor::new(EntityId(1), ActorKind::Guard, at, 0, false, Skill::Easy));
        level
    }

    #[test]
    fn test_turn_takes_short_way() {
        // 100 -> 3500: counter-clockwise through 0 is 200 units
        assert_eq!(turn_toward(100, 3500, 50), TurnStep::Turned(50));
        assert_eq!(turn_toward(100, 3500, 150), TurnStep::Turned(3550));
        // 3500 -> 100: clockwise through 0
        assert_eq!(turn_toward(3500, 100, 50), TurnStep::Turned(3550));
    }

    #[test]
    fn test_turn_never_overshoots() {
        assert_eq!(turn_toward(0, 30, 1000), TurnStep::Turned(30));
        assert_eq!(turn_toward(30, 30, 1000), TurnStep::Facing);
    }

    #[test]
    fn test_face_killer_converges() {
        let level = level_with_killer((0, 1000));
        let mut player = Player::spawn(&level.spawn, None);
        player.last_attacker = Some(EntityId(1));

        let mut steps = 0;
        while !face_killer(&level, &mut player, 2, 20) {
            steps += 1;
            assert!(steps < 100);
        }
        assert_eq!(player.angle, ANGLES / 4);
    }

    #[test]
    fn test_missing_killer_counts_as_facing() {
        let level = level_with_killer((0, 1000));
        let mut player = Player::spawn(&level.spawn, None);
        assert!(face_killer(&level, &mut player, 2, 20));

        player.last_attacker = Some(EntityId(99));
        assert!(face_killer(&level, &mut player, 2, 20));
        assert_eq!(player.angle, 0);
    }

    #[test]
    fn test_timer_opacity_then_expiry() {
        let mut timer = DeathTimer::new(140);
        assert_eq!(timer.advance(70), DeathProgress::Fading(0.5));
        assert_eq!(timer.advance(69), DeathProgress::Fading(139.0 / 140.0));
        assert_eq!(timer.advance(1), DeathProgress::Expired);
        assert_eq!(timer.tics(), 0);
    }

    proptest! {
        #[test]
        fn prop_turn_converges(current in 0i32..ANGLES, target in 0i32..ANGLES, budget in 1i32..200) {
            let mut angle = current;
            let mut steps = 0;
            loop {
                match turn_toward(angle, target, budget) {
                    TurnStep::Facing => break,
                    TurnStep::Turned(next) => {
                        prop_assert!((0..ANGLES).contains(&next));
                        angle = next;
                    }
                }
                steps += 1;
                prop_assert!(steps <= ANGLES / budget + 2);
            }
            prop_assert_eq!(angle, target);
        }
    }
}
