//! External Services
//!
//! Seams to the collaborators the core drives but does not implement: world
//! simulation (player movement, actor AI, doors, push walls), audio, the input
//! device and the wall clock.

use std::fmt;

use tokio::time::Instant;

use crate::game::input::{Command, RawInput};
use crate::game::state::{Actor, Level, Player, Skill};

/// Level-ending outcome reported by the player simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldSignal {
    /// Player used the regular exit.
    ExitLevel,
    /// Player used the secret exit.
    SecretExit,
    /// Episode boss defeated; start the victory sequence.
    Victory,
    /// Victory sequence finished; end the episode.
    EndEpisode,
}

/// World simulation collaborator.
pub trait WorldServices {
    /// Move the player and resolve pickups, attacks and exits.
    fn process_player(
        &mut self,
        level: &mut Level,
        player: &mut Player,
        cmd: &Command,
        tics: u32,
    ) -> Option<WorldSignal>;

    /// Run actor AI.
    fn process_actors(&mut self, level: &mut Level, player: &mut Player, tics: u32);

    /// Advance moving push walls.
    fn process_push_walls(&mut self, level: &mut Level, tics: u32);

    /// Advance doors.
    fn process_doors(&mut self, level: &mut Level, player: &Player, tics: u32);

    /// Drop stale sprites.
    fn clean_sprites(&mut self, level: &mut Level);

    /// Spawn the end-of-episode actor.
    fn spawn_victory_actor(&mut self, level: &mut Level, player: &Player, skill: Skill);

    /// An actor changed animation frame outside the AI (e.g. restored dead).
    fn actor_frame_changed(&mut self, _actor: &Actor) {}
}

/// Audio collaborator.
pub trait Audio {
    /// Start a music track, replacing the current one.
    fn start_music(&mut self, track: &str);

    /// Pause or resume music.
    fn pause_music(&mut self, paused: bool);

    /// Stop music and all sounds.
    fn stop_all(&mut self);
}

/// Input device collaborator.
pub trait InputDevice {
    /// Current device state.
    fn snapshot(&mut self) -> RawInput;

    /// Forget held keys and pointer motion.
    fn reset(&mut self);

    /// Request pointer lock.
    fn lock_pointer(&mut self);
}

/// Wall clock in milliseconds.
pub trait Clock {
    /// Current time in milliseconds.
    fn now_ms(&self) -> i64;
}

/// Clock backed by the tokio timer (honors `tokio::time::pause`).
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// Create a new clock starting at 0.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokioClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioClock").finish_non_exhaustive()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        assert_eq!(clock.now_ms(), 0);
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.now_ms(), 250);
    }
}
