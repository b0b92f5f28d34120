//! Game State Machine
//!
//! One logic cycle of a session: sample controls, run the world, and drive the
//! Playing / Dying / GameOver / Victory / Intermission transitions.
//!
//! # Cycle Order
//!
//! 1. Halted phases (GameOver, Intermission) return immediately
//! 2. Living player: sample controls, normalize angle, player, actors, push walls, doors
//! 3. Dead player: face the killer, then run the death timer
//! 4. Sprite cleanup and HUD update

use tracing::{debug, info};

use crate::config::{ControlBindings, ControlConfig};
use crate::core::normalize_angle;
use crate::game::death::{face_killer, DeathProgress, DeathTimer};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::{sample, Command, RawInput, SampleContext};
use crate::game::state::{Level, Player, Playstate, Session, Skill};
use crate::level::spawn::scan_placements;
use crate::runtime::presenter::{HudSnapshot, Presenter};
use crate::runtime::services::{WorldServices, WorldSignal};

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    /// Normal play.
    #[default]
    Playing,
    /// Player dead; death turn and overlay running.
    Dying,
    /// No lives left; waiting for confirm.
    GameOver,
    /// Victory sequence running.
    Victory,
    /// Level finished; waiting for confirm.
    Intermission,
}

impl GamePhase {
    /// Whether the simulation is halted in this phase.
    pub fn is_halted(self) -> bool {
        matches!(self, GamePhase::GameOver | GamePhase::Intermission)
    }
}

/// Per-cycle inputs from the controller.
#[derive(Debug, Clone, Copy)]
pub struct CycleInput<'a> {
    /// Device state.
    pub raw: &'a RawInput,
    /// Key bindings.
    pub bindings: &'a ControlBindings,
    /// Movement scales.
    pub controls: &'a ControlConfig,
    /// Pointer-look enabled.
    pub pointer_enabled: bool,
    /// Run actor AI.
    pub process_ai: bool,
    /// Wall clock (ms), for level clock restarts.
    pub now_ms: i64,
}

/// Result of a logic cycle.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this cycle
    pub events: Vec<GameEvent>,
    /// Command applied to the player, if it was sampled
    pub command: Option<Command>,
}

/// Drives one session through its phases.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    phase: GamePhase,
    death: DeathTimer,
    cycle: u64,
}

impl GameStateMachine {
    /// Create a new state machine.
    ///
    /// `death_tics` is how long the death overlay fades before expiring.
    pub fn new(death_tics: u32) -> Self {
        Self {
            phase: GamePhase::Playing,
            death: DeathTimer::new(death_tics),
            cycle: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Logic cycles run so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Back to Playing for a freshly started level.
    pub fn reset(&mut self) {
        self.phase = GamePhase::Playing;
        self.death.reset();
    }

    /// Halt for the intermission screen.
    pub fn enter_intermission(&mut self) {
        self.phase = GamePhase::Intermission;
    }

    /// Halt for the game-over screen.
    pub fn enter_game_over(&mut self) {
        self.phase = GamePhase::GameOver;
    }

    /// Run one logic cycle covering `tics` tics.
    pub fn tick(
        &mut self,
        session: &mut Session,
        tics: u32,
        input: &CycleInput<'_>,
        world: &mut dyn WorldServices,
        presenter: &mut dyn Presenter,
    ) -> TickResult {
        let mut result = TickResult::default();
        self.cycle += 1;

        if self.phase.is_halted() {
            return result;
        }

        let skill = session.skill;
        let level_index = session.level_index;
        let Some((level, player)) = session.world_mut() else {
            return result;
        };

        if player.playstate != Playstate::Dead {
            if player.is_alive() {
                let ctx = SampleContext {
                    bindings: input.bindings,
                    controls: input.controls,
                    pointer_enabled: input.pointer_enabled,
                    tics,
                };
                let cmd = sample(input.raw, player, &ctx);
                let held = player.weapon;
                cmd.apply(player);
                if let Some(to) = cmd.weapon_change.filter(|&w| w != held) {
                    result.events.push(GameEvent::weapon_changed(self.cycle, held, to));
                }
                result.command = Some(cmd);
            }

            player.angle = normalize_angle(player.angle);

            let cmd = result.command.unwrap_or_default();
            let signal = world.process_player(level, player, &cmd, tics);
            if input.process_ai {
                world.process_actors(level, player, tics);
            }
            world.process_push_walls(level, tics);
            world.process_doors(level, player, tics);

            if player.playstate == Playstate::Dead {
                info!(attacker = ?player.last_attacker, "player died");
                self.phase = GamePhase::Dying;
                self.death.reset();
                result
                    .events
                    .push(GameEvent::player_died(self.cycle, player.last_attacker));
            }

            if let Some(signal) = signal {
                self.handle_signal(signal, level, player, skill, world, presenter, &mut result);
            }
        } else {
            self.phase = GamePhase::Dying;

            if face_killer(level, player, tics, input.controls.death_rotate) {
                match self.death.advance(tics) {
                    DeathProgress::Fading(opacity) => {
                        presenter.set_death_overlay(Some(opacity));
                    }
                    DeathProgress::Expired => {
                        presenter.set_death_overlay(None);

                        if player.lives > 0 {
                            let lives = player.lives - 1;
                            let score = player.start_score;

                            *level = level.reload();
                            scan_placements(level, skill, None);

                            let mut respawned = Player::spawn(&level.spawn, None);
                            respawned.lives = lives;
                            respawned.score = score;
                            respawned.start_score = score;
                            *player = respawned;
                            level.state.restart_clock(input.now_ms, 0);

                            info!(lives_left = lives, "player respawned");
                            self.phase = GamePhase::Playing;
                            result
                                .events
                                .push(GameEvent::player_respawned(self.cycle, lives));
                        } else {
                            info!("game over");
                            self.phase = GamePhase::GameOver;
                            result
                                .events
                                .push(GameEvent::new(self.cycle, GameEventData::GameOver));
                            return result;
                        }
                    }
                }
            }
        }

        world.clean_sprites(level);
        presenter.update_hud(&HudSnapshot::capture(player, level_index));

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(cycle = self.cycle, tics, phase = ?self.phase, "logic cycle");

        result
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_signal(
        &mut self,
        signal: WorldSignal,
        level: &mut Level,
        player: &mut Player,
        skill: Skill,
        world: &mut dyn WorldServices,
        presenter: &mut dyn Presenter,
        result: &mut TickResult,
    ) {
        match signal {
            WorldSignal::ExitLevel => {
                debug!("level exit");
                self.phase = GamePhase::Intermission;
                result.events.push(GameEvent::level_exited(self.cycle, false));
            }
            WorldSignal::SecretExit => {
                debug!("secret exit");
                player.playstate = Playstate::SecretLevel;
                self.phase = GamePhase::Intermission;
                result.events.push(GameEvent::level_exited(self.cycle, true));
            }
            WorldSignal::Victory => {
                if player.playstate == Playstate::Victory {
                    return;
                }
                info!("victory");
                presenter.set_weapon_visible(false);
                world.spawn_victory_actor(level, player, skill);
                player.playstate = Playstate::Victory;
                self.phase = GamePhase::Victory;
                result
                    .events
                    .push(GameEvent::new(self.cycle, GameEventData::VictoryStarted));
            }
            WorldSignal::EndEpisode => {
                info!("episode ended");
                self.phase = GamePhase::Intermission;
                result
                    .events
                    .push(GameEvent::new(self.cycle, GameEventData::EpisodeEnded));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::EntityId;
    use crate::runtime::headless::{sample_level, HeadlessPresenter, ScriptedWorld};
    use std::rc::Rc;

    struct Rig {
        machine: GameStateMachine,
        session: Session,
        world: ScriptedWorld,
        presenter: HeadlessPresenter,
        bindings: ControlBindings,
        controls: ControlConfig,
    }

    impl Rig {
        fn new() -> Self {
            let mut level = Level::from_data(Rc::new(sample_level("tick")));
            scan_placements(&mut level, Skill::Medium, None);
            let mut session = Session::new(Skill::Medium);
            session.player = Some(Player::spawn(&level.spawn, None));
            session.level = Some(level);
            Self {
                machine: GameStateMachine::new(140),
                session,
                world: ScriptedWorld::new(),
                presenter: HeadlessPresenter::new(),
                bindings: ControlBindings::default(),
                controls: ControlConfig::default(),
            }
        }

        fn tick(&mut self, raw: &RawInput, tics: u32) -> TickResult {
            let input = CycleInput {
                raw,
                bindings: &self.bindings,
                controls: &self.controls,
                pointer_enabled: false,
                process_ai: true,
                now_ms: 0,
            };
            self.machine.tick(
                &mut self.session,
                tics,
                &input,
                &mut self.world,
                &mut self.presenter,
            )
        }

        fn player(&mut self) -> &mut Player {
            self.session.player.as_mut().unwrap()
        }
    }

    #[test]
    fn test_playing_cycle_runs_world() {
        let mut rig = Rig::new();
        let result = rig.tick(&RawInput::with_keys(&["LEFT"]), 2);

        assert!(result.events.is_empty());
        assert_eq!(result.command.unwrap().angle_turn, 40);
        assert_eq!(rig.player().angle, 40);

        let log = rig.world.log();
        assert_eq!(log.player_cycles, 1);
        assert_eq!(log.actor_cycles, 1);
        assert_eq!(log.door_cycles, 1);
        assert!(rig.presenter.log().hud.is_some());
    }

    #[test]
    fn test_angle_normalized_after_turn() {
        let mut rig = Rig::new();
        rig.player().angle = 10;
        rig.tick(&RawInput::with_keys(&["RIGHT"]), 1);
        assert_eq!(rig.player().angle, crate::ANGLES - 10);
    }

    #[test]
    fn test_death_then_respawn() {
        let mut rig = Rig::new();
        rig.player().score = 5_000;
        rig.player().start_score = 1_000;
        rig.world.kill_player(None);

        let result = rig.tick(&RawInput::new(), 2);
        assert_eq!(rig.machine.phase(), GamePhase::Dying);
        assert!(matches!(
            result.events[0].data,
            GameEventData::PlayerDied { attacker: None }
        ));

        // 140 tics of overlay, no attacker so the timer starts immediately
        rig.tick(&RawInput::new(), 70);
        assert_eq!(rig.presenter.log().death_overlay, Some(0.5));
        let result = rig.tick(&RawInput::new(), 70);

        assert_eq!(rig.machine.phase(), GamePhase::Playing);
        assert!(matches!(
            result.events[0].data,
            GameEventData::PlayerRespawned { lives_left: 2 }
        ));
        assert_eq!(rig.presenter.log().death_overlay, None);
        let player = rig.player().clone();
        assert_eq!(player.lives, 2);
        assert_eq!(player.score, 1_000);
        assert!(player.is_alive());
        assert_eq!(player.health, Player::START_HEALTH);
    }

    #[test]
    fn test_dead_player_is_not_controlled() {
        let mut rig = Rig::new();
        rig.world.kill_player(None);
        rig.tick(&RawInput::new(), 1);
        let cycles = rig.world.log().player_cycles;

        let result = rig.tick(&RawInput::with_keys(&["UP"]), 1);
        assert!(result.command.is_none());
        assert_eq!(rig.world.log().player_cycles, cycles);
    }

    #[test]
    fn test_death_turn_before_timer() {
        let mut rig = Rig::new();
        let attacker = rig.session.level.as_ref().unwrap().state.actors[0].id;
        rig.player().angle = 0;
        rig.world.kill_player(Some(attacker));
        rig.tick(&RawInput::new(), 1);

        // Turning consumes cycles before any overlay appears
        rig.tick(&RawInput::new(), 1);
        assert_eq!(rig.presenter.log().death_overlay, None);
        assert_ne!(rig.player().angle, 0);
    }

    #[test]
    fn test_game_over_with_no_lives() {
        let mut rig = Rig::new();
        rig.player().lives = 0;
        rig.world.kill_player(Some(EntityId(999)));
        rig.tick(&RawInput::new(), 1);

        let result = rig.tick(&RawInput::new(), 140);
        assert_eq!(rig.machine.phase(), GamePhase::GameOver);
        assert!(matches!(result.events[0].data, GameEventData::GameOver));

        // Halted: no more world processing
        let cycles = rig.world.log().player_cycles;
        rig.tick(&RawInput::new(), 10);
        assert_eq!(rig.world.log().player_cycles, cycles);
    }

    #[test]
    fn test_exit_signals() {
        let mut rig = Rig::new();
        rig.world.signal(WorldSignal::SecretExit);
        let result = rig.tick(&RawInput::new(), 1);

        assert_eq!(rig.machine.phase(), GamePhase::Intermission);
        assert_eq!(rig.player().playstate, Playstate::SecretLevel);
        assert!(result.events.iter().any(GameEvent::ends_level));
    }

    #[test]
    fn test_victory_is_sticky() {
        let mut rig = Rig::new();
        rig.world.signal(WorldSignal::Victory);
        let result = rig.tick(&RawInput::new(), 1);
        assert_eq!(result.events.len(), 1);
        assert_eq!(rig.machine.phase(), GamePhase::Victory);
        assert!(!rig.presenter.log().weapon_visible);

        rig.world.signal(WorldSignal::Victory);
        let result = rig.tick(&RawInput::new(), 1);
        assert!(result.events.is_empty());
        assert_eq!(rig.world.log().victory_spawns, 1);

        // Victory players are not sampled but the world keeps running
        assert!(result.command.is_none());

        rig.world.signal(WorldSignal::EndEpisode);
        rig.tick(&RawInput::new(), 1);
        assert_eq!(rig.machine.phase(), GamePhase::Intermission);
    }

    #[test]
    fn test_weapon_change_event() {
        let mut rig = Rig::new();
        let result = rig.tick(&RawInput::with_keys(&["1"]), 1);
        assert!(matches!(
            result.events[0].data,
            GameEventData::WeaponChanged { .. }
        ));
    }
}
