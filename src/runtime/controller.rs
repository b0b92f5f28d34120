//! Game Session Controller
//!
//! Owns the one current session and every collaborator, and is the only place
//! that mutates them. The logic loop, the render loop, the level pipeline and
//! the key handler all reach it through a [`SharedGame`] handle and never hold
//! a borrow across an await.
//!
//! # Lifecycle
//!
//! ```text
//! start_game ──► begin_level_load ──► install_level ──► finish_level_load
//!                      ▲                                       │
//!                      │                               logic / render loops
//!                      │                                       │
//!            intermission confirm ◄── Intermission ◄───────────┤
//!                                                              ▼
//!                               menu ◄── confirm ◄── GameOver (no lives)
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Action, ControlBindings, GameConfig};
use crate::game::clock::TicScheduler;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::intermission::{next_level, tally, IntermissionReport, NextLevel};
use crate::game::state::{Level, Player, Session, Skill};
use crate::game::tick::{CycleInput, GamePhase, GameStateMachine};
use crate::level::data::EpisodeTable;
use crate::level::pipeline::{
    LevelOverrides, LoadRequest, LoadTicket, PipelineError, PlayerRestore, PreloadRequest,
};
use crate::level::preload::{AssetCache, PreloadPlan};
use crate::level::source::{AssetFetcher, LevelSource};
use crate::level::spawn::scan_placements;
use crate::persist::snapshot::{PersistError, Restore, SaveSnapshot};
use crate::persist::store::SaveStore;
use crate::persist::SAVE_SLOT;
use crate::runtime::presenter::{Automap, Flash, HudSnapshot, Presenter, Screen, Viewpoint};
use crate::runtime::scheduler::LoopScheduler;
use crate::runtime::services::{Audio, Clock, InputDevice, WorldServices};

/// Shared handle to the controller.
pub type SharedGame = Rc<RefCell<GameController>>;

/// Everything the core drives but does not implement.
pub struct Collaborators {
    /// Drawing and screens.
    pub presenter: Box<dyn Presenter>,
    /// Player physics, AI, doors, push walls.
    pub world: Box<dyn WorldServices>,
    /// Music and sounds.
    pub audio: Box<dyn Audio>,
    /// Keyboard and pointer.
    pub input: Box<dyn InputDevice>,
    /// Wall clock.
    pub clock: Rc<dyn Clock>,
    /// Level files.
    pub levels: Rc<dyn LevelSource>,
    /// Art assets.
    pub assets: Rc<dyn AssetFetcher>,
    /// Save slots.
    pub store: Box<dyn SaveStore>,
}

/// What a key press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Nothing.
    Ignored,
    /// Handled in place.
    Handled,
    /// Intermission confirmed; this level must be loaded next.
    StartLevel {
        /// Episode index.
        episode: usize,
        /// Level index.
        level: usize,
    },
    /// Intermission after a boss level confirmed; victory text shown.
    EpisodeComplete,
    /// Control went back to the menu.
    ReturnedToMenu,
}

fn is_confirm(key: &str) -> bool {
    matches!(key, "ENTER" | "RETURN" | "SPACE" | " ")
}

/// The session controller.
pub struct GameController {
    config: GameConfig,
    episodes: EpisodeTable,
    collab: Collaborators,
    session: Option<Session>,
    machine: GameStateMachine,
    tics: TicScheduler,
    loops: LoopScheduler,
    assets: AssetCache,
    load_generation: u64,
    playing: bool,
    rendering: bool,
    paused: bool,
    pointer_enabled: bool,
    key_input_active: bool,
    fullscreen: bool,
    window_width: u32,
    level_music: Option<String>,
    intermission: Option<IntermissionReport>,
}

impl GameController {
    /// Create an idle controller with no session.
    pub fn new(config: GameConfig, episodes: EpisodeTable, collab: Collaborators) -> Self {
        let now = collab.clock.now_ms();
        let window_width = config.display.reference_width;
        Self {
            machine: GameStateMachine::new(config.death_tics()),
            tics: TicScheduler::new(config.tic_rate, now),
            config,
            episodes,
            collab,
            session: None,
            loops: LoopScheduler::new(),
            assets: AssetCache::new(),
            load_generation: 0,
            playing: false,
            rendering: false,
            paused: false,
            pointer_enabled: false,
            key_input_active: false,
            fullscreen: false,
            window_width,
            level_music: None,
            intermission: None,
        }
    }

    /// Wrap in a shared handle.
    pub fn into_shared(self) -> SharedGame {
        Rc::new(RefCell::new(self))
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Configuration.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Episode table.
    pub fn episodes(&self) -> &EpisodeTable {
        &self.episodes
    }

    /// Mutable episode table (enable/disable episodes).
    pub fn episodes_mut(&mut self) -> &mut EpisodeTable {
        &mut self.episodes
    }

    /// Current session.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Mutable current session.
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.machine.phase()
    }

    /// Simulation running.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Frames being drawn.
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// Paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Shortcut keys accepted.
    pub fn key_input_active(&self) -> bool {
        self.key_input_active
    }

    /// Pending intermission report.
    pub fn intermission(&self) -> Option<&IntermissionReport> {
        self.intermission.as_ref()
    }

    /// Assets loaded so far.
    pub fn asset_cache(&self) -> &AssetCache {
        &self.assets
    }

    pub(crate) fn loops_mut(&mut self) -> &mut LoopScheduler {
        &mut self.loops
    }

    pub(crate) fn loop_periods(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.config.logic_period_ms()),
            Duration::from_millis(self.config.render_period_ms()),
        )
    }

    // =========================================================================
    // SESSION LIFECYCLE
    // =========================================================================

    /// Start a new session, ending the previous one from whatever screen it
    /// is on.
    pub fn start_game(&mut self, skill: Skill) -> Uuid {
        if self.session.is_some() || self.playing || self.level_music.is_some() {
            self.end_game();
            self.collab.audio.stop_all();
            self.level_music = None;
        }

        let presenter = self.collab.presenter.as_mut();
        presenter.set_death_overlay(None);
        presenter.clear_flashes();
        presenter.hide(Screen::GameOver);
        presenter.hide(Screen::Intermission);

        let session = Session::new(skill);
        let id = session.id;
        self.session = Some(session);
        self.machine = GameStateMachine::new(self.config.death_tics());
        self.intermission = None;

        info!(session = %id, ?skill, "session started");
        id
    }

    /// Stop both loops and the renderer. The session stays for menus to inspect.
    pub fn end_game(&mut self) {
        self.loops.stop_all();
        self.playing = false;
        self.rendering = false;
        self.collab.presenter.reset_renderer();
        if self.paused {
            self.toggle_pause();
        }
        debug!("game ended");
    }

    /// Whether a load ticket still belongs to the current session and is the
    /// latest load.
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.load_generation
            && self.session.as_ref().is_some_and(|s| s.id == ticket.session)
    }

    /// First pipeline step: stop the loops and claim a new load generation.
    pub fn begin_level_load(
        &mut self,
        episode: usize,
        level: usize,
    ) -> Result<LoadRequest, PipelineError> {
        let session = self.session.as_ref().ok_or(PipelineError::NoSession)?.id;
        if !self.episodes.is_enabled(episode) {
            return Err(PipelineError::EpisodeUnavailable(episode));
        }
        let file = self
            .episodes
            .level(episode, level)
            .ok_or(PipelineError::UnknownLevel { episode, level })?
            .file
            .clone();

        self.loops.stop_all();
        self.playing = false;
        self.rendering = false;
        self.load_generation += 1;
        self.collab.presenter.show(Screen::Loading);

        Ok(LoadRequest {
            ticket: LoadTicket {
                session,
                generation: self.load_generation,
                episode,
                level,
            },
            file,
            source: Rc::clone(&self.collab.levels),
        })
    }

    /// Second pipeline step: build the level, apply overrides, scan placements.
    ///
    /// Returns `None` when the load was superseded.
    pub fn install_level(
        &mut self,
        ticket: &LoadTicket,
        data: crate::level::data::LevelData,
        overrides: Option<&LevelOverrides>,
    ) -> Option<PreloadRequest> {
        if !self.is_current(ticket) {
            return None;
        }

        let mut level = Level::from_data(Rc::new(data));
        if let Some(overrides) = overrides {
            overrides.apply_to_level(&mut level);
        }
        self.collab
            .presenter
            .set_floor_ceiling(level.floor, level.ceiling);

        let session = self.session.as_mut()?;
        let collected = overrides.map(|o| &o.collected);
        let summary = scan_placements(&mut level, session.skill, collected);
        if let Some(overrides) = overrides {
            overrides.restore_actors(&mut level, self.collab.world.as_mut());
        }
        level.state.loading_saved = false;

        let plan = self.assets.plan(&level, &self.config.assets);
        debug!(
            actors = summary.actors,
            powerups = summary.powerups,
            preload = plan.len(),
            "level installed"
        );

        session.episode = ticket.episode;
        session.level_index = ticket.level;
        session.level = Some(level);

        Some(PreloadRequest {
            plan,
            fetcher: Rc::clone(&self.collab.assets),
            timeout: Duration::from_millis(self.config.assets.fetch_timeout_ms),
        })
    }

    /// Last pipeline step: music, player, clocks, input. Returns false when
    /// the load was superseded.
    ///
    /// The caller starts the loops.
    pub fn finish_level_load(
        &mut self,
        ticket: &LoadTicket,
        plan: &PreloadPlan,
        restore: Option<&PlayerRestore>,
    ) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let now = self.collab.clock.now_ms();
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(level) = session.level.as_mut() else {
            return false;
        };

        self.assets.commit(plan);

        self.collab.audio.start_music(&level.music);
        self.level_music = Some(level.music.clone());

        let previous = session.player.take();
        let mut player = match restore {
            Some(_) => Player::spawn(&level.spawn, None),
            None => Player::spawn(&level.spawn, previous.as_ref()),
        };
        if let Some(restore) = restore {
            restore.apply(&mut player);
        }

        let elapsed = level.state.elapsed_ms;
        level.state.restart_clock(now, elapsed);

        let presenter = self.collab.presenter.as_mut();
        presenter.hide(Screen::Loading);
        presenter.hide(Screen::Intermission);
        presenter.show(Screen::Game);
        presenter.show(Screen::Renderer);
        presenter.set_weapon_visible(true);
        presenter.update_hud(&HudSnapshot::capture(&player, session.level_index));
        session.player = Some(player);

        self.machine.reset();
        self.tics.reset(now);
        self.intermission = None;
        self.playing = true;
        self.rendering = true;
        self.key_input_active = true;

        self.collab.input.reset();
        if self.pointer_enabled {
            self.collab.input.lock_pointer();
        }

        info!(
            episode = ticket.episode,
            level = ticket.level,
            "level ready"
        );
        true
    }

    // =========================================================================
    // LOOP BODIES
    // =========================================================================

    /// One logic loop iteration. Returns the events of the cycle.
    pub fn run_logic_cycle(&mut self) -> Vec<GameEvent> {
        if !self.playing || self.paused {
            return Vec::new();
        }

        let now = self.collab.clock.now_ms();
        let tics = self.tics.elapsed_tics(now);
        let raw = self.collab.input.snapshot();
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let input = CycleInput {
            raw: &raw,
            bindings: &self.config.bindings,
            controls: &self.config.controls,
            pointer_enabled: self.pointer_enabled,
            process_ai: self.config.process_ai,
            now_ms: now,
        };
        let result = self.machine.tick(
            session,
            tics,
            &input,
            self.collab.world.as_mut(),
            self.collab.presenter.as_mut(),
        );

        for event in &result.events {
            match event.data {
                GameEventData::VictoryStarted => {
                    self.key_input_active = false;
                }
                GameEventData::GameOver => {
                    self.game_over();
                }
                _ => {}
            }
        }

        if self.machine.phase() == GamePhase::Intermission && self.intermission.is_none() {
            self.start_intermission();
        }

        result.events
    }

    /// One render loop iteration. Returns whether a frame was drawn.
    pub fn render_frame(&mut self) -> bool {
        if !self.rendering {
            return false;
        }
        let Some((level, player)) = self.session.as_ref().and_then(Session::world) else {
            return false;
        };

        let presenter = self.collab.presenter.as_mut();
        presenter.draw_frame(&Viewpoint::of(player), level);
        if presenter.is_visible(Screen::Map) {
            presenter.draw_map(&Automap::build(level, player));
        }
        true
    }

    // =========================================================================
    // INTERMISSION AND GAME OVER
    // =========================================================================

    fn start_intermission(&mut self) {
        let now = self.collab.clock.now_ms();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some((stats, level_time_ms)) = session
            .level
            .as_ref()
            .map(|l| (l.state.stats, l.state.level_time_ms(now)))
        else {
            return;
        };

        let par_secs = self.episodes.par_secs(session.episode, session.level_index);
        let report = tally(session, &stats, level_time_ms, par_secs, &self.config.scoring);

        self.loops.stop_all();
        self.playing = false;
        self.rendering = false;

        let presenter = self.collab.presenter.as_mut();
        presenter.hide(Screen::Renderer);
        presenter.show(Screen::Intermission);
        presenter.show_intermission(&report);

        info!(
            floor = report.floor,
            kills = report.kill_ratio,
            secrets = report.secret_ratio,
            treasure = report.treasure_ratio,
            bonus = report.bonus,
            "intermission"
        );
        self.intermission = Some(report);
    }

    fn game_over(&mut self) {
        self.machine.enter_game_over();
        self.key_input_active = false;
        self.collab.presenter.hide(Screen::Renderer);
        self.end_game();
        self.collab.presenter.show(Screen::GameOver);
        info!("game over screen");
    }

    fn return_to_menu(&mut self) -> KeyOutcome {
        self.session = None;
        self.machine.reset();
        self.intermission = None;
        self.collab.presenter.show_menu();
        KeyOutcome::ReturnedToMenu
    }

    fn game_over_key(&mut self, key: &str) -> KeyOutcome {
        let visible = self.collab.presenter.is_visible(Screen::GameOver);
        if visible && !is_confirm(key) {
            return KeyOutcome::Ignored;
        }
        if !visible {
            debug!("game over screen already hidden, leaving");
        }
        self.collab.presenter.hide(Screen::GameOver);
        self.return_to_menu()
    }

    fn intermission_key(&mut self, key: &str) -> KeyOutcome {
        if !self.collab.presenter.is_visible(Screen::Intermission) {
            debug!("intermission screen hidden, key ignored");
            return KeyOutcome::Ignored;
        }
        if !is_confirm(key) {
            return KeyOutcome::Ignored;
        }

        let report = self.intermission.take();
        self.collab.presenter.hide(Screen::Intermission);

        let Some(session) = self.session.as_mut() else {
            return self.return_to_menu();
        };
        let playstate = session
            .player
            .as_ref()
            .map(|p| p.playstate)
            .unwrap_or_default();

        match next_level(session.episode, session.level_index, playstate) {
            NextLevel::Level(level) => {
                if let (Some(report), Some(player)) = (report, session.player.as_mut()) {
                    player.give_points(report.bonus);
                }
                KeyOutcome::StartLevel {
                    episode: session.episode,
                    level,
                }
            }
            NextLevel::EpisodeComplete => {
                let episode = session.episode;
                let name = format!("victory{}", episode + 1);
                let pages = if episode == 2 { 1 } else { 2 };
                info!(episode, "episode complete");

                self.end_game();
                self.collab.presenter.show_victory_text(&name, pages);
                self.return_to_menu();
                KeyOutcome::EpisodeComplete
            }
        }
    }

    /// Route a key press.
    pub fn handle_key(&mut self, key: &str) -> KeyOutcome {
        let key = key.to_ascii_uppercase();
        match self.machine.phase() {
            GamePhase::GameOver => return self.game_over_key(&key),
            GamePhase::Intermission => return self.intermission_key(&key),
            _ => {}
        }

        if !self.key_input_active {
            return KeyOutcome::Ignored;
        }

        match key.as_str() {
            "P" => {
                self.toggle_pause();
                KeyOutcome::Handled
            }
            "ESC" | "ESCAPE" => {
                if self.collab.presenter.is_visible(Screen::Map) {
                    self.collab.presenter.hide(Screen::Map);
                    KeyOutcome::Handled
                } else {
                    self.exit_to_menu();
                    KeyOutcome::ReturnedToMenu
                }
            }
            "M" => {
                self.toggle_map();
                KeyOutcome::Handled
            }
            "F11" => {
                self.toggle_fullscreen();
                KeyOutcome::Handled
            }
            _ => KeyOutcome::Ignored,
        }
    }

    // =========================================================================
    // PLAYER ACTIONS
    // =========================================================================

    /// Pause or unpause. Unpausing re-anchors the tic clock.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        self.collab.audio.pause_music(self.paused);
        if self.paused {
            self.collab.presenter.show(Screen::Pause);
        } else {
            self.tics.reset(self.collab.clock.now_ms());
            self.collab.presenter.hide(Screen::Pause);
        }
        debug!(paused = self.paused, "pause toggled");
    }

    /// Pause and hand control to the menu. The session is kept for `resume`.
    pub fn exit_to_menu(&mut self) {
        if !self.paused {
            self.toggle_pause();
        }
        self.collab.presenter.hide(Screen::Game);
        self.key_input_active = false;
        self.collab.presenter.show_menu();
        info!("exited to menu");
    }

    /// Back from the menu into the running session.
    pub fn resume(&mut self) {
        self.collab.presenter.show(Screen::Game);
        if self.paused {
            self.toggle_pause();
        }
        self.key_input_active = true;
        if let Some(track) = &self.level_music {
            self.collab.audio.start_music(track);
        }
        info!("resumed");
    }

    /// Turn pointer-look on or off.
    pub fn enable_pointer(&mut self, enabled: bool) {
        self.pointer_enabled = enabled;
        if enabled {
            self.collab.input.lock_pointer();
        }
    }

    /// Record the window width used for fullscreen scaling.
    pub fn set_window_width(&mut self, width: u32) {
        self.window_width = width;
    }

    /// Toggle fullscreen scaling.
    pub fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
        let zoom = if self.fullscreen {
            self.config.display.fullscreen_zoom(self.window_width)
        } else {
            1.0
        };
        self.collab.presenter.set_scale(zoom);
        debug!(fullscreen = self.fullscreen, zoom, "presentation scale");
    }

    /// Show or hide the overhead map.
    pub fn toggle_map(&mut self) {
        let presenter = self.collab.presenter.as_mut();
        if presenter.is_visible(Screen::Map) {
            presenter.hide(Screen::Map);
            return;
        }
        let Some((level, player)) = self.session.as_ref().and_then(Session::world) else {
            return;
        };
        presenter.draw_map(&Automap::build(level, player));
        presenter.show(Screen::Map);
    }

    /// Copy of the control bindings.
    pub fn controls(&self) -> ControlBindings {
        self.config.bindings.clone()
    }

    /// Rebind one action.
    pub fn bind_control(&mut self, action: Action, keys: Vec<String>) {
        info!(%action, ?keys, "control rebound");
        self.config.bindings.bind(action, keys);
    }

    /// Flash the view.
    pub fn flash(&mut self, flash: Flash) {
        self.collab.presenter.flash(flash);
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    fn try_save(&mut self) -> Result<(), PersistError> {
        let session = self.session.as_ref().ok_or(PersistError::NoSession)?;
        let snapshot = SaveSnapshot::capture(session, self.collab.clock.now_ms())?;
        self.collab.store.put(SAVE_SLOT, &snapshot.to_json()?)?;
        Ok(())
    }

    /// Save the session. Failures are logged and reported as `false`.
    pub fn save(&mut self) -> bool {
        match self.try_save() {
            Ok(()) => {
                info!(slot = SAVE_SLOT, "game saved");
                true
            }
            Err(e) => {
                error!(error = %e, "save failed");
                false
            }
        }
    }

    /// Read the saved game.
    pub fn read_save(&self) -> Result<Restore, PersistError> {
        let json = self.collab.store.get(SAVE_SLOT)?;
        let snapshot = SaveSnapshot::from_json(&json)?;
        info!(saved_at = %snapshot.saved_at, "save read");
        Ok(snapshot.into_restore())
    }

    /// Start a session from a saved game; the caller loads the level.
    pub fn begin_restore(&mut self, restore: &Restore) -> Uuid {
        let id = self.start_game(restore.skill);
        match self.session.as_mut() {
            Some(session) => restore.history.apply(session),
            None => warn!("session vanished during restore"),
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Playstate;
    use crate::level::data::SECRET_LEVEL;
    use crate::runtime::headless::{sample_level, Headless};
    use crate::runtime::services::WorldSignal;

    struct Rig {
        game: GameController,
        rig: Headless,
    }

    impl Rig {
        fn new() -> Self {
            let episodes = EpisodeTable::default();
            let rig = Headless::new(&episodes);
            let game = GameController::new(GameConfig::default(), episodes, rig.collaborators());
            Self { game, rig }
        }

        /// Run the pipeline steps synchronously.
        fn start_level(&mut self, episode: usize, level: usize) {
            let request = self.game.begin_level_load(episode, level).unwrap();
            let preload = self
                .game
                .install_level(&request.ticket, sample_level(&request.file), None)
                .unwrap();
            assert!(self
                .game
                .finish_level_load(&request.ticket, &preload.plan, None));
        }

        fn playing(skill: Skill) -> Self {
            let mut rig = Self::new();
            rig.game.start_game(skill);
            rig.start_level(0, 0);
            rig
        }

        fn player(&mut self) -> &mut Player {
            self.game.session_mut().unwrap().player.as_mut().unwrap()
        }
    }

    #[test]
    fn test_level_load_needs_session() {
        let mut rig = Rig::new();
        assert!(matches!(
            rig.game.begin_level_load(0, 0),
            Err(PipelineError::NoSession)
        ));
    }

    #[test]
    fn test_disabled_episode_refused() {
        let mut rig = Rig::new();
        rig.game.start_game(Skill::Easy);
        rig.game.episodes_mut().episode_mut(3).unwrap().enabled = false;
        assert_eq!(
            rig.game.begin_level_load(3, 0).err(),
            Some(PipelineError::EpisodeUnavailable(3))
        );
        assert_eq!(
            rig.game.begin_level_load(0, 42).err(),
            Some(PipelineError::UnknownLevel { episode: 0, level: 42 })
        );
    }

    #[test]
    fn test_finish_starts_play() {
        let rig = Rig::playing(Skill::Medium);
        assert!(rig.game.is_playing());
        assert!(rig.game.is_rendering());
        assert!(rig.game.key_input_active());
        assert_eq!(rig.rig.input.resets(), 1);
        assert_eq!(rig.rig.audio.log().tracks, vec!["music/maps/w00.json.ogg".to_string()]);

        let log = rig.rig.presenter.log();
        assert!(log.visible.contains(&Screen::Renderer));
        assert!(!log.visible.contains(&Screen::Loading));
        assert_eq!(log.colors, Some((sample_level("x").floor, sample_level("x").ceiling)));
    }

    #[test]
    fn test_stale_ticket_ignored() {
        let mut rig = Rig::new();
        rig.game.start_game(Skill::Easy);
        let first = rig.game.begin_level_load(0, 0).unwrap();
        let second = rig.game.begin_level_load(0, 1).unwrap();

        assert!(rig
            .game
            .install_level(&first.ticket, sample_level(&first.file), None)
            .is_none());
        assert!(!rig.game.is_current(&first.ticket));
        assert!(rig.game.is_current(&second.ticket));

        // A new session invalidates every outstanding ticket
        rig.game.start_game(Skill::Easy);
        assert!(!rig.game.is_current(&second.ticket));
        assert!(!rig
            .game
            .finish_level_load(&second.ticket, &PreloadPlan::default(), None));
    }

    #[test]
    fn test_logic_cycle_consumes_tics() {
        let mut rig = Rig::playing(Skill::Medium);
        rig.rig.clock.advance(100);
        rig.game.run_logic_cycle();
        assert_eq!(rig.rig.world.log().tics, 7);

        rig.rig.clock.advance(33);
        rig.game.run_logic_cycle();
        assert_eq!(rig.rig.world.log().tics, 9);
    }

    #[test]
    fn test_pause_reanchors_tics() {
        let mut rig = Rig::playing(Skill::Medium);
        rig.game.toggle_pause();
        assert!(rig.rig.audio.log().paused);
        assert!(rig.rig.presenter.log().visible.contains(&Screen::Pause));

        rig.rig.clock.advance(10_000);
        rig.game.run_logic_cycle();
        assert_eq!(rig.rig.world.log().player_cycles, 0);

        rig.game.toggle_pause();
        rig.rig.clock.advance(100);
        rig.game.run_logic_cycle();
        assert_eq!(rig.rig.world.log().tics, 7);
    }

    #[test]
    fn test_render_frame_follows_player() {
        let mut rig = Rig::playing(Skill::Easy);
        assert!(rig.game.render_frame());
        let view = rig.rig.presenter.log().last_view.unwrap();
        assert_eq!((view.x, view.y), rig.player().position());

        rig.game.end_game();
        assert!(!rig.game.render_frame());
    }

    #[test]
    fn test_exit_to_menu_and_resume() {
        let mut rig = Rig::playing(Skill::Easy);
        assert_eq!(rig.game.handle_key("escape"), KeyOutcome::ReturnedToMenu);
        assert!(rig.game.is_paused());
        assert!(!rig.game.key_input_active());
        assert!(rig.game.session().is_some());
        assert_eq!(rig.rig.presenter.log().menus, 1);

        // Shortcuts are dead while the menu is up
        assert_eq!(rig.game.handle_key("P"), KeyOutcome::Ignored);

        rig.game.resume();
        assert!(!rig.game.is_paused());
        assert!(rig.game.key_input_active());
        assert_eq!(rig.rig.audio.log().tracks.len(), 2);
    }

    #[test]
    fn test_escape_closes_map_first() {
        let mut rig = Rig::playing(Skill::Easy);
        rig.game.handle_key("M");
        assert!(rig.rig.presenter.log().map.is_some());
        assert_eq!(rig.game.handle_key("ESC"), KeyOutcome::Handled);
        assert!(!rig.rig.presenter.log().visible.contains(&Screen::Map));
        assert!(!rig.game.is_paused());
    }

    #[test]
    fn test_fullscreen_scaling() {
        let mut rig = Rig::playing(Skill::Easy);
        rig.game.set_window_width(1280);
        rig.game.handle_key("F11");
        assert_eq!(rig.rig.presenter.log().scale, 2.0);
        rig.game.toggle_fullscreen();
        assert_eq!(rig.rig.presenter.log().scale, 1.0);
    }

    #[test]
    fn test_game_over_flow() {
        let mut rig = Rig::playing(Skill::Easy);
        rig.player().lives = 0;
        rig.rig.world.kill_player(None);
        rig.rig.clock.advance(30);
        rig.game.run_logic_cycle();

        rig.rig.clock.advance(2_000);
        let events = rig.game.run_logic_cycle();
        assert!(events.iter().any(|e| e.data == GameEventData::GameOver));
        assert_eq!(rig.game.phase(), GamePhase::GameOver);
        assert!(!rig.game.is_playing());
        assert!(rig.rig.presenter.log().visible.contains(&Screen::GameOver));

        assert_eq!(rig.game.handle_key("X"), KeyOutcome::Ignored);
        assert_eq!(rig.game.handle_key("Enter"), KeyOutcome::ReturnedToMenu);
        assert!(rig.game.session().is_none());
        assert_eq!(rig.rig.presenter.log().menus, 1);
    }

    #[test]
    fn test_hidden_game_over_screen_leaves_on_any_key() {
        let mut rig = Rig::playing(Skill::Easy);
        rig.player().lives = 0;
        rig.rig.world.kill_player(None);
        rig.game.run_logic_cycle();
        rig.rig.clock.advance(2_000);
        rig.game.run_logic_cycle();

        rig.rig.presenter.force_hide(Screen::GameOver);
        assert_eq!(rig.game.handle_key("Q"), KeyOutcome::ReturnedToMenu);
    }

    #[test]
    fn test_intermission_and_advance() {
        let mut rig = Rig::playing(Skill::Easy);
        let score = rig.player().score;
        rig.rig.clock.advance(60_000);
        rig.rig.world.signal(WorldSignal::ExitLevel);
        rig.game.run_logic_cycle();

        assert_eq!(rig.game.phase(), GamePhase::Intermission);
        assert!(!rig.game.is_playing());
        let report = rig.game.intermission().cloned().unwrap();
        assert_eq!(report.floor, 1);
        assert_eq!(report.time_secs, 60);
        assert_eq!(rig.rig.presenter.log().intermission, Some(report.clone()));

        assert_eq!(
            rig.game.handle_key("SPACE"),
            KeyOutcome::StartLevel { episode: 0, level: 1 }
        );
        assert_eq!(rig.player().score, score + report.bonus);

        rig.start_level(0, 1);
        assert_eq!(rig.game.phase(), GamePhase::Playing);
        assert_eq!(rig.player().start_score, score + report.bonus);
        assert_eq!(rig.game.session().unwrap().kill_ratios.len(), 1);
    }

    #[test]
    fn test_secret_exit_routes_to_secret_level() {
        let mut rig = Rig::playing(Skill::Easy);
        rig.rig.world.signal(WorldSignal::SecretExit);
        rig.game.run_logic_cycle();
        assert_eq!(rig.player().playstate, Playstate::SecretLevel);
        assert_eq!(
            rig.game.handle_key("ENTER"),
            KeyOutcome::StartLevel { episode: 0, level: SECRET_LEVEL }
        );
        rig.start_level(0, SECRET_LEVEL);
        assert_eq!(rig.player().playstate, Playstate::Alive);
    }

    #[test]
    fn test_boss_level_ends_episode() {
        let mut rig = Rig::new();
        rig.game.start_game(Skill::Hard);
        rig.start_level(2, 8);

        rig.rig.world.signal(WorldSignal::Victory);
        rig.game.run_logic_cycle();
        assert!(!rig.game.key_input_active());
        assert_eq!(rig.game.phase(), GamePhase::Victory);

        rig.rig.world.signal(WorldSignal::EndEpisode);
        rig.game.run_logic_cycle();
        let report = rig.game.intermission().cloned().unwrap();
        assert!(report.averages.is_some());
        assert_eq!(report.bonus, 0);

        assert_eq!(rig.game.handle_key("ENTER"), KeyOutcome::EpisodeComplete);
        let log = rig.rig.presenter.log();
        assert_eq!(log.victory_text, Some(("victory3".to_string(), 1)));
        assert_eq!(log.menus, 1);
        drop(log);
        assert!(rig.game.session().is_none());
    }

    #[test]
    fn test_hidden_intermission_ignores_keys() {
        let mut rig = Rig::playing(Skill::Easy);
        rig.rig.world.signal(WorldSignal::ExitLevel);
        rig.game.run_logic_cycle();
        rig.rig.presenter.force_hide(Screen::Intermission);
        assert_eq!(rig.game.handle_key("ENTER"), KeyOutcome::Ignored);
        assert!(rig.game.intermission().is_some());
    }

    #[test]
    fn test_start_game_ends_running_game() {
        let mut rig = Rig::playing(Skill::Easy);
        let first = rig.game.session().unwrap().id;
        let second = rig.game.start_game(Skill::Hard);
        assert_ne!(first, second);
        assert!(!rig.game.is_playing());
        assert_eq!(rig.rig.audio.log().stops, 1);
        assert_eq!(rig.rig.presenter.log().renderer_resets, 1);
    }

    #[test]
    fn test_start_game_from_intermission_stops_audio() {
        let mut rig = Rig::playing(Skill::Easy);
        rig.rig.world.signal(WorldSignal::ExitLevel);
        rig.game.run_logic_cycle();
        assert_eq!(rig.game.phase(), GamePhase::Intermission);
        assert!(!rig.game.is_playing());
        let resets = rig.rig.presenter.log().renderer_resets;

        rig.game.start_game(Skill::Medium);
        assert_eq!(rig.rig.audio.log().stops, 1);
        assert!(rig.game.level_music.is_none());
        assert_eq!(rig.rig.presenter.log().renderer_resets, resets + 1);
        assert!(rig.game.intermission().is_none());
        assert_eq!(rig.game.phase(), GamePhase::Playing);
    }

    #[test]
    fn test_save_without_session_fails() {
        let mut rig = Rig::new();
        assert!(!rig.game.save());
        rig.game.start_game(Skill::Easy);
        assert!(!rig.game.save());
        assert!(rig.rig.store.raw(SAVE_SLOT).is_none());
    }

    #[test]
    fn test_bind_control_copy() {
        let mut rig = Rig::new();
        let before = rig.game.controls();
        rig.game.bind_control(Action::Attack, vec!["CONTROL".to_string()]);
        assert_eq!(before.keys(Action::Attack), ["X".to_string()]);
        assert_eq!(rig.game.controls().keys(Action::Attack), ["CONTROL".to_string()]);
    }

    #[test]
    fn test_pointer_lock_requested() {
        let mut rig = Rig::new();
        rig.game.enable_pointer(true);
        assert_eq!(rig.rig.input.pointer_locks(), 1);
        rig.game.start_game(Skill::Easy);
        rig.start_level(0, 0);
        assert_eq!(rig.rig.input.pointer_locks(), 2);
    }
}
