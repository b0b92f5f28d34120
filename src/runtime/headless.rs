//! Headless Collaborators
//!
//! In-memory implementations of every collaborator seam. They record what the
//! core asked for, so sessions can run without a screen, sound or network.
//! Each is a cheap handle: clones share state, so a caller can keep one clone
//! and hand another to the controller.

use std::cell::{Cell, Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use crate::game::input::{Command, PointerState, RawInput};
use crate::game::intermission::IntermissionReport;
use crate::game::state::{
    Actor, ActorKind, ActorState, EntityId, Level, Player, Playstate, PowerupKind, Skill,
};
use crate::level::data::{
    EpisodeTable, Grid, LevelData, Placement, PlacementKind, Rgb, SpawnPoint, ELEVATOR_TILE,
    SECRET_TILE, SOLID_TILE,
};
use crate::level::source::{AssetError, AssetFetcher, LevelLoadError, LevelSource};
use crate::persist::store::MemoryStore;
use crate::runtime::controller::Collaborators;
use crate::runtime::presenter::{Automap, Flash, HudSnapshot, Presenter, Screen, Viewpoint};
use crate::runtime::services::{Audio, Clock, InputDevice, WorldServices, WorldSignal};

// =============================================================================
// SAMPLE LEVEL
// =============================================================================

/// A small walled level with two actors, four collectibles and a secret.
pub fn sample_level(name: &str) -> LevelData {
    const SIZE: usize = 16;

    let mut tiles = Grid::filled(SIZE, SIZE, 0u32);
    let mut wall_tex_x = Grid::filled(SIZE, SIZE, 0u16);
    let mut wall_tex_y = Grid::filled(SIZE, SIZE, 0u16);
    for i in 0..SIZE {
        for (x, y) in [(i, 0), (i, SIZE - 1), (0, i), (SIZE - 1, i)] {
            tiles.set(x, y, SOLID_TILE);
            wall_tex_x.set(x, y, 1);
            wall_tex_y.set(x, y, 2);
        }
    }
    tiles.set(8, 8, SOLID_TILE | SECRET_TILE);
    wall_tex_x.set(8, 8, 9);
    tiles.set(14, 14, SOLID_TILE | ELEVATOR_TILE);
    wall_tex_y.set(14, 14, 42);

    let placement = |tile_x, tile_y, kind| Placement {
        tile_x,
        tile_y,
        kind,
        min_skill: Skill::Baby,
    };

    LevelData {
        name: name.to_string(),
        tiles,
        wall_tex_x,
        wall_tex_y,
        floor: Rgb([112, 112, 112]),
        ceiling: Rgb([56, 56, 56]),
        music: format!("music/{name}.ogg"),
        spawn: SpawnPoint::at_tile(2, 2, 0),
        placements: vec![
            placement(
                2,
                5,
                PlacementKind::Actor { kind: ActorKind::Guard, angle: 0, patrol: false },
            ),
            placement(
                6,
                6,
                PlacementKind::Actor { kind: ActorKind::Dog, angle: 900, patrol: true },
            ),
            placement(3, 3, PlacementKind::Powerup(PowerupKind::Chest)),
            placement(4, 4, PlacementKind::Powerup(PowerupKind::Food)),
            placement(5, 3, PlacementKind::Powerup(PowerupKind::Clip)),
            placement(7, 2, PlacementKind::Powerup(PowerupKind::Cross)),
            placement(8, 8, PlacementKind::SecretWall),
        ],
    }
}

// =============================================================================
// PRESENTER
// =============================================================================

/// Everything the presenter was asked to show.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenterLog {
    /// Visible screens.
    pub visible: BTreeSet<Screen>,
    /// Last floor and ceiling colors.
    pub colors: Option<(Rgb, Rgb)>,
    /// Death overlay opacity.
    pub death_overlay: Option<f32>,
    /// Flashes since the last clear.
    pub flashes: Vec<Flash>,
    /// Last HUD.
    pub hud: Option<HudSnapshot>,
    /// Weapon sprite shown.
    pub weapon_visible: bool,
    /// Frames drawn.
    pub frames: u32,
    /// Last viewpoint drawn.
    pub last_view: Option<Viewpoint>,
    /// Renderer resets.
    pub renderer_resets: u32,
    /// Last intermission report.
    pub intermission: Option<IntermissionReport>,
    /// Last victory text and page count.
    pub victory_text: Option<(String, u32)>,
    /// Times the menu took over.
    pub menus: u32,
    /// Last overhead map.
    pub map: Option<Automap>,
    /// Presentation zoom.
    pub scale: f32,
}

impl Default for PresenterLog {
    fn default() -> Self {
        Self {
            visible: BTreeSet::new(),
            colors: None,
            death_overlay: None,
            flashes: Vec::new(),
            hud: None,
            weapon_visible: true,
            frames: 0,
            last_view: None,
            renderer_resets: 0,
            intermission: None,
            victory_text: None,
            menus: 0,
            map: None,
            scale: 1.0,
        }
    }
}

/// Presenter that records instead of drawing.
#[derive(Debug, Clone, Default)]
pub struct HeadlessPresenter {
    log: Rc<RefCell<PresenterLog>>,
}

impl HeadlessPresenter {
    /// Create a new presenter with nothing visible.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded state.
    pub fn log(&self) -> Ref<'_, PresenterLog> {
        self.log.borrow()
    }

    /// Hide a screen behind the core's back.
    pub fn force_hide(&self, screen: Screen) {
        self.log.borrow_mut().visible.remove(&screen);
    }
}

impl Presenter for HeadlessPresenter {
    fn show(&mut self, screen: Screen) {
        self.log.borrow_mut().visible.insert(screen);
    }

    fn hide(&mut self, screen: Screen) {
        self.log.borrow_mut().visible.remove(&screen);
    }

    fn is_visible(&self, screen: Screen) -> bool {
        self.log.borrow().visible.contains(&screen)
    }

    fn set_floor_ceiling(&mut self, floor: Rgb, ceiling: Rgb) {
        self.log.borrow_mut().colors = Some((floor, ceiling));
    }

    fn set_death_overlay(&mut self, opacity: Option<f32>) {
        self.log.borrow_mut().death_overlay = opacity;
    }

    fn flash(&mut self, flash: Flash) {
        self.log.borrow_mut().flashes.push(flash);
    }

    fn clear_flashes(&mut self) {
        self.log.borrow_mut().flashes.clear();
    }

    fn update_hud(&mut self, hud: &HudSnapshot) {
        self.log.borrow_mut().hud = Some(hud.clone());
    }

    fn set_weapon_visible(&mut self, visible: bool) {
        self.log.borrow_mut().weapon_visible = visible;
    }

    fn draw_frame(&mut self, view: &Viewpoint, _level: &Level) {
        let mut log = self.log.borrow_mut();
        log.frames += 1;
        log.last_view = Some(*view);
    }

    fn reset_renderer(&mut self) {
        self.log.borrow_mut().renderer_resets += 1;
    }

    fn show_intermission(&mut self, report: &IntermissionReport) {
        self.log.borrow_mut().intermission = Some(report.clone());
    }

    fn show_victory_text(&mut self, name: &str, pages: u32) {
        self.log.borrow_mut().victory_text = Some((name.to_string(), pages));
    }

    fn show_menu(&mut self) {
        self.log.borrow_mut().menus += 1;
    }

    fn draw_map(&mut self, map: &Automap) {
        self.log.borrow_mut().map = Some(map.clone());
    }

    fn set_scale(&mut self, zoom: f32) {
        self.log.borrow_mut().scale = zoom;
    }
}

// =============================================================================
// WORLD
// =============================================================================

/// World calls seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldLog {
    /// `process_player` calls.
    pub player_cycles: u32,
    /// `process_actors` calls.
    pub actor_cycles: u32,
    /// `process_push_walls` calls.
    pub push_wall_cycles: u32,
    /// `process_doors` calls.
    pub door_cycles: u32,
    /// `clean_sprites` calls.
    pub cleanups: u32,
    /// Victory actors spawned.
    pub victory_spawns: u32,
    /// Tics passed to `process_player`.
    pub tics: u64,
    /// Frames reported outside the AI.
    pub actor_frames: Vec<(EntityId, ActorState)>,
}

#[derive(Debug, Default)]
struct WorldScript {
    log: WorldLog,
    kill: Option<Option<EntityId>>,
    signals: VecDeque<WorldSignal>,
}

/// World that does nothing unless told to.
///
/// Players stand still; scripted kills and signals fire on the next
/// `process_player`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWorld {
    script: Rc<RefCell<WorldScript>>,
}

impl ScriptedWorld {
    /// Create a new idle world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the player on the next player cycle.
    pub fn kill_player(&self, attacker: Option<EntityId>) {
        self.script.borrow_mut().kill = Some(attacker);
    }

    /// Report a signal on a coming player cycle.
    pub fn signal(&self, signal: WorldSignal) {
        self.script.borrow_mut().signals.push_back(signal);
    }

    /// Calls seen so far.
    pub fn log(&self) -> Ref<'_, WorldLog> {
        Ref::map(self.script.borrow(), |s| &s.log)
    }
}

impl WorldServices for ScriptedWorld {
    fn process_player(
        &mut self,
        _level: &mut Level,
        player: &mut Player,
        _cmd: &Command,
        tics: u32,
    ) -> Option<WorldSignal> {
        let mut script = self.script.borrow_mut();
        script.log.player_cycles += 1;
        script.log.tics += u64::from(tics);

        if let Some(attacker) = script.kill.take() {
            player.health = 0;
            player.playstate = Playstate::Dead;
            player.last_attacker = attacker;
        }

        script.signals.pop_front()
    }

    fn process_actors(&mut self, _level: &mut Level, _player: &mut Player, _tics: u32) {
        self.script.borrow_mut().log.actor_cycles += 1;
    }

    fn process_push_walls(&mut self, _level: &mut Level, _tics: u32) {
        self.script.borrow_mut().log.push_wall_cycles += 1;
    }

    fn process_doors(&mut self, _level: &mut Level, _player: &Player, _tics: u32) {
        self.script.borrow_mut().log.door_cycles += 1;
    }

    fn clean_sprites(&mut self, _level: &mut Level) {
        self.script.borrow_mut().log.cleanups += 1;
    }

    fn spawn_victory_actor(&mut self, _level: &mut Level, _player: &Player, _skill: Skill) {
        self.script.borrow_mut().log.victory_spawns += 1;
    }

    fn actor_frame_changed(&mut self, actor: &Actor) {
        self.script
            .borrow_mut()
            .log
            .actor_frames
            .push((actor.id, actor.state));
    }
}

// =============================================================================
// AUDIO, INPUT, CLOCK
// =============================================================================

/// Audio requests seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioLog {
    /// Tracks started, in order.
    pub tracks: Vec<String>,
    /// Music currently paused.
    pub paused: bool,
    /// `stop_all` calls.
    pub stops: u32,
}

/// Audio that only records.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    log: Rc<RefCell<AudioLog>>,
}

impl RecordingAudio {
    /// Create a new silent audio sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen so far.
    pub fn log(&self) -> Ref<'_, AudioLog> {
        self.log.borrow()
    }
}

impl Audio for RecordingAudio {
    fn start_music(&mut self, track: &str) {
        let mut log = self.log.borrow_mut();
        log.tracks.push(track.to_string());
        log.paused = false;
    }

    fn pause_music(&mut self, paused: bool) {
        self.log.borrow_mut().paused = paused;
    }

    fn stop_all(&mut self) {
        self.log.borrow_mut().stops += 1;
    }
}

#[derive(Debug, Default)]
struct InputScript {
    raw: RawInput,
    resets: u32,
    pointer_locks: u32,
}

/// Input device driven by the caller.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: Rc<RefCell<InputScript>>,
}

impl ScriptedInput {
    /// Create a new device with nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold a key.
    pub fn press(&self, key: &str) {
        self.script.borrow_mut().raw.press(key);
    }

    /// Release a key.
    pub fn release(&self, key: &str) {
        self.script.borrow_mut().raw.release(key);
    }

    /// Set the pointer state.
    pub fn set_pointer(&self, pointer: PointerState) {
        self.script.borrow_mut().raw.pointer = pointer;
    }

    /// Times the device was reset.
    pub fn resets(&self) -> u32 {
        self.script.borrow().resets
    }

    /// Times pointer lock was requested.
    pub fn pointer_locks(&self) -> u32 {
        self.script.borrow().pointer_locks
    }
}

impl InputDevice for ScriptedInput {
    fn snapshot(&mut self) -> RawInput {
        self.script.borrow().raw.clone()
    }

    fn reset(&mut self) {
        let mut script = self.script.borrow_mut();
        script.raw.clear();
        script.resets += 1;
    }

    fn lock_pointer(&mut self) {
        self.script.borrow_mut().pointer_locks += 1;
    }
}

/// Clock moved by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    /// Create a new clock at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to `now_ms`.
    pub fn set(&self, now_ms: i64) {
        self.now.set(now_ms);
    }

    /// Move forward.
    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

// =============================================================================
// LEVELS AND ASSETS
// =============================================================================

#[derive(Debug, Default)]
struct SourceState {
    levels: BTreeMap<String, LevelData>,
    delays: BTreeMap<String, Duration>,
    loads: Vec<String>,
}

/// Level files held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLevelSource {
    state: Rc<RefCell<SourceState>>,
}

impl MemoryLevelSource {
    /// Create a new empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`sample_level`] under every file of an episode table.
    pub fn for_episodes(episodes: &EpisodeTable) -> Self {
        let source = Self::new();
        for e in 0..episodes.len() {
            let Some(episode) = episodes.episode(e) else {
                continue;
            };
            for info in &episode.levels {
                source.insert(&info.file, sample_level(&info.file));
            }
        }
        source
    }

    /// Add or replace a level.
    pub fn insert(&self, file: &str, data: LevelData) {
        self.state
            .borrow_mut()
            .levels
            .insert(file.to_string(), data);
    }

    /// Remove a level.
    pub fn remove(&self, file: &str) {
        self.state.borrow_mut().levels.remove(file);
    }

    /// Make loads of `file` take `delay`.
    pub fn delay(&self, file: &str, delay: Duration) {
        self.state
            .borrow_mut()
            .delays
            .insert(file.to_string(), delay);
    }

    /// Files requested so far.
    pub fn loads(&self) -> Vec<String> {
        self.state.borrow().loads.clone()
    }
}

impl LevelSource for MemoryLevelSource {
    fn load<'a>(&'a self, file: &'a str) -> LocalBoxFuture<'a, Result<LevelData, LevelLoadError>> {
        async move {
            let delay = {
                let mut state = self.state.borrow_mut();
                state.loads.push(file.to_string());
                state.delays.get(file).copied()
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.state
                .borrow()
                .levels
                .get(file)
                .cloned()
                .ok_or_else(|| LevelLoadError::NotFound(file.to_string()))
        }
        .boxed_local()
    }
}

#[derive(Debug, Default)]
struct AssetState {
    failing: BTreeSet<String>,
    stalled: BTreeSet<String>,
    fetched: Vec<String>,
}

/// Asset fetcher that succeeds unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    state: Rc<RefCell<AssetState>>,
}

impl MemoryAssets {
    /// Create a new fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail fetches of `path`.
    pub fn fail(&self, path: &str) {
        self.state.borrow_mut().failing.insert(path.to_string());
    }

    /// Never finish fetches of `path`.
    pub fn stall(&self, path: &str) {
        self.state.borrow_mut().stalled.insert(path.to_string());
    }

    /// Paths fetched successfully, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.state.borrow().fetched.clone()
    }
}

impl AssetFetcher for MemoryAssets {
    fn fetch<'a>(&'a self, path: &'a str) -> LocalBoxFuture<'a, Result<(), AssetError>> {
        async move {
            let (failing, stalled) = {
                let state = self.state.borrow();
                (state.failing.contains(path), state.stalled.contains(path))
            };
            if stalled {
                std::future::pending::<()>().await;
            }
            if failing {
                return Err(AssetError::Fetch {
                    path: path.to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
            self.state.borrow_mut().fetched.push(path.to_string());
            Ok(())
        }
        .boxed_local()
    }
}

// =============================================================================
// RIG
// =============================================================================

/// One handle to every headless collaborator.
#[derive(Debug, Clone)]
pub struct Headless {
    /// Presenter.
    pub presenter: HeadlessPresenter,
    /// World.
    pub world: ScriptedWorld,
    /// Audio.
    pub audio: RecordingAudio,
    /// Input device.
    pub input: ScriptedInput,
    /// Clock.
    pub clock: ManualClock,
    /// Level files.
    pub levels: MemoryLevelSource,
    /// Asset fetcher.
    pub assets: MemoryAssets,
    /// Save slots.
    pub store: MemoryStore,
}

impl Headless {
    /// Collaborators with sample levels for every file of `episodes`.
    pub fn new(episodes: &EpisodeTable) -> Self {
        Self {
            presenter: HeadlessPresenter::new(),
            world: ScriptedWorld::new(),
            audio: RecordingAudio::new(),
            input: ScriptedInput::new(),
            clock: ManualClock::new(),
            levels: MemoryLevelSource::for_episodes(episodes),
            assets: MemoryAssets::new(),
            store: MemoryStore::new(),
        }
    }

    /// Boxed collaborators sharing state with this rig.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            presenter: Box::new(self.presenter.clone()),
            world: Box::new(self.world.clone()),
            audio: Box::new(self.audio.clone()),
            input: Box::new(self.input.clone()),
            clock: Rc::new(self.clock.clone()),
            levels: Rc::new(self.levels.clone()),
            assets: Rc::new(self.assets.clone()),
            store: Box::new(self.store.clone()),
        }
    }
}
