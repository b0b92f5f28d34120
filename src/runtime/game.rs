//! Game Runtime
//!
//! Async entry points over the shared controller. Everything here runs on the
//! current thread inside a `tokio::task::LocalSet`.

use std::cell::RefMut;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{Action, ControlBindings, GameConfig};
use crate::game::state::Skill;
use crate::level::data::EpisodeTable;
use crate::level::pipeline::{load_level, LoadOutcome, PipelineError};
use crate::runtime::controller::{Collaborators, GameController, KeyOutcome, SharedGame};

/// Handle to a running game.
#[derive(Clone)]
pub struct GameRuntime {
    shared: SharedGame,
}

impl GameRuntime {
    /// Create a runtime with no session.
    pub fn new(config: GameConfig, episodes: EpisodeTable, collab: Collaborators) -> Self {
        Self {
            shared: GameController::new(config, episodes, collab).into_shared(),
        }
    }

    /// Shared controller handle.
    pub fn shared(&self) -> &SharedGame {
        &self.shared
    }

    /// Borrow the controller. Do not hold across an await.
    pub fn controller(&self) -> RefMut<'_, GameController> {
        self.shared.borrow_mut()
    }

    /// Start a new session.
    pub fn start_game(&self, skill: Skill) -> Uuid {
        self.shared.borrow_mut().start_game(skill)
    }

    /// Load a level into the current session and start the loops.
    pub async fn start_level(
        &self,
        episode: usize,
        level: usize,
    ) -> Result<LoadOutcome, PipelineError> {
        load_level(&self.shared, episode, level, None).await
    }

    /// Stop the running game.
    pub fn end_game(&self) {
        self.shared.borrow_mut().end_game();
    }

    /// Handle a key press, loading the next level when an intermission is
    /// confirmed.
    pub async fn handle_key(&self, key: &str) -> Result<KeyOutcome, PipelineError> {
        let outcome = self.shared.borrow_mut().handle_key(key);
        if let KeyOutcome::StartLevel { episode, level } = outcome {
            self.start_level(episode, level).await?;
        }
        Ok(outcome)
    }

    /// Save the session.
    pub fn save(&self) -> bool {
        self.shared.borrow_mut().save()
    }

    /// Replace the session with the saved game. Failures are logged and
    /// reported as `false`.
    #[instrument(skip(self))]
    pub async fn load(&self) -> bool {
        let restore = match self.shared.borrow().read_save() {
            Ok(restore) => restore,
            Err(e) => {
                warn!(error = %e, "load failed");
                return false;
            }
        };

        let (episode, level) = (restore.episode, restore.level_index);
        self.shared.borrow_mut().begin_restore(&restore);

        match load_level(&self.shared, episode, level, Some(restore.overrides)).await {
            Ok(LoadOutcome::Started) => {
                info!(episode, level, "game loaded");
                true
            }
            Ok(LoadOutcome::Superseded) => {
                warn!("load superseded");
                false
            }
            Err(e) => {
                error!(error = %e, "saved level failed to load");
                false
            }
        }
    }

    /// Pause or unpause.
    pub fn toggle_pause(&self) {
        self.shared.borrow_mut().toggle_pause();
    }

    /// Pause and hand control to the menu.
    pub fn exit_to_menu(&self) {
        self.shared.borrow_mut().exit_to_menu();
    }

    /// Back from the menu.
    pub fn resume(&self) {
        self.shared.borrow_mut().resume();
    }

    /// Turn pointer-look on or off.
    pub fn enable_pointer(&self, enabled: bool) {
        self.shared.borrow_mut().enable_pointer(enabled);
    }

    /// Toggle fullscreen scaling.
    pub fn toggle_fullscreen(&self) {
        self.shared.borrow_mut().toggle_fullscreen();
    }

    /// Copy of the control bindings.
    pub fn controls(&self) -> ControlBindings {
        self.shared.borrow().controls()
    }

    /// Rebind one action.
    pub fn bind_control(&self, action: Action, keys: Vec<String>) {
        self.shared.borrow_mut().bind_control(action, keys);
    }
}
