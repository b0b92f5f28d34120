//! Wolf Core Demo Driver
//!
//! Runs a headless session: start a game, play a level, finish it, advance,
//! save and reload. Pass a TOML config path as the first argument to override
//! the defaults.

use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::LocalSet;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use wolf_core::{
    level::data::EpisodeTable,
    runtime::{headless::Headless, TokioClock, WorldSignal},
    GameConfig, GameRuntime, Skill, TIC_RATE, VERSION,
};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let config = match std::env::args().nth(1) {
        Some(path) => GameConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => GameConfig::default(),
    };

    info!("Wolf Core v{}", VERSION);
    info!(
        "Tic Rate: {} Hz, logic {} Hz, render {} Hz",
        TIC_RATE, config.logic_hz, config.render_hz
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    LocalSet::new().block_on(&runtime, demo_session(config))
}

/// Demo session against the headless collaborators.
async fn demo_session(config: GameConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Session ===");

    let episodes = EpisodeTable::default();
    let rig = Headless::new(&episodes);
    let mut collab = rig.collaborators();
    collab.clock = Rc::new(TokioClock::new());
    let game = GameRuntime::new(config, episodes, collab);

    let session = game.start_game(Skill::Medium);
    info!("Session: {}", session);

    game.start_level(0, 0).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    info!(
        "Logic cycles: {}, frames: {}",
        rig.world.log().player_cycles,
        rig.presenter.log().frames
    );

    // Finish the level and confirm the tally
    rig.world.signal(WorldSignal::ExitLevel);
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Some(report) = rig.presenter.log().intermission.clone() {
        info!(
            "Floor {} done: kills {}%, secrets {}%, treasure {}%, bonus {}",
            report.floor,
            report.kill_ratio,
            report.secret_ratio,
            report.treasure_ratio,
            report.bonus
        );
    }
    let outcome = game.handle_key("ENTER").await?;
    info!("Intermission confirmed: {:?}", outcome);

    // Save, play on, reload
    if !game.save() {
        warn!("save failed");
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    let loaded = game.load().await;
    info!("Reloaded from save: {}", loaded);

    if let Some(session) = game.controller().session() {
        if let Some(player) = &session.player {
            info!(
                "Player at level {}: score {}, lives {}, health {}",
                session.level_index, player.score, player.lives, player.health
            );
        }
    }

    game.end_game();
    info!("=== Demo Complete ===");
    Ok(())
}
