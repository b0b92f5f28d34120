//! # Wolf Core
//!
//! Simulation and session core for a raycast first-person shooter.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         WOLF CORE                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure helpers                              │
//! │  ├── angle.rs    - Angle normalization and bearings          │
//! │  └── digits.rs   - HUD / intermission digit layout           │
//! │                                                              │
//! │  game/           - Session simulation (headless)             │
//! │  ├── input.rs    - Control sampling into per-tic commands    │
//! │  ├── clock.rs    - Fixed-rate tic accumulator                │
//! │  ├── state.rs    - Session, level, player and entity state   │
//! │  ├── death.rs    - Death turn and death timer                │
//! │  ├── intermission.rs - Level scoring and next-level routing  │
//! │  ├── tick.rs     - Game state machine                        │
//! │  └── events.rs   - Events raised by the state machine        │
//! │                                                              │
//! │  level/          - Level transitions                         │
//! │  ├── data.rs     - Level data and episode table              │
//! │  ├── source.rs   - Level / asset loading seams               │
//! │  ├── spawn.rs    - Entity placement scan                     │
//! │  ├── preload.rs  - Process-wide asset preload cache          │
//! │  └── pipeline.rs - Async load -> preload -> spawn -> resume  │
//! │                                                              │
//! │  persist/        - Save slots                                │
//! │  ├── snapshot.rs - Versioned session snapshot                │
//! │  └── store.rs    - Key/value save stores                     │
//! │                                                              │
//! │  runtime/        - Loops and collaborators                   │
//! │  ├── controller.rs - Session lifecycle owner                 │
//! │  ├── scheduler.rs  - Logic / render loop handles             │
//! │  ├── game.rs       - Async entry points                      │
//! │  ├── presenter.rs  - Presentation contract                   │
//! │  ├── services.rs   - World, audio, input and clock seams     │
//! │  └── headless.rs   - In-memory collaborators                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Time Domains
//!
//! The logic loop runs at ~30 Hz wall clock and consumes a variable number of
//! fixed-rate tics (70 per modeled second) per invocation. The render loop runs
//! once per display refresh and never mutates simulation state. Level loading is
//! the only true suspension point; both loops only start once it resolves.
//!
//! Everything runs on one cooperative thread (`tokio::task::LocalSet`), so
//! ordering between the loops is decided by scheduling, never by locking.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod level;
pub mod persist;
pub mod runtime;

// Re-export commonly used types
pub use config::{Action, ControlBindings, GameConfig};
pub use game::clock::TicScheduler;
pub use game::input::{Command, RawInput};
pub use game::state::{Level, Player, Playstate, Session, Skill};
pub use game::tick::{GamePhase, GameStateMachine};
pub use runtime::game::GameRuntime;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tic rate (tics per modeled second).
pub const TIC_RATE: u32 = 70;

/// Angle units in one full turn. Stored angles always lie in `[0, ANGLES)`.
pub const ANGLES: i32 = 3600;

/// Map width and height in tiles.
pub const MAP_SIZE: usize = 64;

/// Fractional bits of a world coordinate (one tile = `1 << TILE_SHIFT`).
pub const TILE_SHIFT: u32 = 16;

/// Size of one tile in world units.
pub const TILE_GLOBAL: i32 = 1 << TILE_SHIFT;
