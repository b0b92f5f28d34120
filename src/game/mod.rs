//! Game Logic Module
//!
//! Session simulation. Nothing here draws, plays sound or touches the clock;
//! collaborators are passed in.
//!
//! ## Module Structure
//!
//! - `input`: Control sampling into per-tic commands
//! - `clock`: Fixed-rate tic accumulator
//! - `state`: Session, level, player and entity state
//! - `death`: Death turn and death overlay timer
//! - `intermission`: Level tally, bonuses and next-level routing
//! - `tick`: Game state machine
//! - `events`: Events raised by the state machine

pub mod clock;
pub mod death;
pub mod events;
pub mod input;
pub mod intermission;
pub mod state;
pub mod tick;

// Re-export key types
pub use clock::TicScheduler;
pub use events::{GameEvent, GameEventData};
pub use input::{Command, RawInput};
pub use state::{Level, Player, Playstate, Session, Skill};
pub use tick::{GamePhase, GameStateMachine, TickResult};
