//! Runtime Module
//!
//! The session controller, its two loops, and the collaborator seams it drives.
//!
//! ## Components
//!
//! - **Controller**: owns the current session, handles keys and screens
//! - **Scheduler**: logic and render loop handles
//! - **Game**: async entry points (start level, save, load)
//! - **Presenter / Services**: traits for drawing, world, audio, input, clock
//! - **Headless**: in-memory collaborators

pub mod controller;
pub mod game;
pub mod headless;
pub mod presenter;
pub mod scheduler;
pub mod services;

pub use controller::{Collaborators, GameController, KeyOutcome, SharedGame};
pub use game::GameRuntime;
pub use presenter::{Presenter, Screen};
pub use scheduler::{start_loops, LoopScheduler};
pub use services::{Audio, Clock, InputDevice, TokioClock, WorldServices, WorldSignal};
