//! Loop Scheduler
//!
//! The logic loop (~30 Hz) and the render loop (~60 Hz) are local tasks on
//! the current thread. Each holds a weak handle to the controller, borrows it
//! only between awaits, and stops on its own when the controller is dropped.
//!
//! Must run inside a `tokio::task::LocalSet`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::runtime::controller::{GameController, SharedGame};

/// Cancellable handle to one loop.
#[derive(Debug, Default)]
pub struct LoopHandle {
    task: Option<JoinHandle<()>>,
}

impl LoopHandle {
    fn running(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Whether the loop was started and not cancelled.
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Stop the loop. Cancelling twice is a no-op.
    pub fn cancel(&mut self) {
        match self.task.take() {
            Some(task) => task.abort(),
            None => debug!("loop already cancelled"),
        }
    }
}

/// Handles of both loops.
#[derive(Debug, Default)]
pub struct LoopScheduler {
    logic: LoopHandle,
    render: LoopHandle,
}

impl LoopScheduler {
    /// Create a scheduler with no loops running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether either loop runs.
    pub fn is_running(&self) -> bool {
        self.logic.is_active() || self.render.is_active()
    }

    /// Cancel both loops.
    pub fn stop_all(&mut self) {
        self.logic.cancel();
        self.render.cancel();
    }

    fn install(&mut self, logic: JoinHandle<()>, render: JoinHandle<()>) {
        self.stop_all();
        self.logic = LoopHandle::running(logic);
        self.render = LoopHandle::running(render);
    }
}

/// Start both loops for the controller, replacing any running ones.
pub fn start_loops(game: &SharedGame) {
    let (logic_period, render_period) = {
        let mut controller = game.borrow_mut();
        controller.loops_mut().stop_all();
        controller.loop_periods()
    };

    let logic = tokio::task::spawn_local(logic_loop(Rc::downgrade(game), logic_period));
    let render = tokio::task::spawn_local(render_loop(Rc::downgrade(game), render_period));
    game.borrow_mut().loops_mut().install(logic, render);
    debug!(?logic_period, ?render_period, "loops started");
}

async fn logic_loop(game: Weak<RefCell<GameController>>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(game) = game.upgrade() else {
            break;
        };
        game.borrow_mut().run_logic_cycle();
    }
}

async fn render_loop(game: Weak<RefCell<GameController>>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(game) = game.upgrade() else {
            break;
        };
        game.borrow_mut().render_frame();
    }
}
