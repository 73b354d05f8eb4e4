//! A generic cooperative state machine driven by a periodic tick task.
//!
//! Any type implementing [`State`] can be run.  The machine owns exactly one
//! live state, which is moved into a spawned tick task; that task is the only
//! code that ever touches it.
//!
//! ## Lifecycle
//!
//! 1. [`StateMachine::start`] runs the initial state's `on_enter`, then spawns
//!    the tick loop.
//! 2. Every tick period the loop calls `on_update` and applies the returned
//!    [`Transition`].  A transition runs `old.on_exit`, swaps the state, then
//!    runs `new.on_enter`, in that order.
//! 3. [`StateMachine::stop`] raises the cancellation flag and waits.  The tick
//!    task finishes its in-flight tick, runs the live state's `on_exit` and
//!    ends.  No `on_update` runs after `on_exit` has begun.
//!
//! Errors from any hook are handed to the failing state's
//! [`State::on_fault`], which decides between continuing, recovering into
//! another state, or halting the machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

/// Default tick period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(10);

/// What the machine should do after an `on_update`.
#[derive(Debug)]
pub enum Transition<S> {
    /// Keep the current state.
    Stay,
    /// Exit the current state and enter this one.
    To(S),
    /// Exit the current state and stop the machine.
    Halt,
}

/// How the machine reacts to a hook error.
#[derive(Debug)]
pub enum FaultAction<S> {
    /// Log and keep ticking the current state.
    Continue,
    /// Transition into this state.
    Recover(S),
    /// Exit the current state and stop the machine with the error.
    Halt,
}

/// One state of a [`StateMachine`].
#[async_trait]
pub trait State: Send + Sized + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name used in logs and reported by [`StateMachine::current_state`].
    fn name(&self) -> &'static str;

    /// Called once before the first `on_update`.
    async fn on_enter(&mut self) -> Result<(), Self::Error>;

    /// Called once per tick.
    async fn on_update(&mut self) -> Result<Transition<Self>, Self::Error>;

    /// Called once after the last `on_update`.
    async fn on_exit(&mut self) -> Result<(), Self::Error>;

    /// Decides what to do about an error raised by one of this state's hooks.
    fn on_fault(&mut self, error: &Self::Error) -> FaultAction<Self> {
        let _ = error;
        FaultAction::Halt
    }
}

/// Errors reported by the machine itself.
#[derive(Debug, Error)]
pub enum StateMachineError<E>
where
    E: std::error::Error + 'static,
{
    /// A state hook failed and the fault policy did not absorb it.
    #[error("state hook failed: {0}")]
    Hook(#[source] E),

    #[error("tick task panicked")]
    TickTaskPanicked,
}

/// Lifecycle status of a [`StateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineStatus {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

type TickResult<E> = Result<(), StateMachineError<E>>;

/// Runs one [`State`] at a time on a periodic tick task.
pub struct StateMachine<S: State> {
    tick_period: Duration,
    cancel: Arc<AtomicBool>,
    status: Arc<watch::Sender<MachineStatus>>,
    current: Arc<watch::Sender<Option<&'static str>>>,
    task: Option<JoinHandle<TickResult<S::Error>>>,
}

impl<S: State> StateMachine<S> {
    pub fn new(tick_period: Duration) -> Self {
        let (status, _) = watch::channel(MachineStatus::NotStarted);
        let (current, _) = watch::channel(None);
        Self {
            tick_period,
            cancel: Arc::new(AtomicBool::new(false)),
            status: Arc::new(status),
            current: Arc::new(current),
            task: None,
        }
    }

    pub fn status(&self) -> MachineStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<MachineStatus> {
        self.status.subscribe()
    }

    /// Name of the live state, or `None` when the machine is not running.
    pub fn current_state(&self) -> Option<&'static str> {
        *self.current.borrow()
    }

    pub fn watch_current_state(&self) -> watch::Receiver<Option<&'static str>> {
        self.current.subscribe()
    }

    /// Enters `initial` and starts ticking.
    ///
    /// Does nothing if the machine is running or stopping.  If `on_enter`
    /// fails the error is returned and the machine stays stopped.
    pub async fn start(&mut self, mut initial: S) -> TickResult<S::Error> {
        match self.status() {
            MachineStatus::Running | MachineStatus::Stopping => {
                debug!("start ignored: machine already running");
                return Ok(());
            }
            MachineStatus::NotStarted | MachineStatus::Stopped => {}
        }
        if let Some(finished) = self.task.take() {
            if let Err(e) = finished.await {
                warn!("previous tick task ended abnormally: {e}");
            }
        }

        initial.on_enter().await.map_err(StateMachineError::Hook)?;
        info!(state = initial.name(), "state machine started");

        self.cancel.store(false, Ordering::SeqCst);
        self.status.send_replace(MachineStatus::Running);
        self.current.send_replace(Some(initial.name()));

        let ticker = TickLoop {
            state: initial,
            period: self.tick_period,
            cancel: Arc::clone(&self.cancel),
            current: Arc::clone(&self.current),
        };
        let status = Arc::clone(&self.status);
        let current = Arc::clone(&self.current);
        self.task = Some(tokio::spawn(async move {
            let result = ticker.run().await;
            current.send_replace(None);
            status.send_replace(MachineStatus::Stopped);
            result
        }));
        Ok(())
    }

    /// Cancels the tick loop and waits for the live state to exit.
    ///
    /// Does nothing unless the machine is running.
    pub async fn stop(&mut self) -> TickResult<S::Error> {
        let stopping = self.status.send_if_modified(|status| {
            if *status != MachineStatus::Running {
                return false;
            }
            *status = MachineStatus::Stopping;
            true
        });
        if !stopping {
            debug!("stop ignored: machine not running");
            return Ok(());
        }
        self.cancel.store(true, Ordering::SeqCst);
        self.join().await
    }

    /// Waits for the tick task to end on its own and returns the fault that
    /// halted it, if any.
    ///
    /// Cancelling this future leaves the task running; `join` or `stop` can be
    /// called again later.
    pub async fn join(&mut self) -> TickResult<S::Error> {
        let Some(handle) = self.task.as_mut() else {
            return Ok(());
        };
        let joined = handle.await;
        self.task = None;
        // The task is gone whichever way it ended.
        self.current.send_replace(None);
        self.status.send_replace(MachineStatus::Stopped);
        match joined {
            Ok(result) => result,
            Err(e) => {
                error!("tick task failed: {e}");
                Err(StateMachineError::TickTaskPanicked)
            }
        }
    }
}

// ── Tick loop ─────────────────────────────────────────────────────────────────

struct TickLoop<S: State> {
    state: S,
    period: Duration,
    cancel: Arc<AtomicBool>,
    current: Arc<watch::Sender<Option<&'static str>>>,
}

impl<S: State> TickLoop<S> {
    async fn run(mut self) -> TickResult<S::Error> {
        let mut outcome = Ok(());
        while !self.cancel.load(Ordering::SeqCst) {
            match self.tick().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    outcome = Err(StateMachineError::Hook(e));
                    break;
                }
            }
            time::sleep(self.period).await;
        }

        let name = self.state.name();
        if let Err(e) = self.state.on_exit().await {
            error!(state = name, "exit failed: {e}");
            if outcome.is_ok() {
                outcome = Err(StateMachineError::Hook(e));
            }
        }
        info!(state = name, "state machine stopped");
        outcome
    }

    /// Runs one update and applies its outcome.
    ///
    /// Returns `Ok(false)` when the state asked to halt, and the error when
    /// the fault policy halts the machine.
    async fn tick(&mut self) -> Result<bool, S::Error> {
        let mut step = self.state.on_update().await;
        loop {
            match step {
                Ok(Transition::Stay) => return Ok(true),
                Ok(Transition::Halt) => {
                    info!(state = self.state.name(), "state requested halt");
                    return Ok(false);
                }
                Ok(Transition::To(next)) => match self.switch_to(next).await {
                    Ok(()) => return Ok(true),
                    Err(e) => step = Err(e),
                },
                Err(e) => match self.state.on_fault(&e) {
                    FaultAction::Continue => {
                        warn!(state = self.state.name(), "fault ignored: {e}");
                        return Ok(true);
                    }
                    FaultAction::Recover(next) => {
                        warn!(
                            state = self.state.name(),
                            recover_to = next.name(),
                            "recovering from fault: {e}"
                        );
                        step = Ok(Transition::To(next));
                    }
                    FaultAction::Halt => {
                        error!(state = self.state.name(), "halting on fault: {e}");
                        return Err(e);
                    }
                },
            }
        }
    }

    async fn switch_to(&mut self, next: S) -> Result<(), S::Error> {
        let from = self.state.name();
        info!(from, to = next.name(), "state transition");
        if let Err(e) = self.state.on_exit().await {
            warn!(state = from, "exit failed during transition: {e}");
        }
        self.state = next;
        self.current.send_replace(Some(self.state.name()));
        self.state.on_enter().await
    }
}
