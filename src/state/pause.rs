//! Cooperative pause/resume/stop control
//!
//! Workers call [`PauseController::wait_at_checkpoint`] at well-defined points
//! (before a queue batch, before a queue item, before an image download). A
//! pause request never preempts in-flight work; it is observed at the next
//! checkpoint, which then blocks until [`PauseController::resume`] releases
//! every waiter at once.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Stop,
}

/// Outcome of passing a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Keep working
    Continue,
    /// Wind down and return partial results
    Stop,
}

/// Shared pause/stop flag observed at checkpoints
#[derive(Debug)]
pub struct PauseController {
    tx: watch::Sender<Control>,
}

impl PauseController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Control::Run);
        Self { tx }
    }

    /// Requests a pause; has no effect once a stop is pending
    pub fn request_pause(&self) {
        self.tx.send_if_modified(|c| {
            if *c == Control::Run {
                *c = Control::Pause;
                true
            } else {
                false
            }
        });
    }

    /// Releases all paused checkpoints
    pub fn resume(&self) {
        self.tx.send_if_modified(|c| {
            if *c == Control::Pause {
                *c = Control::Run;
                true
            } else {
                false
            }
        });
    }

    /// Requests a cooperative stop; wakes paused checkpoints too
    pub fn request_stop(&self) {
        self.tx.send_replace(Control::Stop);
    }

    /// Clears any pending pause/stop before a new activity starts
    pub fn reset(&self) {
        self.tx.send_replace(Control::Run);
    }

    pub fn is_pause_requested(&self) -> bool {
        *self.tx.borrow() == Control::Pause
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow() == Control::Stop
    }

    /// Checks the flag without blocking
    ///
    /// Returns `None` when a pause is pending and the caller must wait.
    pub fn poll(&self) -> Option<Checkpoint> {
        match *self.tx.borrow() {
            Control::Run => Some(Checkpoint::Continue),
            Control::Stop => Some(Checkpoint::Stop),
            Control::Pause => None,
        }
    }

    /// Blocks while a pause is pending
    pub async fn wait_at_checkpoint(&self) -> Checkpoint {
        let mut rx = self.tx.subscribe();
        let result = rx.wait_for(|c| *c != Control::Pause).await;
        match result.map(|c| *c) {
            Ok(Control::Run) => Checkpoint::Continue,
            _ => Checkpoint::Stop,
        }
    }
}

impl Default for PauseController {
    fn default() -> Self {
        Self::new()
    }
}
