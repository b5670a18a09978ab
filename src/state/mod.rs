//! State management module
//!
//! This module contains the session lifecycle, the cooperative pause
//! controller, the failure log and per-host throttling state.

mod failure;
mod host_state;
mod pause;
mod session;
mod session_state;

pub use failure::{FailedItem, FailureKind, FailureLog};
pub use host_state::HostRateState;
pub use pause::{Checkpoint, PauseController};
pub use session::{ActivityGuard, DiscoveredPage, Progress, Session, SessionEvent};
pub use session_state::SessionState;
