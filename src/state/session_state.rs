/// Session state definitions for tracking scan/export progress
///
/// This module defines every state a crawl/export session can be in and the
/// transitions allowed between them.
use std::fmt;

/// Represents the current state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    // ===== Idle =====
    /// Nothing running
    Idle,

    // ===== Active States =====
    /// Discovery is running
    Scanning,

    /// Export is running
    Exporting,

    /// A scan or export observed a pause request and is blocked at a checkpoint
    Paused,

    // ===== Terminal States =====
    /// Last activity finished normally
    Completed,

    /// Last activity ended early on a stop request
    Stopped,

    /// Last activity aborted with a fatal error
    Failed,
}

impl SessionState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }

    /// Returns true while a scan or export owns the session
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Scanning | Self::Exporting | Self::Paused)
    }

    /// Checks if a transition from this state to another is valid
    ///
    /// Valid transitions:
    /// - Idle/terminal → Scanning | Exporting
    /// - Scanning | Exporting → Paused | Completed | Stopped | Failed
    /// - Paused → Scanning | Exporting (resume) | Stopped | Failed
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;

        match (self, target) {
            (Idle | Completed | Stopped | Failed, Scanning | Exporting) => true,
            (Scanning | Exporting, Paused | Completed | Stopped | Failed) => true,
            (Paused, Scanning | Exporting | Stopped | Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Exporting => "exporting",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_from_idle_or_terminal() {
        for from in [
            SessionState::Idle,
            SessionState::Completed,
            SessionState::Stopped,
            SessionState::Failed,
        ] {
            assert!(from.can_transition_to(SessionState::Scanning));
            assert!(from.can_transition_to(SessionState::Exporting));
            assert!(!from.can_transition_to(SessionState::Paused));
        }
    }

    #[test]
    fn test_pause_and_resume() {
        assert!(SessionState::Scanning.can_transition_to(SessionState::Paused));
        assert!(SessionState::Paused.can_transition_to(SessionState::Scanning));
        assert!(SessionState::Exporting.can_transition_to(SessionState::Paused));
        assert!(SessionState::Paused.can_transition_to(SessionState::Exporting));
    }

    #[test]
    fn test_no_scan_while_exporting() {
        assert!(!SessionState::Exporting.can_transition_to(SessionState::Scanning));
        assert!(!SessionState::Scanning.can_transition_to(SessionState::Exporting));
        assert!(!SessionState::Paused.can_transition_to(SessionState::Completed));
    }

    #[test]
    fn test_terminal_and_active() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Stopped.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
        assert!(SessionState::Paused.is_active());
        assert!(!SessionState::Idle.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Scanning.to_string(), "scanning");
        assert_eq!(SessionState::default(), SessionState::Idle);
    }
}
