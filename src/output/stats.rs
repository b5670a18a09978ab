//! Session statistics
//!
//! This module provides functionality for extracting and displaying the
//! counters of a finished scan or export.

use crate::state::{FailureKind, Session, SessionState};
use std::collections::BTreeMap;

/// Session statistics summary
#[derive(Debug, Clone)]
pub struct SessionStatistics {
    /// Terminal state of the last activity
    pub state: SessionState,

    /// Pages in the discovered set
    pub found: usize,

    /// Pages still waiting when the activity ended
    pub queued: usize,

    /// Pages (or files) processed
    pub done: usize,

    /// Outstanding failures
    pub failed: usize,

    /// Outstanding failures grouped by reason prefix
    pub failures_by_kind: BTreeMap<&'static str, usize>,
}

impl SessionStatistics {
    /// Snapshots the counters of `session`
    pub fn collect(session: &Session) -> Self {
        let progress = session.progress();
        let failures = session.failures();

        let mut failures_by_kind = BTreeMap::new();
        for item in &failures {
            *failures_by_kind.entry(item.kind.prefix()).or_insert(0) += 1;
        }

        Self {
            state: session.state(),
            found: progress.found.max(session.pages().len()),
            queued: progress.queued,
            done: progress.done,
            failed: failures.len(),
            failures_by_kind,
        }
    }

    /// Count of one failure kind
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures_by_kind.get(kind.prefix()).copied().unwrap_or(0)
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SessionStatistics) {
    println!("=== Session Statistics ===\n");

    println!("Overview:");
    println!("  State: {}", stats.state);
    println!("  Found: {}", stats.found);
    println!("  Queued: {}", stats.queued);
    println!("  Done: {}", stats.done);
    println!("  Failed: {}", stats.failed);
    println!();

    if !stats.failures_by_kind.is_empty() {
        println!("Failures:");
        for (kind, count) in &stats.failures_by_kind {
            println!("  {}: {}", kind, count);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_groups_failures() {
        let session = Session::new();
        session.record_failure("https://e.com/a", FailureKind::PageFetch, "http-500", None);
        session.record_failure("https://e.com/b", FailureKind::PageFetch, "timeout", None);
        session.record_failure("https://e.com/i.png", FailureKind::ImageDownload, "http-404", None);
        session.set_progress(|p| p.done = 7);

        let stats = SessionStatistics::collect(&session);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.done, 7);
        assert_eq!(stats.failures_of(FailureKind::PageFetch), 2);
        assert_eq!(stats.failures_of(FailureKind::ImageDownload), 1);
        assert_eq!(stats.failures_of(FailureKind::Markdown), 0);
        assert_eq!(stats.state, SessionState::Idle);
    }
}
