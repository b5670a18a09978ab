//! Output module for human-facing reports
//!
//! This module handles:
//! - The SUMMARY.md table of contents placed in the archive
//! - Session statistics printed at the end of a run

mod stats;
mod summary;

pub use stats::{print_statistics, SessionStatistics};
pub use summary::format_summary;
