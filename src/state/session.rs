//! The session context shared by discovery and export
//!
//! A [`Session`] owns everything that lives for one crawl/export session: the
//! lifecycle state, the pause controller, the discovered page list, the failure
//! log and the HTML/title caches. Presentation layers subscribe to
//! [`SessionEvent`]s instead of reading shared globals.

use crate::state::failure::{FailedItem, FailureKind, FailureLog};
use crate::state::pause::{Checkpoint, PauseController};
use crate::state::session_state::SessionState;
use crate::url::NormalizedUrl;
use crate::SessionError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// A page accepted into the discovered set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPage {
    pub url: NormalizedUrl,
    pub title: String,
}

/// Counters shown by progress displays
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub found: usize,
    pub queued: usize,
    pub done: usize,
    pub failed: usize,
    pub current: Option<String>,
}

/// Notifications broadcast to subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    PageDiscovered(DiscoveredPage),
    Progress(Progress),
    FailureRecorded(FailedItem),
    Paused,
    Resumed,
}

#[derive(Debug, Default)]
struct Lifecycle {
    state: SessionState,
    /// State to return to when a pause ends
    resume_to: Option<SessionState>,
}

/// Explicit session context owned by the caller and lent to the engines
pub struct Session {
    lifecycle: Mutex<Lifecycle>,
    control: PauseController,
    events: broadcast::Sender<SessionEvent>,
    progress: Mutex<Progress>,
    pages: Mutex<Vec<DiscoveredPage>>,
    failures: Mutex<FailureLog>,
    html_cache: Mutex<HashMap<NormalizedUrl, String>>,
    site_name: Mutex<Option<String>>,
    docs_root: Mutex<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            lifecycle: Mutex::new(Lifecycle::default()),
            control: PauseController::new(),
            events,
            progress: Mutex::new(Progress::default()),
            pages: Mutex::new(Vec::new()),
            failures: Mutex::new(FailureLog::new()),
            html_cache: Mutex::new(HashMap::new()),
            site_name: Mutex::new(None),
            docs_root: Mutex::new("/".to_string()),
        }
    }

    // ===== Lifecycle =====

    pub fn state(&self) -> SessionState {
        lock(&self.lifecycle).state
    }

    /// Claims the session for a scan or export
    ///
    /// Fails with [`SessionError::Busy`] while another activity runs. The
    /// returned guard marks the session `Failed` if dropped unfinished.
    pub fn begin(&self, activity: SessionState) -> Result<ActivityGuard<'_>, SessionError> {
        {
            let lifecycle = lock(&self.lifecycle);
            if lifecycle.state.is_active() {
                return Err(SessionError::Busy);
            }
        }
        self.control.reset();
        self.transition(activity)?;
        self.set_progress(|p| {
            p.done = 0;
            p.queued = 0;
            p.current = None;
        });
        Ok(ActivityGuard {
            session: self,
            finished: false,
        })
    }

    fn transition(&self, to: SessionState) -> Result<(), SessionError> {
        let from = {
            let mut lifecycle = lock(&self.lifecycle);
            let from = lifecycle.state;
            if !from.can_transition_to(to) {
                return Err(SessionError::InvalidTransition { from, to });
            }
            lifecycle.state = to;
            from
        };
        tracing::debug!("Session state {} -> {}", from, to);
        self.emit(SessionEvent::StateChanged { from, to });
        Ok(())
    }

    // ===== Pause / resume / stop =====

    pub fn request_pause(&self) {
        self.control.request_pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn request_stop(&self) {
        self.control.request_stop();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.control.is_stop_requested()
    }

    /// Honors a pending pause or stop request
    ///
    /// Returns immediately while running. When a pause is pending the session
    /// moves to `Paused`, the caller blocks until resumed, and the previous
    /// active state is restored.
    pub async fn checkpoint(&self) -> Checkpoint {
        if let Some(outcome) = self.control.poll() {
            return outcome;
        }

        self.enter_paused();
        let outcome = self.control.wait_at_checkpoint().await;
        if outcome == Checkpoint::Continue {
            self.leave_paused();
        }
        outcome
    }

    fn enter_paused(&self) {
        let changed = {
            let mut lifecycle = lock(&self.lifecycle);
            match lifecycle.state {
                SessionState::Scanning | SessionState::Exporting => {
                    lifecycle.resume_to = Some(lifecycle.state);
                    lifecycle.state = SessionState::Paused;
                    lifecycle.resume_to
                }
                _ => None,
            }
        };
        if let Some(from) = changed {
            tracing::info!("Session paused");
            self.emit(SessionEvent::StateChanged {
                from,
                to: SessionState::Paused,
            });
            self.emit(SessionEvent::Paused);
        }
    }

    fn leave_paused(&self) {
        let changed = {
            let mut lifecycle = lock(&self.lifecycle);
            match (lifecycle.state, lifecycle.resume_to.take()) {
                (SessionState::Paused, Some(previous)) => {
                    lifecycle.state = previous;
                    Some(previous)
                }
                _ => None,
            }
        };
        if let Some(to) = changed {
            tracing::info!("Session resumed");
            self.emit(SessionEvent::StateChanged {
                from: SessionState::Paused,
                to,
            });
            self.emit(SessionEvent::Resumed);
        }
    }

    // ===== Events =====

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn progress(&self) -> Progress {
        lock(&self.progress).clone()
    }

    /// Mutates the progress counters and broadcasts the new snapshot
    pub fn set_progress(&self, update: impl FnOnce(&mut Progress)) {
        let snapshot = {
            let mut progress = lock(&self.progress);
            update(&mut progress);
            progress.clone()
        };
        self.emit(SessionEvent::Progress(snapshot));
    }

    // ===== Discovered pages =====

    /// Replaces the page list with a finished discovery result
    pub fn set_pages(&self, pages: Vec<DiscoveredPage>) {
        let found = pages.len();
        *lock(&self.pages) = pages;
        self.set_progress(|p| p.found = found);
    }

    pub fn pages(&self) -> Vec<DiscoveredPage> {
        lock(&self.pages).clone()
    }

    pub fn announce_page(&self, page: DiscoveredPage) {
        self.emit(SessionEvent::PageDiscovered(page));
    }

    pub fn set_docs_root(&self, root: &str) {
        *lock(&self.docs_root) = root.to_string();
    }

    pub fn docs_root(&self) -> String {
        lock(&self.docs_root).clone()
    }

    pub fn set_site_name(&self, name: Option<String>) {
        *lock(&self.site_name) = name;
    }

    pub fn site_name(&self) -> Option<String> {
        lock(&self.site_name).clone()
    }

    // ===== Caches =====

    pub fn cache_html(&self, url: &str, html: String) {
        lock(&self.html_cache).insert(url.to_string(), html);
    }

    pub fn cached_html(&self, url: &str) -> Option<String> {
        lock(&self.html_cache).get(url).cloned()
    }

    pub fn clear_html_cache(&self) {
        lock(&self.html_cache).clear();
    }

    // ===== Failures =====

    /// Records a recoverable failure and broadcasts it
    pub fn record_failure(
        &self,
        url: &str,
        kind: FailureKind,
        detail: impl Into<String>,
        title: Option<String>,
    ) -> FailedItem {
        let (item, count) = {
            let mut failures = lock(&self.failures);
            let item = failures.record(url, kind, detail, title);
            (item, failures.len())
        };
        tracing::warn!("Recorded failure: {}", item);
        self.emit(SessionEvent::FailureRecorded(item.clone()));
        self.set_progress(|p| p.failed = count);
        item
    }

    pub fn failures(&self) -> Vec<FailedItem> {
        lock(&self.failures).items().to_vec()
    }

    pub fn failure(&self, id: u64) -> Option<FailedItem> {
        lock(&self.failures).get(id).cloned()
    }

    pub fn remove_failure(&self, id: u64) -> Result<FailedItem, SessionError> {
        let (item, count) = {
            let mut failures = lock(&self.failures);
            let item = failures.remove(id).ok_or(SessionError::UnknownFailure(id))?;
            (item, failures.len())
        };
        self.set_progress(|p| p.failed = count);
        Ok(item)
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
        self.set_progress(|p| p.failed = 0);
    }

    /// Plain-text `url | reason` manifest of outstanding failures
    pub fn failure_manifest(&self) -> Option<String> {
        lock(&self.failures).manifest()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Ownership of the session for one scan or export
pub struct ActivityGuard<'a> {
    session: &'a Session,
    finished: bool,
}

impl ActivityGuard<'_> {
    /// Ends the activity in a terminal state
    pub fn finish(mut self, outcome: SessionState) -> Result<(), SessionError> {
        self.finished = true;
        self.session.transition(outcome)
    }
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.session.transition(SessionState::Failed) {
                tracing::debug!("Could not mark session failed: {}", e);
            }
        }
    }
}
