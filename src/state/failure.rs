//! Recoverable failure bookkeeping
//!
//! Every per-URL failure becomes a [`FailedItem`] with a tagged reason. Items
//! live for the session, can be retried individually and are exported as a
//! plain-text manifest next to the archive.

use std::fmt;

/// Which stage produced a failure; rendered as the reason prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Discover,
    PageFetch,
    Markdown,
    ImageDownload,
    Retry,
}

impl FailureKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::PageFetch => "page-fetch-fail",
            Self::Markdown => "markdown-fail",
            Self::ImageDownload => "image-download-fail",
            Self::Retry => "retry-fail",
        }
    }
}

/// A recorded recoverable failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    /// Session-unique sequence number
    pub id: u64,
    pub url: String,
    pub kind: FailureKind,
    pub detail: String,
    pub title: Option<String>,
}

impl FailedItem {
    /// The tagged reason, e.g. `page-fetch-fail:http-500`
    pub fn reason(&self) -> String {
        format!("{}:{}", self.kind.prefix(), self.detail)
    }
}

impl fmt::Display for FailedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.url, self.reason())
    }
}

/// Ordered list of failures with stable ids
#[derive(Debug, Default)]
pub struct FailureLog {
    next_id: u64,
    items: Vec<FailedItem>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure and returns the stored item
    pub fn record(
        &mut self,
        url: impl Into<String>,
        kind: FailureKind,
        detail: impl Into<String>,
        title: Option<String>,
    ) -> FailedItem {
        self.next_id += 1;
        let item = FailedItem {
            id: self.next_id,
            url: url.into(),
            kind,
            detail: detail.into(),
            title,
        };
        self.items.push(item.clone());
        item
    }

    pub fn get(&self, id: u64) -> Option<&FailedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Option<FailedItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn items(&self) -> &[FailedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Renders `url | reason` lines; `None` when nothing failed
    pub fn manifest(&self) -> Option<String> {
        if self.items.is_empty() {
            return None;
        }
        let mut text = String::new();
        for item in &self.items {
            text.push_str(&item.to_string());
            text.push('\n');
        }
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_assigns_sequential_ids() {
        let mut log = FailureLog::new();
        let a = log.record("https://e.com/a", FailureKind::Discover, "timeout", None);
        let b = log.record("https://e.com/b", FailureKind::PageFetch, "http-500", None);
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_reason_tags() {
        let mut log = FailureLog::new();
        let item = log.record(
            "https://e.com/img.png",
            FailureKind::ImageDownload,
            "http-403",
            None,
        );
        assert_eq!(item.reason(), "image-download-fail:http-403");
        assert_eq!(item.to_string(), "https://e.com/img.png | image-download-fail:http-403");
    }

    #[test]
    fn test_remove_keeps_other_ids() {
        let mut log = FailureLog::new();
        log.record("a", FailureKind::Markdown, "x", None);
        let b = log.record("b", FailureKind::Markdown, "y", None);
        log.remove(1).unwrap();
        assert_eq!(log.get(b.id).unwrap().url, "b");
        assert!(log.remove(1).is_none());

        let c = log.record("c", FailureKind::Retry, "z", None);
        assert_eq!(c.id, 3);
    }

    #[test]
    fn test_manifest() {
        let mut log = FailureLog::new();
        assert!(log.manifest().is_none());
        log.record("https://e.com/a", FailureKind::PageFetch, "timeout", None);
        log.record("https://e.com/b", FailureKind::Markdown, "boom", None);
        assert_eq!(
            log.manifest().unwrap(),
            "https://e.com/a | page-fetch-fail:timeout\nhttps://e.com/b | markdown-fail:boom\n"
        );
    }
}
