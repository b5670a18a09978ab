//! HTML to Markdown conversion

use crate::ConvertError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Text-transform collaborator turning sanitized HTML into Markdown
pub trait MarkdownConverter: Send + Sync {
    fn convert(&self, html: &str) -> Result<String, ConvertError>;
}

/// Converter backed by the `html2md` crate
///
/// `html2md` can panic on pathological markup; panics are reported as
/// [`ConvertError`] so one bad page does not take the export down.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html2MdConverter;

impl MarkdownConverter for Html2MdConverter {
    fn convert(&self, html: &str) -> Result<String, ConvertError> {
        catch_unwind(AssertUnwindSafe(|| html2md::parse_html(html))).map_err(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "converter panicked".to_string());
            ConvertError(message)
        })
    }
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// YAML front matter carrying the page title and source URL
pub fn front_matter(title: &str, source: &str) -> String {
    format!(
        "---\ntitle: \"{}\"\nsource: \"{}\"\n---\n\n",
        escape_quoted(title),
        escape_quoted(source)
    )
}

/// Full Markdown document: front matter, body and a trailing newline
pub fn compose_document(title: &str, source: &str, markdown: &str) -> String {
    format!("{}{}\n", front_matter(title, source), markdown.trim())
}
