//! SUMMARY.md generation
//!
//! The archive's table of contents: one bullet per exported page, in path
//! order, linking to the page's Markdown file.

/// Formats a table of contents from `(title, path)` pairs
///
/// # Arguments
///
/// * `pages` - Exported page titles and their archive paths
///
/// # Returns
///
/// The SUMMARY.md text, sorted by path
pub fn format_summary<'a>(pages: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut entries: Vec<(&str, &str)> = pages.into_iter().collect();
    entries.sort_by(|a, b| a.1.cmp(b.1));

    let mut md = String::new();
    md.push_str("# Summary\n\n");
    for (title, path) in entries {
        md.push_str(&format!(
            "- [{}]({})\n",
            escape_link_text(title),
            encode_link_target(path)
        ));
    }
    md
}

fn escape_link_text(title: &str) -> String {
    title.replace('[', "\\[").replace(']', "\\]")
}

/// Spaces and parentheses would end a Markdown link target early
fn encode_link_target(path: &str) -> String {
    path.replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}
