//! Text cleanup applied to item titles and descriptions.
use std::sync::OnceLock;

use regex::Regex;

pub const TRUNCATION_MARKER: &str = " [...]";

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static tag pattern"))
}

/// Removes anything that looks like a markup tag.
pub fn strip_markup(text: &str) -> String {
    tag_pattern().replace_all(text, "").into_owned()
}

/// Decodes named and numeric HTML entities (`&amp;`, `&aacute;`, `&#8220;`).
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Collapses every whitespace run (including non-breaking spaces) to one
/// space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Caps `text` at `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was cut.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((end, _)) => {
            let kept = text[..end].trim_end();
            format!("{kept}{TRUNCATION_MARKER}")
        }
    }
}

/// Key under which titles are compared for duplicate suppression.
pub fn title_key(title: &str) -> String {
    collapse_whitespace(title).to_lowercase()
}

/// Visible length of a description: markup removed, whitespace collapsed.
pub fn visible_chars(text: &str) -> usize {
    collapse_whitespace(&strip_markup(text)).chars().count()
}
