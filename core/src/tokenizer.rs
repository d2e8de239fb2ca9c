use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SEPARATORS: Regex = Regex::new(r"[^a-z0-9]+").expect("valid regex");
}

/// Lowercase `text`, collapse every run of characters outside `[a-z0-9]` into a
/// single space and split on whitespace.
///
/// Term order follows the source text and repeated terms are kept, so the
/// result doubles as the term-frequency source for a document.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let normalized = SEPARATORS.replace_all(&lowered, " ");
    normalized.split_whitespace().map(str::to_string).collect()
}
