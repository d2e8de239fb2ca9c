use crate::tokenizer::tokenize;
use std::collections::HashMap;

/// A document as held by the index: the raw fields plus the term statistics
/// derived from `title + " " + body` at construction time.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub url: String,
    pub title: String,
    pub body: String,
    /// term -> occurrences within title and body
    pub term_freqs: HashMap<String, u32>,
    /// total token count of title and body
    pub length: u32,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let body = body.into();
        let tokens = tokenize(&format!("{title} {body}"));
        let length = token_count(tokens.len());
        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        for term in tokens {
            *term_freqs.entry(term).or_insert(0) += 1;
        }
        Self { id: id.into(), url: url.into(), title, body, term_freqs, length }
    }

    /// Occurrences of `term` in this document, 0 if absent.
    pub fn tf(&self, term: &str) -> u32 {
        self.term_freqs.get(term).copied().unwrap_or(0)
    }

    /// Body cut to at most `limit` bytes.
    ///
    /// The cut lands on the byte limit unless that splits a UTF-8 sequence, in
    /// which case it moves back to the previous char boundary.
    pub fn preview(&self, limit: usize) -> &str {
        truncate_bytes(&self.body, limit)
    }
}

/// Token count as stored in `length`, saturating at `u32::MAX`.
fn token_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

pub(crate) fn truncate_bytes(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_title_and_body_terms() {
        let doc = Document::new("1", "https://example.com", "cat dog", "cat cat");
        assert_eq!(doc.length, 4);
        assert_eq!(doc.tf("cat"), 3);
        assert_eq!(doc.tf("dog"), 1);
        assert_eq!(doc.tf("bird"), 0);
    }

    #[test]
    fn title_and_body_do_not_merge_tokens() {
        let doc = Document::new("1", "", "foo", "bar");
        assert_eq!(doc.tf("foobar"), 0);
        assert_eq!(doc.length, 2);
    }

    #[test]
    fn empty_text_has_zero_length() {
        let doc = Document::new("1", "", "", "  ... ");
        assert_eq!(doc.length, 0);
        assert!(doc.term_freqs.is_empty());
    }

    #[test]
    fn preview_cuts_at_byte_limit() {
        let body = "a".repeat(600);
        let doc = Document::new("1", "", "", body);
        assert_eq!(doc.preview(512).len(), 512);

        let short = Document::new("2", "", "", "short body");
        assert_eq!(short.preview(512), "short body");
    }

    #[test]
    fn preview_never_splits_a_char() {
        // 511 ASCII bytes followed by a 2-byte char straddling the limit.
        let body = format!("{}é tail", "a".repeat(511));
        assert_eq!(truncate_bytes(&body, 512).len(), 511);
        assert_eq!(truncate_bytes(&body, 513).len(), 513);
    }

    #[test]
    fn token_count_saturates() {
        assert_eq!(token_count(4), 4);
        assert_eq!(token_count(u32::MAX as usize), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(token_count(u32::MAX as usize + 5), u32::MAX);
    }
}
