use quick_xml::escape::escape;
use crate::core::error::Result;
use crate::core::types::DocId;

/// Original document text with token-to-character mapping
pub trait ContentStore: Send + Sync {
    /// Character offset where each token position starts.
    /// Positions past the last token map to the end of the text.
    fn token_char_starts(&self, doc: DocId, positions: &[u32]) -> Result<Vec<usize>>;

    /// Character offset just after each token position
    fn token_char_ends(&self, doc: DocId, positions: &[u32]) -> Result<Vec<usize>>;

    /// Substrings `[starts[i], ends[i])` of the document text
    fn retrieve_parts(&self, doc: DocId, starts: &[usize], ends: &[usize]) -> Result<Vec<String>>;
}

/// Turns raw left/match/right content into well-formed display fragments
pub trait Highlighter: Send + Sync {
    fn build_fragments(&self, left: &str, hit: &str, right: &str) -> [String; 3];
}

/// Highlighter for plain-text content: escapes markup, leaves text as is
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlEscapingHighlighter;

impl Highlighter for XmlEscapingHighlighter {
    fn build_fragments(&self, left: &str, hit: &str, right: &str) -> [String; 3] {
        [left, hit, right].map(|part| escape(part).into_owned())
    }
}
