use serde::{Serialize, Deserialize};
use std::fmt;

/// Global document id (segment doc base + segment-local doc)
pub type DocId = u32;

/// A match: document plus token span `[start, end)`.
///
/// Field order gives the derived total order: doc, then start, then end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hit {
    doc: DocId,
    start: u32,
    end: u32,
}

impl Hit {
    pub fn new(doc: DocId, start: u32, end: u32) -> Self {
        Hit { doc, start, end }
    }

    pub fn doc(&self) -> DocId {
        self.doc
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Hit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "doc {}, {}-{}", self.doc, self.start, self.end)
    }
}

/// Sub-span of a hit, as captured by a named group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }
}

/// Words of context before and after a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextSize {
    pub before: u32,
    pub after: u32,
}

impl ContextSize {
    pub fn new(before: u32, after: u32) -> Self {
        ContextSize { before, after }
    }

    pub fn symmetric(words: u32) -> Self {
        ContextSize::new(words, words)
    }

    /// Snippet boundaries `[left, right)` for a hit.
    ///
    /// Left is clamped at zero, right is left for the forward index to clamp.
    pub fn snippet_bounds(&self, start: u32, end: u32) -> (u32, u32) {
        (start.saturating_sub(self.before), end.saturating_add(self.after))
    }
}

impl Default for ContextSize {
    fn default() -> Self {
        ContextSize::symmetric(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_order_by_doc_then_start_then_end() {
        let mut hits = vec![
            Hit::new(2, 0, 1),
            Hit::new(1, 5, 7),
            Hit::new(1, 5, 6),
            Hit::new(1, 2, 9),
        ];
        hits.sort();
        assert_eq!(hits, vec![
            Hit::new(1, 2, 9),
            Hit::new(1, 5, 6),
            Hit::new(1, 5, 7),
            Hit::new(2, 0, 1),
        ]);
    }

    #[test]
    fn snippet_left_bound_never_negative() {
        let size = ContextSize::symmetric(5);
        assert_eq!(size.snippet_bounds(0, 1), (0, 6));
        assert_eq!(size.snippet_bounds(3, 4), (0, 9));
        assert_eq!(size.snippet_bounds(10, 12), (5, 17));
    }

    #[test]
    fn large_context_keeps_requested_bounds() {
        assert_eq!(ContextSize::symmetric(60).snippet_bounds(100, 101), (40, 161));
        // long match: both sides keep their requested width
        assert_eq!(ContextSize::symmetric(5).snippet_bounds(100, 215), (95, 220));
    }
}
