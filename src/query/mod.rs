pub mod pattern;

use std::fmt;
use std::sync::Arc;
use crate::core::error::Result;
use crate::core::types::{DocId, Hit, Span};
use crate::index::SegmentInfo;

/// Capture-group names registered by the cursors of one query
#[derive(Debug, Clone, Default)]
pub struct HitQueryContext {
    names: Vec<String>,
}

impl HitQueryContext {
    pub fn new() -> Self {
        HitQueryContext::default()
    }

    /// Slot index for `name`, registering it on first use
    pub fn register(&mut self, name: &str) -> usize {
        match self.names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.names.push(name.to_string());
                self.names.len() - 1
            }
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn shared_names(&self) -> Arc<[String]> {
        self.names.clone().into()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Match iterator over one segment.
///
/// Documents are visited in ascending (segment-local) order and matches
/// within a document in ascending start order.
pub trait SegmentCursor: Send {
    /// Advance to the next document with at least one match
    fn next_doc(&mut self) -> Result<Option<u32>>;

    /// Advance to the next match in the current document
    fn next_start(&mut self) -> Result<Option<u32>>;

    fn doc(&self) -> u32;

    fn start(&self) -> u32;

    fn end(&self) -> u32;

    fn register_captures(&mut self, _context: &mut HitQueryContext) {}

    /// Fill the capture slots for the current match
    fn captured_groups(&self, _out: &mut [Option<Span>]) {}
}

/// Compiled query: term setup plus a cursor per segment
pub trait SpanWeight: Send + Sync {
    /// Terms this query will look up. Fails with `QueryTooBroad` when a
    /// wildcard expands past `max_terms`.
    fn extract_terms(&self, max_terms: usize) -> Result<Vec<String>>;

    /// `None` when the segment cannot contain matches
    fn cursor(&self, segment: &SegmentInfo) -> Result<Option<Box<dyn SegmentCursor>>>;
}

/// Transient view of the cursor's current match.
///
/// Borrows the cursor, so it is only valid until the next advance;
/// `to_hit` materializes it.
pub struct EphemeralHit<'c> {
    cursor: &'c dyn SegmentCursor,
    doc_base: DocId,
}

impl<'c> EphemeralHit<'c> {
    pub fn new(cursor: &'c dyn SegmentCursor, doc_base: DocId) -> Self {
        EphemeralHit { cursor, doc_base }
    }

    pub fn doc(&self) -> DocId {
        self.doc_base + self.cursor.doc()
    }

    pub fn start(&self) -> u32 {
        self.cursor.start()
    }

    pub fn end(&self) -> u32 {
        self.cursor.end()
    }

    pub fn to_hit(&self) -> Hit {
        Hit::new(self.doc(), self.start(), self.end())
    }
}

impl PartialEq<Hit> for EphemeralHit<'_> {
    fn eq(&self, other: &Hit) -> bool {
        self.doc() == other.doc() && self.start() == other.start() && self.end() == other.end()
    }
}

impl fmt::Debug for EphemeralHit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EphemeralHit({}, {}-{})", self.doc(), self.start(), self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cursor parked on a single match at doc 3, tokens 7..9
    struct ParkedCursor;

    impl SegmentCursor for ParkedCursor {
        fn next_doc(&mut self) -> Result<Option<u32>> {
            Ok(Some(3))
        }

        fn next_start(&mut self) -> Result<Option<u32>> {
            Ok(Some(7))
        }

        fn doc(&self) -> u32 {
            3
        }

        fn start(&self) -> u32 {
            7
        }

        fn end(&self) -> u32 {
            9
        }
    }

    #[test]
    fn ephemeral_hit_equals_its_stored_copy() {
        let cursor = ParkedCursor;
        let ephemeral = EphemeralHit::new(&cursor, 100);
        let stored = ephemeral.to_hit();

        assert_eq!(stored, Hit::new(103, 7, 9));
        assert!(ephemeral == stored);
        assert!(ephemeral == Hit::new(103, 7, 9));
        assert!(ephemeral != Hit::new(103, 7, 10));
        assert!(ephemeral != Hit::new(3, 7, 9));
        assert_eq!(format!("{:?}", ephemeral), "EphemeralHit(103, 7-9)");
    }

    #[test]
    fn capture_names_register_once() {
        let mut context = HitQueryContext::new();
        assert_eq!(context.register("subject"), 0);
        assert_eq!(context.register("object"), 1);
        assert_eq!(context.register("subject"), 0);
        assert_eq!(&*context.shared_names(), &["subject".to_string(), "object".to_string()][..]);
    }
}
