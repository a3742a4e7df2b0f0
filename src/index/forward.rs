use crate::core::error::Result;
use crate::core::types::DocId;

/// Token id to string lookup for one annotation
pub trait Terms: Send + Sync {
    fn get(&self, id: u32) -> Option<&str>;

    fn id_of(&self, term: &str) -> Option<u32>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-document token ids of one annotation
pub trait AnnotationForwardIndex: Send + Sync {
    fn annotation(&self) -> &str;

    fn terms(&self) -> &dyn Terms;

    fn doc_length(&self, doc: DocId) -> Result<u32>;

    /// Token ids for each `[starts[i], ends[i])`, batched for one document.
    ///
    /// Ends past the document length are clamped.
    fn retrieve_parts(&self, doc: DocId, starts: &[u32], ends: &[u32]) -> Result<Vec<Vec<u32>>>;
}
