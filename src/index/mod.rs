pub mod terms;
pub mod forward;
pub mod content;
pub mod memory;

use std::sync::Arc;
use roaring::RoaringBitmap;
use crate::core::types::DocId;
use crate::index::content::{ContentStore, Highlighter, XmlEscapingHighlighter};
use crate::index::forward::AnnotationForwardIndex;

/// One index segment as seen by the collectors
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    pub ord: usize,
    pub doc_base: DocId,
    pub doc_count: u32,
    /// Segment-local ids of deleted documents
    pub deleted: Option<Arc<RoaringBitmap>>,
}

impl SegmentInfo {
    pub fn new(ord: usize, doc_base: DocId, doc_count: u32) -> Self {
        SegmentInfo { ord, doc_base, doc_count, deleted: None }
    }

    pub fn is_live(&self, local_doc: u32) -> bool {
        match &self.deleted {
            Some(deleted) => !deleted.contains(local_doc),
            None => true,
        }
    }

    pub fn global_doc(&self, local_doc: u32) -> DocId {
        self.doc_base + local_doc
    }

    pub fn live_doc_count(&self) -> u64 {
        let deleted = self.deleted.as_ref().map(|d| d.len()).unwrap_or(0);
        (self.doc_count as u64).saturating_sub(deleted)
    }
}

/// Annotated (token-level) field: word form plus parallel annotations
#[derive(Debug, Clone)]
pub struct AnnotatedField {
    name: String,
    main_annotation: String,
    punct_annotation: Option<String>,
    annotations: Vec<String>,
}

impl AnnotatedField {
    pub fn new(name: &str, main_annotation: &str, punct_annotation: Option<&str>, annotations: Vec<String>) -> Self {
        AnnotatedField {
            name: name.to_string(),
            main_annotation: main_annotation.to_string(),
            punct_annotation: punct_annotation.map(|p| p.to_string()),
            annotations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn main_annotation(&self) -> &str {
        &self.main_annotation
    }

    pub fn punct_annotation(&self) -> Option<&str> {
        self.punct_annotation.as_deref()
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations.iter().any(|a| a == name)
    }
}

/// Read side of a corpus index consumed by the result engine
pub trait CorpusIndex: Send + Sync {
    fn segments(&self) -> &[SegmentInfo];

    fn field(&self) -> &AnnotatedField;

    /// Forward index for an annotation, if one was built
    fn forward_index(&self, annotation: &str) -> Option<Arc<dyn AnnotationForwardIndex>>;

    fn content_store(&self) -> Option<Arc<dyn ContentStore>>;

    fn highlighter(&self) -> Arc<dyn Highlighter> {
        Arc::new(XmlEscapingHighlighter)
    }
}
