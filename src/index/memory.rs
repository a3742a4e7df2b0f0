use std::collections::HashMap;
use std::sync::Arc;
use roaring::RoaringBitmap;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocId;
use crate::index::{AnnotatedField, CorpusIndex, SegmentInfo};
use crate::index::content::ContentStore;
use crate::index::forward::{AnnotationForwardIndex, Terms};
use crate::index::terms::TermDictionary;

pub const WORD: &str = "word";
pub const LOWER: &str = "lower";
pub const PUNCT: &str = "punct";

/// Corpus held entirely in RAM.
///
/// Text is split on Unicode word boundaries; every word gets a `word`,
/// `lower` and `punct` (whitespace/punctuation preceding it) annotation.
pub struct MemoryIndex {
    field: AnnotatedField,
    segments: Vec<SegmentInfo>,
    annotations: HashMap<String, Arc<MemoryForwardIndex>>,
    content: Arc<MemoryContentStore>,
    expose_forward_index: bool,
}

impl MemoryIndex {
    pub fn builder(field: &str) -> MemoryIndexBuilder {
        MemoryIndexBuilder::new(field)
    }

    pub fn doc_count(&self) -> usize {
        self.content.texts.len()
    }

    /// Token ids of an annotation, available even when the forward index is hidden
    pub(crate) fn annotation_data(&self, annotation: &str) -> Option<&Arc<MemoryForwardIndex>> {
        self.annotations.get(annotation)
    }
}

impl CorpusIndex for MemoryIndex {
    fn segments(&self) -> &[SegmentInfo] {
        &self.segments
    }

    fn field(&self) -> &AnnotatedField {
        &self.field
    }

    fn forward_index(&self, annotation: &str) -> Option<Arc<dyn AnnotationForwardIndex>> {
        if !self.expose_forward_index {
            return None;
        }
        self.annotations
            .get(annotation)
            .map(|fi| fi.clone() as Arc<dyn AnnotationForwardIndex>)
    }

    fn content_store(&self) -> Option<Arc<dyn ContentStore>> {
        Some(self.content.clone())
    }
}

/// Forward index of one annotation over all documents
pub struct MemoryForwardIndex {
    annotation: String,
    terms: TermDictionary,
    docs: Vec<Vec<u32>>,
}

impl MemoryForwardIndex {
    pub(crate) fn dictionary(&self) -> &TermDictionary {
        &self.terms
    }

    pub(crate) fn tokens(&self, doc: DocId) -> &[u32] {
        self.docs.get(doc as usize).map(|d| d.as_slice()).unwrap_or(&[])
    }
}

impl AnnotationForwardIndex for MemoryForwardIndex {
    fn annotation(&self) -> &str {
        &self.annotation
    }

    fn terms(&self) -> &dyn Terms {
        &self.terms
    }

    fn doc_length(&self, doc: DocId) -> Result<u32> {
        self.docs
            .get(doc as usize)
            .map(|d| d.len() as u32)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("document {} not in forward index", doc)))
    }

    fn retrieve_parts(&self, doc: DocId, starts: &[u32], ends: &[u32]) -> Result<Vec<Vec<u32>>> {
        if starts.len() != ends.len() {
            return Err(Error::invalid_argument("starts and ends differ in length"));
        }
        let tokens = self.docs
            .get(doc as usize)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("document {} not in forward index", doc)))?;
        let len = tokens.len();

        Ok(starts.iter()
            .zip(ends)
            .map(|(&start, &end)| {
                let end = (end as usize).min(len);
                let start = (start as usize).min(end);
                tokens[start..end].to_vec()
            })
            .collect())
    }
}

/// Original texts with byte offsets of every token
pub struct MemoryContentStore {
    texts: Vec<String>,
    token_starts: Vec<Vec<usize>>,
    token_ends: Vec<Vec<usize>>,
}

impl MemoryContentStore {
    fn doc_offsets(&self, doc: DocId) -> Result<(&str, &[usize], &[usize])> {
        let index = doc as usize;
        match (self.texts.get(index), self.token_starts.get(index), self.token_ends.get(index)) {
            (Some(text), Some(starts), Some(ends)) => Ok((text, starts, ends)),
            _ => Err(Error::new(ErrorKind::NotFound, format!("document {} not in content store", doc))),
        }
    }
}

impl ContentStore for MemoryContentStore {
    fn token_char_starts(&self, doc: DocId, positions: &[u32]) -> Result<Vec<usize>> {
        let (text, starts, _) = self.doc_offsets(doc)?;
        Ok(positions.iter()
            .map(|&p| starts.get(p as usize).copied().unwrap_or(text.len()))
            .collect())
    }

    fn token_char_ends(&self, doc: DocId, positions: &[u32]) -> Result<Vec<usize>> {
        let (text, _, ends) = self.doc_offsets(doc)?;
        Ok(positions.iter()
            .map(|&p| ends.get(p as usize).copied().unwrap_or(text.len()))
            .collect())
    }

    fn retrieve_parts(&self, doc: DocId, starts: &[usize], ends: &[usize]) -> Result<Vec<String>> {
        let (text, _, _) = self.doc_offsets(doc)?;
        Ok(starts.iter()
            .zip(ends)
            .map(|(&start, &end)| {
                let end = end.min(text.len());
                text.get(start.min(end)..end).unwrap_or("").to_string()
            })
            .collect())
    }
}

struct PendingDoc {
    text: String,
    words: Vec<String>,
    puncts: Vec<String>,
    starts: Vec<usize>,
    ends: Vec<usize>,
}

impl PendingDoc {
    fn tokenize(text: &str) -> Self {
        let mut doc = PendingDoc {
            text: text.to_string(),
            words: Vec::new(),
            puncts: Vec::new(),
            starts: Vec::new(),
            ends: Vec::new(),
        };
        let mut pending_punct = String::new();

        for (offset, segment) in text.split_word_bound_indices() {
            if segment.chars().any(|c| c.is_alphanumeric()) {
                doc.puncts.push(std::mem::take(&mut pending_punct));
                doc.words.push(segment.to_string());
                doc.starts.push(offset);
                doc.ends.push(offset + segment.len());
            } else if segment.chars().all(char::is_whitespace) {
                // Collapse runs of whitespace to one space
                if !pending_punct.ends_with(' ') {
                    pending_punct.push(' ');
                }
            } else {
                pending_punct.push_str(segment);
            }
        }
        doc
    }
}

/// Builds a `MemoryIndex`; documents get consecutive ids from 0
pub struct MemoryIndexBuilder {
    field: String,
    docs: Vec<PendingDoc>,
    segment_starts: Vec<usize>,
    deleted: Vec<DocId>,
    expose_forward_index: bool,
}

impl MemoryIndexBuilder {
    pub fn new(field: &str) -> Self {
        MemoryIndexBuilder {
            field: field.to_string(),
            docs: Vec::new(),
            segment_starts: vec![0],
            deleted: Vec::new(),
            expose_forward_index: true,
        }
    }

    pub fn add_document(mut self, text: &str) -> Self {
        self.docs.push(PendingDoc::tokenize(text));
        self
    }

    pub fn add_documents<'a, I>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for text in texts {
            self.docs.push(PendingDoc::tokenize(text));
        }
        self
    }

    /// Following documents go into a new segment
    pub fn new_segment(mut self) -> Self {
        let next = self.docs.len();
        if self.segment_starts.last() != Some(&next) {
            self.segment_starts.push(next);
        }
        self
    }

    pub fn delete(mut self, doc: DocId) -> Self {
        self.deleted.push(doc);
        self
    }

    /// Hide the forward index so concordances come from the content store
    pub fn without_forward_index(mut self) -> Self {
        self.expose_forward_index = false;
        self
    }

    pub fn build(self) -> Result<Arc<MemoryIndex>> {
        let doc_total = self.docs.len();

        let mut segments = Vec::new();
        let mut bounds = self.segment_starts.clone();
        bounds.push(doc_total);
        for (ord, pair) in bounds.windows(2).filter(|w| w[1] > w[0]).enumerate() {
            let (first, end) = (pair[0], pair[1]);
            let mut segment = SegmentInfo::new(ord, first as DocId, (end - first) as u32);
            let mut deleted = RoaringBitmap::new();
            for &doc in &self.deleted {
                let doc = doc as usize;
                if doc >= first && doc < end {
                    deleted.insert((doc - first) as u32);
                }
            }
            if !deleted.is_empty() {
                segment.deleted = Some(Arc::new(deleted));
            }
            segments.push(segment);
        }

        let mut annotations = HashMap::new();
        let word = build_annotation(WORD, &self.docs, |d| d.words.clone())?;
        let lower = build_annotation(LOWER, &self.docs, |d| d.words.iter().map(|w| w.to_lowercase()).collect())?;
        let punct = build_annotation(PUNCT, &self.docs, |d| d.puncts.clone())?;
        annotations.insert(WORD.to_string(), Arc::new(word));
        annotations.insert(LOWER.to_string(), Arc::new(lower));
        annotations.insert(PUNCT.to_string(), Arc::new(punct));

        let mut texts = Vec::with_capacity(doc_total);
        let mut token_starts = Vec::with_capacity(doc_total);
        let mut token_ends = Vec::with_capacity(doc_total);
        for doc in self.docs {
            texts.push(doc.text);
            token_starts.push(doc.starts);
            token_ends.push(doc.ends);
        }

        debug!(field = %self.field, docs = doc_total, segments = segments.len(), "built in-memory index");

        Ok(Arc::new(MemoryIndex {
            field: AnnotatedField::new(
                &self.field,
                WORD,
                Some(PUNCT),
                vec![WORD.to_string(), LOWER.to_string(), PUNCT.to_string()],
            ),
            segments,
            annotations,
            content: Arc::new(MemoryContentStore { texts, token_starts, token_ends }),
            expose_forward_index: self.expose_forward_index,
        }))
    }
}

fn build_annotation<F>(name: &str, docs: &[PendingDoc], values: F) -> Result<MemoryForwardIndex>
where
    F: Fn(&PendingDoc) -> Vec<String>,
{
    let per_doc: Vec<Vec<String>> = docs.iter().map(values).collect();
    let terms = TermDictionary::build(per_doc.iter().flatten().cloned())?;
    let docs = per_doc.iter()
        .map(|tokens| {
            tokens.iter()
                .map(|t| terms.id_of(t).unwrap_or(0))
                .collect()
        })
        .collect();
    Ok(MemoryForwardIndex {
        annotation: name.to_string(),
        terms,
        docs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_words_and_punctuation() {
        let doc = PendingDoc::tokenize("Hello, world!  Bye");
        assert_eq!(doc.words, vec!["Hello", "world", "Bye"]);
        assert_eq!(doc.puncts, vec!["", ", ", "! "]);
        assert_eq!(&doc.text[doc.starts[1]..doc.ends[1]], "world");
    }

    #[test]
    fn segments_and_deletions() {
        let index = MemoryIndex::builder("contents")
            .add_documents(["a b", "c d"])
            .new_segment()
            .add_document("e f")
            .delete(2)
            .build()
            .unwrap();

        let segments = index.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].doc_base, 2);
        assert!(!segments[1].is_live(0));
        assert!(segments[0].is_live(1));
    }

    #[test]
    fn forward_index_clamps_range_end() {
        let index = MemoryIndex::builder("contents")
            .add_document("one two three")
            .build()
            .unwrap();
        let fi = index.forward_index(WORD).unwrap();
        let parts = fi.retrieve_parts(0, &[1, 0], &[10, 1]).unwrap();
        assert_eq!(parts[0].len(), 2);
        assert_eq!(fi.terms().get(parts[1][0]), Some("one"));
    }

    #[test]
    fn hidden_forward_index() {
        let index = MemoryIndex::builder("contents")
            .add_document("x")
            .without_forward_index()
            .build()
            .unwrap();
        assert!(index.forward_index(WORD).is_none());
        assert!(index.content_store().is_some());
    }
}
