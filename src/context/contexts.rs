use std::fmt;
use std::sync::Arc;
use tracing::trace;
use crate::core::cancel::Checkpoint;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{ContextSize, DocId, Hit};
use crate::index::CorpusIndex;
use crate::index::forward::AnnotationForwardIndex;

/// Context array slot holding the hit start (relative to the snippet start)
pub const HIT_START_INDEX: usize = 0;
/// Slot holding the start of the right context
pub const RIGHT_START_INDEX: usize = 1;
/// Slot holding the number of tokens per annotation
pub const LENGTH_INDEX: usize = 2;
pub const BOOKKEEPING_INTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPart {
    Before,
    Match,
    After,
    Whole,
}

/// Context arrays for a list of hits, aligned with that list.
///
/// Layout per hit: `[hit_start, right_start, length, tokens(annotation 0)..., tokens(annotation 1)...]`.
pub struct Contexts {
    size: ContextSize,
    annotations: Vec<Arc<dyn AnnotationForwardIndex>>,
    arrays: Vec<Vec<u32>>,
}

impl fmt::Debug for Contexts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Contexts")
            .field("size", &self.size)
            .field("annotations", &self.annotations.len())
            .field("hits", &self.arrays.len())
            .finish()
    }
}

impl Contexts {
    pub fn size(&self) -> ContextSize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    pub fn forward_index(&self, annotation: usize) -> &Arc<dyn AnnotationForwardIndex> {
        &self.annotations[annotation]
    }

    /// Raw context array of hit `i`
    pub fn array(&self, i: usize) -> &[u32] {
        &self.arrays[i]
    }

    pub fn length(&self, i: usize) -> usize {
        self.arrays[i].get(LENGTH_INDEX).copied().unwrap_or(0) as usize
    }

    pub fn hit_start(&self, i: usize) -> usize {
        let start = self.arrays[i].get(HIT_START_INDEX).copied().unwrap_or(0) as usize;
        start.min(self.length(i))
    }

    pub fn right_start(&self, i: usize) -> usize {
        let right = self.arrays[i].get(RIGHT_START_INDEX).copied().unwrap_or(0) as usize;
        right.min(self.length(i)).max(self.hit_start(i))
    }

    /// Token ids of one annotation for one part of the snippet
    pub fn part(&self, i: usize, annotation: usize, part: ContextPart) -> &[u32] {
        let length = self.length(i);
        let offset = BOOKKEEPING_INTS + annotation * length;
        let tokens = &self.arrays[i][offset..offset + length];
        match part {
            ContextPart::Before => &tokens[..self.hit_start(i)],
            ContextPart::Match => &tokens[self.hit_start(i)..self.right_start(i)],
            ContextPart::After => &tokens[self.right_start(i)..],
            ContextPart::Whole => tokens,
        }
    }

    /// Same as `part`, resolved to strings
    pub fn words(&self, i: usize, annotation: usize, part: ContextPart) -> Vec<String> {
        let terms = self.annotations[annotation].terms();
        self.part(i, annotation, part)
            .iter()
            .map(|id| terms.get(*id).unwrap_or("").to_string())
            .collect()
    }
}

/// Fetches context arrays from the forward index, one batched lookup per
/// document per annotation.
pub struct ContextExtractor<'a> {
    index: &'a dyn CorpusIndex,
    checkpoint: &'a Checkpoint,
}

impl<'a> ContextExtractor<'a> {
    pub fn new(index: &'a dyn CorpusIndex, checkpoint: &'a Checkpoint) -> Self {
        ContextExtractor { index, checkpoint }
    }

    pub fn extract(&self, hits: &[Hit], size: ContextSize, annotations: &[&str]) -> Result<Contexts> {
        if annotations.is_empty() {
            return Err(Error::invalid_argument("no annotations requested for context"));
        }
        let forward = annotations.iter()
            .map(|name| {
                self.index
                    .forward_index(name)
                    .ok_or_else(|| Error::invalid_argument(format!("no forward index for annotation '{}'", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        // Group by document; a stable sort keeps hit order within a document
        let mut order: Vec<usize> = (0..hits.len()).collect();
        if !hits.windows(2).all(|w| w[0].doc() <= w[1].doc()) {
            order.sort_by_key(|&i| hits[i].doc());
        }

        let mut arrays: Vec<Vec<u32>> = vec![Vec::new(); hits.len()];
        let mut docs = 0usize;
        for run in order.chunk_by(|&a, &b| hits[a].doc() == hits[b].doc()) {
            self.checkpoint.check()?;
            docs += 1;

            let doc = hits[run[0]].doc();
            let (starts, ends): (Vec<u32>, Vec<u32>) = run.iter()
                .map(|&i| size.snippet_bounds(hits[i].start(), hits[i].end()))
                .unzip();

            for (n, fi) in forward.iter().enumerate() {
                let parts = fi.retrieve_parts(doc, &starts, &ends)?;
                expect_len("forward index snippets", doc, parts.len(), run.len())?;
                for ((&i, mut words), &first) in run.iter().zip(parts).zip(&starts) {
                    let array = &mut arrays[i];
                    if n == 0 {
                        let hit = &hits[i];
                        array.reserve(BOOKKEEPING_INTS + words.len() * forward.len());
                        array.push(hit.start() - first);
                        array.push(hit.end().saturating_sub(first));
                        array.push(words.len() as u32);
                    } else {
                        // Annotations of one field have equal lengths; guard anyway
                        words.resize(array[LENGTH_INDEX] as usize, 0);
                    }
                    array.extend(words);
                }
            }
        }
        trace!(hits = hits.len(), docs, annotations = forward.len(), "extracted contexts");

        Ok(Contexts {
            size,
            annotations: forward,
            arrays,
        })
    }
}

/// Collaborators must answer every position they were asked about
pub(crate) fn expect_len(what: &str, doc: DocId, got: usize, wanted: usize) -> Result<()> {
    if got == wanted {
        return Ok(());
    }
    Err(Error::new(
        ErrorKind::Internal,
        format!("{} for document {}: expected {} entries, got {}", what, doc, wanted, got),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_collaborator_answer_is_an_error() {
        assert!(expect_len("snippets", 3, 2, 2).is_ok());
        let err = expect_len("snippets", 3, 1, 2).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.context.contains("document 3"));
    }
}
