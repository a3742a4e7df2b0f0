use std::collections::HashMap;
use tracing::trace;
use crate::context::contexts::expect_len;
use crate::context::kwic::{Concordance, Kwics};
use crate::core::cancel::Checkpoint;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{ContextSize, Hit};
use crate::index::CorpusIndex;

/// Where concordance text comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcordanceType {
    /// Rebuilt from forward-index tokens as `<w>` XML
    ForwardIndex,
    /// Cut from the original document and highlighted
    ContentStore,
}

/// Concordances for a list of hits, keyed by hit
#[derive(Debug, Clone)]
pub struct Concordances {
    size: ContextSize,
    kind: ConcordanceType,
    concordances: HashMap<Hit, Concordance>,
}

impl Concordances {
    pub fn from_kwics(kwics: &Kwics) -> Self {
        Concordances {
            size: kwics.size(),
            kind: ConcordanceType::ForwardIndex,
            concordances: kwics.iter().map(|(hit, kwic)| (*hit, kwic.to_concordance(true))).collect(),
        }
    }

    /// Character ranges of snippet and match come from the content store;
    /// the index's highlighter turns the three pieces into display fragments.
    pub fn from_content_store(
        index: &dyn CorpusIndex,
        hits: &[Hit],
        size: ContextSize,
        checkpoint: &Checkpoint,
    ) -> Result<Self> {
        let store = index.content_store().ok_or_else(|| {
            Error::new(ErrorKind::InvalidState, format!("field '{}' has no content store", index.field().name()))
        })?;
        let highlighter = index.highlighter();

        let mut sorted: Vec<Hit> = hits.to_vec();
        sorted.sort_by_key(|h| h.doc());
        let mut concordances = HashMap::with_capacity(hits.len());
        for run in sorted.chunk_by(|a, b| a.doc() == b.doc()) {
            checkpoint.check()?;
            let doc = run[0].doc();

            let mut start_positions = Vec::with_capacity(run.len() * 2);
            let mut end_positions = Vec::with_capacity(run.len() * 2);
            for hit in run {
                let (left, right) = size.snippet_bounds(hit.start(), hit.end());
                start_positions.push(left);
                start_positions.push(hit.start());
                // Last token of the match and of the snippet
                end_positions.push(hit.end().max(hit.start() + 1) - 1);
                end_positions.push(right.max(hit.end()).max(1) - 1);
            }
            let starts = store.token_char_starts(doc, &start_positions)?;
            expect_len("content store start offsets", doc, starts.len(), start_positions.len())?;
            let ends = store.token_char_ends(doc, &end_positions)?;
            expect_len("content store end offsets", doc, ends.len(), end_positions.len())?;

            let mut from = Vec::with_capacity(run.len() * 3);
            let mut to = Vec::with_capacity(run.len() * 3);
            for i in 0..run.len() {
                let (left_start, hit_start) = (starts[2 * i], starts[2 * i + 1]);
                let hit_end = if run[i].is_empty() { hit_start } else { ends[2 * i].max(hit_start) };
                let right_end = if right_extends(&run[i], size) { ends[2 * i + 1].max(hit_end) } else { hit_end };
                from.extend([left_start.min(hit_start), hit_start, hit_end]);
                to.extend([hit_start, hit_end, right_end]);
            }
            let parts = store.retrieve_parts(doc, &from, &to)?;
            expect_len("content store parts", doc, parts.len(), from.len())?;
            for (hit, piece) in run.iter().zip(parts.chunks_exact(3)) {
                let [left, matched, right] = highlighter.build_fragments(&piece[0], &piece[1], &piece[2]);
                concordances.insert(*hit, Concordance::new(left, matched, right));
            }
        }
        trace!(hits = hits.len(), "built content store concordances");

        Ok(Concordances {
            size,
            kind: ConcordanceType::ContentStore,
            concordances,
        })
    }

    pub fn size(&self) -> ContextSize {
        self.size
    }

    pub fn kind(&self) -> ConcordanceType {
        self.kind
    }

    pub fn get(&self, hit: &Hit) -> Option<&Concordance> {
        self.concordances.get(hit)
    }

    pub fn len(&self) -> usize {
        self.concordances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concordances.is_empty()
    }
}

/// Whether any token lies between the match and the snippet end
fn right_extends(hit: &Hit, size: ContextSize) -> bool {
    let (_, right) = size.snippet_bounds(hit.start(), hit.end());
    right > hit.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::core::types::DocId;
    use crate::index::{AnnotatedField, SegmentInfo};
    use crate::index::content::ContentStore;
    use crate::index::forward::AnnotationForwardIndex;
    use crate::index::memory::MemoryIndex;

    /// Content store that drops the last start offset it is asked for
    struct ShortStore(Arc<dyn ContentStore>);

    impl ContentStore for ShortStore {
        fn token_char_starts(&self, doc: DocId, positions: &[u32]) -> Result<Vec<usize>> {
            let mut starts = self.0.token_char_starts(doc, positions)?;
            starts.pop();
            Ok(starts)
        }

        fn token_char_ends(&self, doc: DocId, positions: &[u32]) -> Result<Vec<usize>> {
            self.0.token_char_ends(doc, positions)
        }

        fn retrieve_parts(&self, doc: DocId, starts: &[usize], ends: &[usize]) -> Result<Vec<String>> {
            self.0.retrieve_parts(doc, starts, ends)
        }
    }

    struct ShortStoreIndex(Arc<MemoryIndex>);

    impl CorpusIndex for ShortStoreIndex {
        fn segments(&self) -> &[SegmentInfo] {
            self.0.segments()
        }

        fn field(&self) -> &AnnotatedField {
            self.0.field()
        }

        fn forward_index(&self, annotation: &str) -> Option<Arc<dyn AnnotationForwardIndex>> {
            self.0.forward_index(annotation)
        }

        fn content_store(&self) -> Option<Arc<dyn ContentStore>> {
            self.0.content_store().map(|store| Arc::new(ShortStore(store)) as Arc<dyn ContentStore>)
        }
    }

    #[test]
    fn short_offset_list_is_an_error() {
        let index = MemoryIndex::builder("contents").add_document("one two three").build().unwrap();
        let hits = [Hit::new(0, 1, 2)];
        let size = ContextSize::symmetric(1);
        let checkpoint = Checkpoint::new();

        let good = Concordances::from_content_store(index.as_ref(), &hits, size, &checkpoint).unwrap();
        assert_eq!(good.get(&hits[0]).map(|c| c.hit.as_str()), Some("two"));

        let broken = ShortStoreIndex(index);
        let err = Concordances::from_content_store(&broken, &hits, size, &checkpoint).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }
}
