use std::fmt;
use std::sync::Arc;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::debug;
use crate::context::concordances::{ConcordanceType, Concordances};
use crate::context::contexts::{ContextExtractor, Contexts};
use crate::context::kwic::Kwics;
use crate::core::captures::CapturedGroups;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::query_info::QueryInfo;
use crate::core::stats::{MaxStats, ResultsStats, WindowStats};
use crate::core::types::{ContextSize, DocId, Hit, Span};
use crate::search::cache::{KwicsCache, KwicsCacheStats};
use crate::search::sample::SampleParameters;
use crate::search::state::{count_docs, HitsState, HitsWanted};

/// Anything that can grow a hit list on demand.
///
/// Published state only ever grows: once `hits()[i]` is visible it never
/// changes, so readers may index into it between calls.
pub trait HitSource: Send + Sync {
    /// Block until `wanted` hits are visible, the source is exhausted, or a
    /// limit or interruption stops it.
    fn ensure_results_read(&self, wanted: HitsWanted) -> Result<()>;

    fn state(&self) -> RwLockReadGuard<'_, HitsState>;

    fn query_info(&self) -> &Arc<QueryInfo>;
}

/// Already materialized hits: windows, samples, sorted and per-document lists
pub struct FixedHits {
    query_info: Arc<QueryInfo>,
    state: RwLock<HitsState>,
}

impl FixedHits {
    pub fn new(query_info: Arc<QueryInfo>, state: HitsState) -> Self {
        FixedHits {
            query_info,
            state: RwLock::new(state),
        }
    }
}

impl HitSource for FixedHits {
    fn ensure_results_read(&self, _wanted: HitsWanted) -> Result<()> {
        Ok(())
    }

    fn state(&self) -> RwLockReadGuard<'_, HitsState> {
        self.state.read()
    }

    fn query_info(&self) -> &Arc<QueryInfo> {
        &self.query_info
    }
}

/// Cheap, cloneable handle to a (possibly still growing) hit list.
///
/// Every accessor that needs more hits than are visible pulls them from the
/// source first, so `get(i)` and `size()` always see a consistent prefix.
#[derive(Clone)]
pub struct Hits {
    id: u64,
    source: Arc<dyn HitSource>,
    kwics: Arc<KwicsCache>,
    window_stats: Option<WindowStats>,
    sample_parameters: Option<SampleParameters>,
}

impl Hits {
    pub fn from_source(source: Arc<dyn HitSource>) -> Self {
        let query_info = source.query_info();
        let id = query_info.next_results_id();
        let kwics = Arc::new(KwicsCache::new(query_info.config().kwic_cache_size));
        Hits {
            id,
            source,
            kwics,
            window_stats: None,
            sample_parameters: None,
        }
    }

    pub(crate) fn fixed(query_info: &Arc<QueryInfo>, state: HitsState) -> Self {
        Hits::from_source(Arc::new(FixedHits::new(query_info.clone(), state)))
    }

    /// Wrap an explicit hit list; counters equal the list itself
    pub fn from_list(query_info: &Arc<QueryInfo>, hits: Vec<Hit>, captures: Option<CapturedGroups>) -> Self {
        let docs = count_docs(&hits);
        let size = hits.len();
        Hits::fixed(query_info, HitsState::fixed(hits, captures, size, docs, MaxStats::NOT_EXCEEDED))
    }

    pub(crate) fn with_window_stats(mut self, stats: WindowStats) -> Self {
        self.window_stats = Some(stats);
        self
    }

    pub(crate) fn with_sample_parameters(mut self, parameters: SampleParameters) -> Self {
        self.sample_parameters = Some(parameters);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn query_info(&self) -> &Arc<QueryInfo> {
        self.source.query_info()
    }

    /// Published state; hold the guard briefly, collectors need the write side
    pub fn state(&self) -> RwLockReadGuard<'_, HitsState> {
        self.source.state()
    }

    pub fn ensure_results_read(&self, n: usize) -> Result<()> {
        self.source.ensure_results_read(HitsWanted::AtLeast(n))
    }

    pub fn ensure_all_read(&self) -> Result<()> {
        self.source.ensure_results_read(HitsWanted::All)
    }

    /// Number of materialized hits after reading everything
    pub fn size(&self) -> Result<usize> {
        self.ensure_all_read()?;
        Ok(self.state().hits.len())
    }

    pub fn size_so_far(&self) -> usize {
        self.state().hits.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(!self.hits_processed_at_least(1)?)
    }

    pub fn hits_processed_at_least(&self, n: usize) -> Result<bool> {
        self.ensure_results_read(n)?;
        Ok(self.state().hits.len() >= n)
    }

    pub fn hits_counted_total(&self) -> Result<usize> {
        self.ensure_all_read()?;
        Ok(self.state().hits_counted)
    }

    pub fn hits_counted_so_far(&self) -> usize {
        self.state().hits_counted
    }

    pub fn docs_processed_total(&self) -> Result<usize> {
        self.ensure_all_read()?;
        Ok(self.state().docs_retrieved)
    }

    pub fn docs_processed_so_far(&self) -> usize {
        self.state().docs_retrieved
    }

    pub fn docs_counted_total(&self) -> Result<usize> {
        self.ensure_all_read()?;
        Ok(self.state().docs_counted)
    }

    pub fn docs_counted_so_far(&self) -> usize {
        self.state().docs_counted
    }

    pub fn done_processing_and_counting(&self) -> bool {
        self.state().done_processing_and_counting()
    }

    pub fn max_stats(&self) -> MaxStats {
        self.state().max_stats
    }

    /// Counters as they are right now
    pub fn hits_stats(&self) -> ResultsStats {
        let state = self.state();
        ResultsStats {
            hits_processed: state.hits.len(),
            hits_counted: state.hits_counted,
            docs_processed: state.docs_retrieved,
            docs_counted: state.docs_counted,
            done: state.done_processing_and_counting(),
            max_stats: state.max_stats,
        }
    }

    pub fn window_stats(&self) -> Option<WindowStats> {
        self.window_stats
    }

    pub fn sample_parameters(&self) -> Option<SampleParameters> {
        self.sample_parameters
    }

    /// Hit at `index`, reading up to it if needed
    pub fn get(&self, index: usize) -> Result<Option<Hit>> {
        self.ensure_results_read(index + 1)?;
        Ok(self.state().hits.get(index).copied())
    }

    pub fn iter(&self) -> HitsIter<'_> {
        HitsIter { hits: self, next: 0, failed: false }
    }

    /// Hits visible right now, without reading further
    pub fn hits_snapshot(&self) -> Vec<Hit> {
        self.state().hits.clone()
    }

    pub fn all_hits(&self) -> Result<Vec<Hit>> {
        self.ensure_all_read()?;
        Ok(self.hits_snapshot())
    }

    pub fn has_captures(&self) -> bool {
        self.state().captures.is_some()
    }

    pub fn capture_names(&self) -> Option<Arc<[String]>> {
        self.state().captures.as_ref().map(|c| c.shared_names())
    }

    pub fn captures_of(&self, hit: &Hit) -> Option<Arc<[Option<Span>]>> {
        self.state().captures.as_ref().and_then(|c| c.get_shared(hit))
    }

    /// Captures restricted to the given hits, sharing slot arrays
    pub(crate) fn captures_for(&self, hits: &[Hit]) -> Option<CapturedGroups> {
        self.state().captures.as_ref().map(|c| c.subset(hits))
    }

    /// All hits in one document, in result order
    pub fn hits_in_doc(&self, doc: DocId) -> Result<Hits> {
        self.ensure_all_read()?;
        let selected: Vec<Hit> = self.state().hits.iter().filter(|h| h.doc() == doc).copied().collect();
        let captures = self.captures_for(&selected);
        Ok(Hits::from_list(self.query_info(), selected, captures))
    }

    /// Forward-index context of every hit, aligned with the hit list
    pub fn contexts(&self, size: ContextSize, annotations: &[&str]) -> Result<Contexts> {
        let hits = self.all_hits()?;
        let query_info = self.query_info();
        ContextExtractor::new(query_info.index().as_ref(), query_info.checkpoint())
            .extract(&hits, size, annotations)
    }

    /// Keyword-in-context views of every hit, cached per context size
    pub fn kwics(&self, size: ContextSize) -> Result<Arc<Kwics>> {
        let hits = self.all_hits()?;
        self.kwics.get_or_try_insert(size, || {
            let query_info = self.query_info();
            debug!(results = self.id, hits = hits.len(), before = size.before, after = size.after, "building kwics");
            Kwics::build(query_info.index().as_ref(), &hits, size, query_info.checkpoint())
        })
    }

    pub fn kwics_cache_stats(&self) -> KwicsCacheStats {
        self.kwics.stats()
    }

    pub fn concordances(&self, size: ContextSize, kind: ConcordanceType) -> Result<Concordances> {
        let query_info = self.query_info();
        let index = query_info.index();
        let main = index.field().main_annotation();
        let use_forward_index = kind == ConcordanceType::ForwardIndex && index.forward_index(main).is_some();
        if use_forward_index {
            let kwics = self.kwics(size)?;
            return Ok(Concordances::from_kwics(&kwics));
        }
        if index.content_store().is_none() {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("field '{}' has neither a forward index nor a content store", index.field().name()),
            ));
        }
        let hits = self.all_hits()?;
        Concordances::from_content_store(index.as_ref(), &hits, size, query_info.checkpoint())
    }
}

impl fmt::Debug for Hits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Hits")
            .field("id", &self.id)
            .field("hits", &state.hits.len())
            .field("counted", &state.hits_counted)
            .field("done", &state.done)
            .field("window_stats", &self.window_stats)
            .finish()
    }
}

/// Lazy iterator over a `Hits`; reads more from the source as it goes
pub struct HitsIter<'a> {
    hits: &'a Hits,
    next: usize,
    failed: bool,
}

impl Iterator for HitsIter<'_> {
    type Item = Result<Hit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.hits.get(self.next) {
            Ok(Some(hit)) => {
                self.next += 1;
                Some(Ok(hit))
            }
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
