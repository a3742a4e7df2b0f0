use std::sync::Arc;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::query_info::QueryInfo;
use crate::core::stats::{MaxStats, ResultsStats, WindowStats};
use crate::core::types::{DocId, Hit};
use crate::search::hits::Hits;
use crate::search::property::PropertyValue;
use crate::search::sample::{sample_indices, SampleParameters};
use crate::search::window::window_bounds;

/// What per-document results can be sorted or filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocProperty {
    DocId,
    HitCount,
}

impl DocProperty {
    pub fn value_of(self, result: &DocResult) -> PropertyValue {
        match self {
            DocProperty::DocId => PropertyValue::Int(result.doc as i64),
            DocProperty::HitCount => PropertyValue::Int(result.size as i64),
        }
    }
}

/// The hits of one document
#[derive(Debug, Clone)]
pub struct DocResult {
    doc: DocId,
    stored: Hits,
    size: usize,
}

impl DocResult {
    pub fn doc(&self) -> DocId {
        self.doc
    }

    pub fn stored_results(&self) -> &Hits {
        &self.stored
    }

    /// All hits in the document, stored or not
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Document whose hits are still coming in
#[derive(Debug)]
struct PartialDoc {
    doc: DocId,
    hits: Vec<Hit>,
    count: usize,
}

#[derive(Debug)]
struct DocsInner {
    results: Vec<Arc<DocResult>>,
    partial: Option<PartialDoc>,
    source_index: usize,
    most_hits_in_document: usize,
    sum_of_group_sizes: usize,
    finished: bool,
}

impl DocsInner {
    fn finished(results: Vec<Arc<DocResult>>) -> Self {
        let most_hits_in_document = results.iter().map(|r| r.size).max().unwrap_or(0);
        let sum_of_group_sizes = results.iter().map(|r| r.size).sum();
        DocsInner {
            results,
            partial: None,
            source_index: 0,
            most_hits_in_document,
            sum_of_group_sizes,
            finished: true,
        }
    }
}

/// Hits grouped per document, built lazily from a hit stream.
///
/// Assumes the source delivers each document's hits contiguously, which
/// holds for collector output and any doc-sorted list.
#[derive(Debug)]
pub struct DocResults {
    query_info: Arc<QueryInfo>,
    source: Option<Hits>,
    max_hits_per_doc: Option<usize>,
    inner: Mutex<DocsInner>,
    window_stats: Option<WindowStats>,
    sample_parameters: Option<SampleParameters>,
}

impl Hits {
    /// Per-document view of these hits.
    ///
    /// Each document stores at most `max_hits_per_doc` hits (`Some(0)` stores
    /// none, `None` stores all); sizes always count every hit.
    pub fn per_doc_results(&self, max_hits_per_doc: Option<usize>) -> DocResults {
        DocResults {
            query_info: self.query_info().clone(),
            source: Some(self.clone()),
            max_hits_per_doc,
            inner: Mutex::new(DocsInner {
                results: Vec::new(),
                partial: None,
                source_index: 0,
                most_hits_in_document: 0,
                sum_of_group_sizes: 0,
                finished: false,
            }),
            window_stats: None,
            sample_parameters: None,
        }
    }
}

impl DocResults {
    /// Finished results over `results`, in the same lineage
    pub(crate) fn derived(&self, results: Vec<Arc<DocResult>>) -> DocResults {
        DocResults {
            query_info: self.query_info.clone(),
            source: None,
            max_hits_per_doc: self.max_hits_per_doc,
            inner: Mutex::new(DocsInner::finished(results)),
            window_stats: None,
            sample_parameters: None,
        }
    }

    pub fn query_info(&self) -> &Arc<QueryInfo> {
        &self.query_info
    }

    pub fn max_hits_per_doc(&self) -> Option<usize> {
        self.max_hits_per_doc
    }

    pub fn window_stats(&self) -> Option<WindowStats> {
        self.window_stats
    }

    pub fn sample_parameters(&self) -> Option<SampleParameters> {
        self.sample_parameters
    }

    /// Make at least `n` documents available (fewer if the hits run out)
    pub fn ensure_results_read(&self, n: usize) -> Result<()> {
        self.ensure(Some(n)).map(drop)
    }

    pub fn ensure_all_read(&self) -> Result<()> {
        self.ensure(None).map(drop)
    }

    fn ensure(&self, wanted: Option<usize>) -> Result<MutexGuard<'_, DocsInner>> {
        let mut inner = self.inner.lock();
        let Some(source) = self.source.as_ref() else {
            return Ok(inner);
        };
        let batch_size = self.query_info.config().worker_batch_size.max(1);
        while !inner.finished && wanted.is_none_or(|n| inner.results.len() < n) {
            self.query_info.checkpoint().check()?;
            source.ensure_results_read(inner.source_index + batch_size)?;
            let batch = {
                let state = source.state();
                let end = (inner.source_index + batch_size).min(state.hits.len());
                state.hits.get(inner.source_index..end).map(|s| s.to_vec()).unwrap_or_default()
            };
            if batch.is_empty() {
                if let Some(partial) = inner.partial.take() {
                    self.complete(&mut inner, source, partial);
                }
                inner.finished = true;
                debug!(
                    source = source.id(),
                    docs = inner.results.len(),
                    most_hits = inner.most_hits_in_document,
                    "per-document results complete"
                );
                break;
            }
            inner.source_index += batch.len();
            for hit in batch {
                match inner.partial.as_mut() {
                    Some(partial) if partial.doc == hit.doc() => {
                        partial.count += 1;
                        if self.max_hits_per_doc.is_none_or(|max| partial.hits.len() < max) {
                            partial.hits.push(hit);
                        }
                    }
                    _ => {
                        let stored = if self.max_hits_per_doc == Some(0) { Vec::new() } else { vec![hit] };
                        let next = PartialDoc { doc: hit.doc(), hits: stored, count: 1 };
                        if let Some(done) = inner.partial.replace(next) {
                            self.complete(&mut inner, source, done);
                        }
                    }
                }
            }
        }
        Ok(inner)
    }

    fn complete(&self, inner: &mut DocsInner, source: &Hits, partial: PartialDoc) {
        let captures = source.captures_for(&partial.hits);
        inner.most_hits_in_document = inner.most_hits_in_document.max(partial.count);
        inner.sum_of_group_sizes += partial.count;
        inner.results.push(Arc::new(DocResult {
            doc: partial.doc,
            stored: Hits::from_list(&self.query_info, partial.hits, captures),
            size: partial.count,
        }));
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.ensure(None)?.results.len())
    }

    pub fn size_so_far(&self) -> usize {
        self.inner.lock().results.len()
    }

    pub fn done(&self) -> bool {
        self.inner.lock().finished
    }

    pub fn get(&self, index: usize) -> Result<Option<Arc<DocResult>>> {
        Ok(self.ensure(Some(index + 1))?.results.get(index).cloned())
    }

    pub fn results(&self) -> Result<Vec<Arc<DocResult>>> {
        Ok(self.ensure(None)?.results.clone())
    }

    /// The result for one document
    pub fn get_doc(&self, doc: DocId) -> Result<Arc<DocResult>> {
        self.ensure(None)?
            .results
            .iter()
            .find(|r| r.doc == doc)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("document {} has no hits in these results", doc)))
    }

    pub fn most_hits_in_document(&self) -> Result<usize> {
        Ok(self.ensure(None)?.most_hits_in_document)
    }

    pub fn sum_of_group_sizes(&self) -> Result<usize> {
        Ok(self.ensure(None)?.sum_of_group_sizes)
    }

    /// Counters as they are right now
    pub fn docs_stats(&self) -> ResultsStats {
        let inner = self.inner.lock();
        let hits = inner.sum_of_group_sizes + inner.partial.as_ref().map_or(0, |p| p.count);
        let (hits_counted, docs_counted, max_stats) = match &self.source {
            Some(source) => (source.hits_counted_so_far(), source.docs_counted_so_far(), source.max_stats()),
            None => (hits, inner.results.len(), MaxStats::NOT_EXCEEDED),
        };
        ResultsStats {
            hits_processed: hits,
            hits_counted,
            docs_processed: inner.results.len(),
            docs_counted,
            done: inner.finished,
            max_stats,
        }
    }

    pub fn window(&self, first: usize, size: usize) -> Result<DocResults> {
        let (end, has_next) = window_bounds(first, size, |n| {
            Ok(self.ensure(Some(n))?.results.len() >= n)
        })?;
        let selected = {
            let inner = self.inner.lock();
            let end = end.min(inner.results.len());
            inner.results[first..end].to_vec()
        };
        let actual = selected.len();
        let mut window = self.derived(selected);
        window.window_stats = Some(WindowStats {
            first,
            requested_size: size,
            actual_size: actual,
            has_next,
        });
        Ok(window)
    }

    pub fn sample(&self, parameters: SampleParameters) -> Result<DocResults> {
        let all = self.results()?;
        let selected = sample_indices(&parameters, all.len())
            .into_iter()
            .map(|i| all[i].clone())
            .collect();
        let mut sample = self.derived(selected);
        sample.sample_parameters = Some(parameters);
        Ok(sample)
    }

    pub fn sort(&self, by: DocProperty, reverse: bool) -> Result<DocResults> {
        let mut sorted = self.results()?;
        if reverse {
            sorted.sort_by(|a, b| by.value_of(b).cmp(&by.value_of(a)));
        } else {
            sorted.sort_by_key(|r| by.value_of(r));
        }
        Ok(self.derived(sorted))
    }

    pub fn filter(&self, by: DocProperty, value: &PropertyValue) -> Result<DocResults> {
        let kept = self.results()?
            .into_iter()
            .filter(|r| by.value_of(r) == *value)
            .collect();
        Ok(self.derived(kept))
    }
}
