use std::sync::Arc;
use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard};
use crate::core::captures::CapturedGroups;
use crate::core::error::{Error, Result};
use crate::core::config::SearchSettings;
use crate::core::stats::MaxStats;
use crate::core::types::{DocId, Hit, Span};

/// A hit with its capture slots, on its way into a result list
pub type BufferedHit = (Hit, Option<Arc<[Option<Span>]>>);

/// How many results a caller needs materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitsWanted {
    AtLeast(usize),
    All,
}

impl HitsWanted {
    /// Raise small requests so a driver fetches at least `min_fetch` more hits
    pub(crate) fn rounded_up(self, materialized: usize, min_fetch: usize) -> HitsWanted {
        match self {
            HitsWanted::AtLeast(n) if n < materialized + min_fetch => HitsWanted::AtLeast(materialized + min_fetch),
            other => other,
        }
    }
}

/// What a result set has published so far
#[derive(Debug, Default)]
pub struct HitsState {
    pub(crate) hits: Vec<Hit>,
    pub(crate) captures: Option<CapturedGroups>,
    pub(crate) hits_counted: usize,
    pub(crate) docs_counted: usize,
    pub(crate) docs_retrieved: usize,
    pub(crate) max_stats: MaxStats,
    /// Source fully read
    pub(crate) done: bool,
    /// Fatal error hit while reading; returned to every later request
    pub(crate) failure: Option<Error>,
}

impl HitsState {
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn captures(&self) -> Option<&CapturedGroups> {
        self.captures.as_ref()
    }

    pub fn hits_counted(&self) -> usize {
        self.hits_counted
    }

    pub fn docs_counted(&self) -> usize {
        self.docs_counted
    }

    pub fn docs_retrieved(&self) -> usize {
        self.docs_retrieved
    }

    pub fn max_stats(&self) -> MaxStats {
        self.max_stats
    }

    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// No further processing or counting will happen
    pub fn done_processing_and_counting(&self) -> bool {
        self.done || self.max_stats.hits_counted_exceeded
    }

    /// `Some` when a request needs no driving: satisfied or failed for good
    pub(crate) fn settled(&self, wanted: HitsWanted) -> Option<Result<()>> {
        if let Some(e) = &self.failure {
            return Some(Err(e.clone()));
        }
        self.satisfies(wanted).then_some(Ok(()))
    }

    pub(crate) fn satisfies(&self, wanted: HitsWanted) -> bool {
        if self.done_processing_and_counting() {
            return true;
        }
        match wanted {
            HitsWanted::AtLeast(n) => self.hits.len() >= n,
            HitsWanted::All => false,
        }
    }

    /// Fully materialized state built from an existing list
    pub(crate) fn fixed(
        hits: Vec<Hit>,
        captures: Option<CapturedGroups>,
        hits_counted: usize,
        docs_counted: usize,
        max_stats: MaxStats,
    ) -> Self {
        let docs_retrieved = count_docs(&hits);
        HitsState {
            hits,
            captures,
            hits_counted,
            docs_counted,
            docs_retrieved,
            max_stats,
            done: true,
            failure: None,
        }
    }
}

/// Distinct document runs in a hit list
pub(crate) fn count_docs(hits: &[Hit]) -> usize {
    let mut previous: Option<DocId> = None;
    let mut docs = 0;
    for hit in hits {
        if previous != Some(hit.doc()) {
            docs += 1;
            previous = Some(hit.doc());
        }
    }
    docs
}

/// Running counters kept by whoever drives a source.
///
/// Applies the count cutoff (stop iterating) and the process cutoff
/// (stop appending, keep counting).
#[derive(Debug)]
pub(crate) struct Tally {
    max_process: Option<usize>,
    max_count: Option<usize>,
    pub hits_counted: usize,
    pub docs_counted: usize,
    pub docs_retrieved: usize,
    pub materialized: usize,
    pub max_stats: MaxStats,
    previous_doc: Option<DocId>,
    batch: Vec<BufferedHit>,
}

impl Tally {
    pub fn new(settings: SearchSettings) -> Self {
        Tally {
            max_process: settings.max_hits_to_process(),
            max_count: settings.max_hits_to_count(),
            hits_counted: 0,
            docs_counted: 0,
            docs_retrieved: 0,
            materialized: 0,
            max_stats: MaxStats::default(),
            previous_doc: None,
            batch: Vec::new(),
        }
    }

    /// Set the count flag and report whether iteration must stop
    pub fn count_limit_reached(&mut self) -> bool {
        match self.max_count {
            Some(max) if self.hits_counted >= max => {
                self.max_stats.hits_counted_exceeded = true;
                true
            }
            _ => false,
        }
    }

    pub fn add(&mut self, hit: Hit, captures: Option<Arc<[Option<Span>]>>) {
        self.hits_counted += 1;
        if self.process_limit_reached() {
            self.max_stats.hits_processed_exceeded = true;
        }
        let processed_exceeded = self.max_stats.hits_processed_exceeded;
        if self.previous_doc != Some(hit.doc()) {
            self.docs_counted += 1;
            if !processed_exceeded {
                self.docs_retrieved += 1;
            }
            self.previous_doc = Some(hit.doc());
        }
        if !processed_exceeded {
            self.batch.push((hit, captures));
            self.materialized += 1;
            if self.process_limit_reached() {
                self.max_stats.hits_processed_exceeded = true;
            }
        }
    }

    fn process_limit_reached(&self) -> bool {
        matches!(self.max_process, Some(max) if self.materialized >= max)
    }

    pub fn wants_more(&self, wanted: HitsWanted) -> bool {
        match wanted {
            HitsWanted::AtLeast(n) => self.materialized < n,
            HitsWanted::All => true,
        }
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn interrupted(&mut self) {
        self.max_stats.set_both();
    }

    fn take_batch(&mut self) -> Vec<BufferedHit> {
        std::mem::take(&mut self.batch)
    }
}

/// Published state plus a generation counter that waiters block on.
///
/// Only the driver writes; every publish bumps the generation.
#[derive(Debug, Default)]
pub(crate) struct Publication {
    state: RwLock<HitsState>,
    generation: Mutex<u64>,
    changed: Condvar,
}

impl Publication {
    pub fn new() -> Self {
        Publication::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, HitsState> {
        self.state.read()
    }

    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Move the tally's pending hits and counters into the visible state
    pub fn publish(&self, tally: &mut Tally, capture_names: Option<&Arc<[String]>>, done: bool) {
        let batch = tally.take_batch();
        {
            let mut state = self.state.write();
            if state.captures.is_none() {
                if let Some(names) = capture_names {
                    state.captures = Some(CapturedGroups::new(names.clone()));
                }
            }
            state.hits.reserve(batch.len());
            for (hit, spans) in batch {
                if let (Some(captures), Some(spans)) = (state.captures.as_mut(), spans) {
                    captures.put(hit, spans);
                }
                state.hits.push(hit);
            }
            state.hits_counted = tally.hits_counted;
            state.docs_counted = tally.docs_counted;
            state.docs_retrieved = tally.docs_retrieved;
            state.max_stats = tally.max_stats;
            state.done |= done;
        }
        self.notify();
    }

    /// Make `error` the answer to every later request
    pub fn fail(&self, error: &Error) {
        self.state.write().failure.get_or_insert_with(|| error.clone());
        self.notify();
    }

    pub fn notify(&self) {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.changed.notify_all();
    }

    /// Single-driver protocol.
    ///
    /// Returns once `wanted` is visible; otherwise runs `drive` if nobody else
    /// holds the drive lock, or waits for the current driver's next publication.
    /// A non-interrupt error from `drive` is final.
    pub fn ensure<D, F>(&self, drive: &Mutex<D>, wanted: HitsWanted, mut run: F) -> Result<()>
    where
        F: FnMut(&mut D) -> Result<()>,
    {
        loop {
            let seen = self.generation();
            if let Some(settled) = self.read().settled(wanted) {
                return settled;
            }
            if let Some(mut guard) = drive.try_lock() {
                // Another driver may have finished while we were checking
                if let Some(settled) = self.read().settled(wanted) {
                    return settled;
                }
                let result = run(&mut *guard);
                if let Err(e) = &result {
                    if !e.is_interrupted() {
                        self.fail(e);
                    }
                }
                drop(guard);
                // Wake waiters that may now need to drive themselves
                self.notify();
                return result;
            }
            self.wait_for_change(seen);
        }
    }

    /// Block until the generation moves past `seen`
    pub fn wait_for_change(&self, seen: u64) {
        let mut generation = self.generation.lock();
        while *generation == seen {
            self.changed.wait(&mut generation);
        }
    }
}
