use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use crate::core::cancel::Checkpoint;
use crate::core::config::{Config, SearchSettings};
use crate::core::stats::MaxStats;
use crate::index::CorpusIndex;

/// Hands out diagnostic ids for result objects
#[derive(Debug, Default)]
pub struct ResultsIdFactory {
    next: AtomicU64,
}

impl ResultsIdFactory {
    pub fn new() -> Self {
        ResultsIdFactory::default()
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Shared by every result set derived from one search
pub struct QueryInfo {
    id: u64,
    index: Arc<dyn CorpusIndex>,
    config: Arc<Config>,
    settings: SearchSettings,
    checkpoint: Checkpoint,
    ids: Arc<ResultsIdFactory>,
    max_stats: Mutex<MaxStats>,
    pub created_at: DateTime<Utc>,
}

impl QueryInfo {
    pub fn new(
        index: Arc<dyn CorpusIndex>,
        config: Arc<Config>,
        settings: SearchSettings,
        checkpoint: Checkpoint,
        ids: Arc<ResultsIdFactory>,
    ) -> Arc<Self> {
        Arc::new(QueryInfo {
            id: ids.next_id(),
            index,
            config,
            settings,
            checkpoint,
            ids,
            max_stats: Mutex::new(MaxStats::default()),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn index(&self) -> &Arc<dyn CorpusIndex> {
        &self.index
    }

    pub fn field(&self) -> &str {
        self.index.field().name()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> SearchSettings {
        self.settings
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Fresh id for a derived result object
    pub fn next_results_id(&self) -> u64 {
        self.ids.next_id()
    }

    /// Limit flags reported for the whole lineage
    pub fn max_stats(&self) -> MaxStats {
        *self.max_stats.lock()
    }

    pub(crate) fn merge_max_stats(&self, stats: MaxStats) {
        let mut current = self.max_stats.lock();
        current.hits_processed_exceeded |= stats.hits_processed_exceeded;
        current.hits_counted_exceeded |= stats.hits_counted_exceeded;
    }
}

impl fmt::Debug for QueryInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("QueryInfo")
            .field("id", &self.id)
            .field("field", &self.field())
            .field("settings", &self.settings)
            .field("max_stats", &self.max_stats())
            .field("created_at", &self.created_at)
            .finish()
    }
}
