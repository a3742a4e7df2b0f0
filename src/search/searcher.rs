use std::sync::Arc;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;
use crate::core::cancel::Checkpoint;
use crate::core::config::{Config, SearchSettings};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::query_info::{QueryInfo, ResultsIdFactory};
use crate::index::CorpusIndex;
use crate::parallel::collector::ParallelCollector;
use crate::query::SpanWeight;
use crate::search::hits::Hits;
use crate::search::sequential::SequentialCollector;

/// Entry point: runs span weights against one index and hands out lazy `Hits`.
///
/// Owns the worker pool shared by every parallel search it starts.
pub struct Searcher {
    index: Arc<dyn CorpusIndex>,
    config: Arc<Config>,
    pool: Arc<ThreadPool>,
    ids: Arc<ResultsIdFactory>,
}

impl Searcher {
    pub fn new(index: Arc<dyn CorpusIndex>, config: Config) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.search_pool_threads.max(1))
            .thread_name(|i| format!("hitstream-search-{}", i))
            .build()
            .map_err(|e| Error::new(ErrorKind::Internal, format!("failed to build search pool: {}", e)))?;
        info!(
            threads = config.search_pool_threads.max(1),
            segments = index.segments().len(),
            parallel = config.parallel_search,
            "searcher ready"
        );
        Ok(Searcher {
            index,
            config: Arc::new(config),
            pool: Arc::new(pool),
            ids: Arc::new(ResultsIdFactory::new()),
        })
    }

    pub fn index(&self) -> &Arc<dyn CorpusIndex> {
        &self.index
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn query_info(&self, settings: SearchSettings, checkpoint: Checkpoint) -> Arc<QueryInfo> {
        QueryInfo::new(self.index.clone(), self.config.clone(), settings, checkpoint, self.ids.clone())
    }

    /// Parallel when enabled and there is more than one segment to spread
    fn use_parallel(&self) -> bool {
        self.config.parallel_search && self.config.max_threads_per_search > 1 && self.index.segments().len() > 1
    }

    pub fn find(&self, weight: Arc<dyn SpanWeight>, settings: SearchSettings) -> Result<Hits> {
        self.find_with_checkpoint(weight, settings, Checkpoint::new())
    }

    /// Like `find`, with a checkpoint the caller can pause or cancel
    pub fn find_with_checkpoint(
        &self,
        weight: Arc<dyn SpanWeight>,
        settings: SearchSettings,
        checkpoint: Checkpoint,
    ) -> Result<Hits> {
        if self.use_parallel() {
            self.find_parallel(weight, settings, checkpoint)
        } else {
            self.find_sequential(weight, settings, checkpoint)
        }
    }

    pub fn find_sequential(
        &self,
        weight: Arc<dyn SpanWeight>,
        settings: SearchSettings,
        checkpoint: Checkpoint,
    ) -> Result<Hits> {
        let query_info = self.query_info(settings, checkpoint);
        let collector = SequentialCollector::new(query_info, weight)?;
        Ok(Hits::from_source(Arc::new(collector)))
    }

    pub fn find_parallel(
        &self,
        weight: Arc<dyn SpanWeight>,
        settings: SearchSettings,
        checkpoint: Checkpoint,
    ) -> Result<Hits> {
        let query_info = self.query_info(settings, checkpoint);
        let collector = ParallelCollector::new(query_info, weight, self.pool.clone())?;
        Ok(Hits::from_source(Arc::new(collector)))
    }
}
