use serde::{Serialize, Deserialize};
use crate::core::types::ContextSize;

/// Engine-wide configuration, shared by every search a `Searcher` runs
#[derive(Debug, Clone)]
pub struct Config {
    // Threading
    pub search_pool_threads: usize,             // Size of the shared rayon pool
    pub max_threads_per_search: usize,          // Worker cap for one parallel search
    pub parallel_search: bool,                  // false forces the sequential collector
    pub eager_parallel_launch: bool,            // Launch workers on the first request, not only on "all"

    // Collection
    pub fetch_hits_min: usize,                  // Minimum extra hits fetched per lock acquisition
    pub worker_batch_size: usize,               // Hits a worker buffers before publishing
    pub publish_batch_size: usize,              // Hits the sequential driver appends before publishing
    pub max_read_ahead_per_segment: usize,      // Unmerged hits a worker may hold per segment before it waits

    // Query setup
    pub max_terms_per_query: usize,             // Wildcard expansion limit

    // Presentation
    pub default_context_size: ContextSize,
    pub kwic_cache_size: usize,                 // Kwics kept per Hits, keyed by context size
}

impl Default for Config {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Config {
            search_pool_threads: cpus,
            max_threads_per_search: cpus,
            parallel_search: true,
            eager_parallel_launch: false,

            fetch_hits_min: 20,
            worker_batch_size: 100,
            publish_batch_size: 100,
            max_read_ahead_per_segment: 1000,

            max_terms_per_query: 1024,

            default_context_size: ContextSize::default(),
            kwic_cache_size: 4,
        }
    }
}

impl Config {
    /// Config for a strictly single-threaded engine
    pub fn sequential() -> Self {
        Config {
            search_pool_threads: 1,
            max_threads_per_search: 1,
            parallel_search: false,
            ..Config::default()
        }
    }
}

/// Per-search limits. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    max_hits_to_process: Option<usize>,
    max_hits_to_count: Option<usize>,
}

impl SearchSettings {
    /// Count limit is raised to at least the process limit.
    pub fn new(max_hits_to_process: Option<usize>, max_hits_to_count: Option<usize>) -> Self {
        let max_hits_to_count = match (max_hits_to_process, max_hits_to_count) {
            (Some(process), Some(count)) => Some(count.max(process)),
            (Some(_), None) => None,
            (None, _) => None,
        };
        SearchSettings { max_hits_to_process, max_hits_to_count }
    }

    pub fn unlimited() -> Self {
        SearchSettings::new(None, None)
    }

    pub fn max_hits_to_process(&self) -> Option<usize> {
        self.max_hits_to_process
    }

    pub fn max_hits_to_count(&self) -> Option<usize> {
        self.max_hits_to_count
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings::new(Some(5_000_000), Some(10_000_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_limit_never_below_process_limit() {
        let settings = SearchSettings::new(Some(100), Some(10));
        assert_eq!(settings.max_hits_to_process(), Some(100));
        assert_eq!(settings.max_hits_to_count(), Some(100));
    }

    #[test]
    fn unlimited_process_means_unlimited_count() {
        let settings = SearchSettings::new(None, Some(10));
        assert_eq!(settings.max_hits_to_count(), None);
    }
}
