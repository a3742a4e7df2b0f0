use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLockReadGuard};
use rayon::ThreadPool;
use tracing::{debug, trace, warn};
use crate::core::cancel::Checkpoint;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::query_info::QueryInfo;
use crate::parallel::merger::{partition_readers, MergeStep, RegistrationOrderMerge};
use crate::query::SpanWeight;
use crate::reader::hit_reader::SegmentHitReader;
use crate::search::hits::HitSource;
use crate::search::sequential::extract_query_terms;
use crate::search::state::{HitsState, HitsWanted, Publication, Tally};

/// Coordinator state; owned by whoever drives the merge
struct MergeDrive {
    merge: RegistrationOrderMerge,
    tally: Tally,
    capture_names: Option<Arc<[String]>>,
    finished: bool,
}

/// How long a worker waits for buffer room before rechecking its stop flags
const READ_AHEAD_WAIT: Duration = Duration::from_millis(20);

/// Drains a fixed set of segment readers on a pool thread.
///
/// Never holds more than `read_ahead` unmerged hits per reader (plus one chunk).
struct WorkerJob {
    worker: usize,
    readers: Vec<Arc<SegmentHitReader>>,
    chunk: usize,
    read_ahead: usize,
    checkpoint: Checkpoint,
    stop: Arc<AtomicBool>,
    total_read: Arc<AtomicUsize>,
    max_count: Option<usize>,
    errors: Sender<Error>,
}

impl WorkerJob {
    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
            || self.checkpoint.is_cancelled()
            || self.max_count.is_some_and(|max| self.total_read.load(Ordering::Acquire) >= max)
    }

    fn run(self) {
        let worker = self.worker;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.drain()));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.is_interrupted() => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(Error::new(ErrorKind::Internal, format!("search worker {} panicked", worker))),
        };
        if let Some(e) = failure {
            warn!(worker, error = %e, "search worker failed");
            // The receiver is gone only when the collector was dropped
            let _ = self.errors.send(e);
        }
    }

    fn drain(&self) -> Result<()> {
        for reader in &self.readers {
            while !reader.state().is_terminal() {
                if self.should_stop() {
                    trace!(worker = self.worker, "search worker stopping early");
                    return Ok(());
                }
                if reader.available() >= self.read_ahead {
                    reader.wait_for_space(self.read_ahead, READ_AHEAD_WAIT);
                    continue;
                }
                reader.ensure_read(reader.hits_read() + self.chunk, &self.checkpoint)?;
            }
        }
        trace!(worker = self.worker, readers = self.readers.len(), "search worker done");
        Ok(())
    }
}

/// Multi-segment collector: pool workers read segments ahead while the
/// coordinator merges their buffers in segment order.
///
/// Produces exactly the hit list and counters of `SequentialCollector`;
/// only the reading is spread over threads.
pub struct ParallelCollector {
    query_info: Arc<QueryInfo>,
    readers: Arc<[Arc<SegmentHitReader>]>,
    workers: usize,
    pool: Arc<ThreadPool>,
    publication: Publication,
    drive: Mutex<MergeDrive>,
    launched: AtomicBool,
    stop: Arc<AtomicBool>,
    total_read: Arc<AtomicUsize>,
    errors_tx: Sender<Error>,
    errors: Receiver<Error>,
}

impl ParallelCollector {
    pub fn new(query_info: Arc<QueryInfo>, weight: Arc<dyn SpanWeight>, pool: Arc<ThreadPool>) -> Result<Self> {
        let terms = extract_query_terms(&query_info, weight.as_ref())?;

        let config = query_info.config();
        let total_read = Arc::new(AtomicUsize::new(0));
        let readers: Arc<[Arc<SegmentHitReader>]> = query_info.index()
            .segments()
            .iter()
            .map(|segment| {
                Arc::new(
                    SegmentHitReader::new(segment.clone(), weight.clone(), config.worker_batch_size)
                        .with_shared_counter(total_read.clone()),
                )
            })
            .collect();
        let workers = config.max_threads_per_search.max(1).min(readers.len().max(1));
        debug!(
            search = query_info.id(),
            terms,
            segments = readers.len(),
            workers,
            "created parallel hit collector"
        );

        let (errors_tx, errors) = channel::unbounded();
        let tally = Tally::new(query_info.settings());
        Ok(ParallelCollector {
            query_info,
            readers,
            workers,
            pool,
            publication: Publication::new(),
            drive: Mutex::new(MergeDrive {
                merge: RegistrationOrderMerge::new(),
                tally,
                capture_names: None,
                finished: false,
            }),
            launched: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
            total_read,
            errors_tx,
            errors,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_launched(&self) -> bool {
        self.launched.load(Ordering::Acquire)
    }

    /// Hits read by all segment readers together, merged or not
    pub fn hits_read(&self) -> usize {
        self.total_read.load(Ordering::Acquire)
    }

    /// Start the workers; later calls do nothing
    fn launch_workers(&self) {
        if self.launched.swap(true, Ordering::AcqRel) {
            return;
        }
        let chunk = self.query_info.config().worker_batch_size.max(1);
        let read_ahead = self.query_info.config().max_read_ahead_per_segment.max(chunk);
        let partitions = partition_readers(self.readers.len(), self.workers);
        let spawned = partitions.len();
        for (worker, assigned) in partitions.into_iter().enumerate() {
            let job = WorkerJob {
                worker,
                readers: assigned.into_iter().map(|i| self.readers[i].clone()).collect(),
                chunk,
                read_ahead,
                checkpoint: self.query_info.checkpoint().clone(),
                stop: self.stop.clone(),
                total_read: self.total_read.clone(),
                max_count: self.query_info.settings().max_hits_to_count(),
                errors: self.errors_tx.clone(),
            };
            self.pool.spawn(move || job.run());
        }
        debug!(search = self.query_info.id(), workers = spawned, read_ahead, "launched search workers");
    }

    /// Tell workers to stop, including those waiting for buffer room
    fn halt_workers(&self) {
        self.stop.store(true, Ordering::Release);
        for reader in self.readers.iter() {
            reader.wake_waiters();
        }
    }

    fn drive_merge(&self, drive: &mut MergeDrive, wanted: HitsWanted) -> Result<()> {
        let checkpoint = self.query_info.checkpoint().clone();
        let publish_every = self.query_info.config().publish_batch_size.max(1);

        let result = 'merge: loop {
            if !drive.tally.wants_more(wanted) {
                break Ok(());
            }
            if let Ok(e) = self.errors.try_recv() {
                break Err(e);
            }
            if let Err(e) = checkpoint.check() {
                drive.tally.interrupted();
                break Err(e);
            }
            if drive.tally.count_limit_reached() {
                debug!(search = self.query_info.id(), counted = drive.tally.hits_counted, "count limit reached");
                break Ok(());
            }

            match drive.merge.take(&self.readers, publish_every, &checkpoint) {
                Ok(MergeStep::Hits(reader, batch)) => {
                    if drive.capture_names.is_none() {
                        drive.capture_names = self.readers[reader].capture_names();
                    }
                    for (hit, captures) in batch {
                        // Hits past the count limit are dropped; iteration ends for good
                        if drive.tally.count_limit_reached() {
                            continue 'merge;
                        }
                        drive.tally.add(hit, captures);
                    }
                    if drive.tally.pending() >= publish_every {
                        self.publication.publish(&mut drive.tally, drive.capture_names.as_ref(), false);
                    }
                }
                Ok(MergeStep::Exhausted) => {
                    drive.finished = true;
                    break Ok(());
                }
                Err(e) => {
                    if e.is_interrupted() {
                        drive.tally.interrupted();
                    }
                    break Err(e);
                }
            }
        };

        let stopped = drive.finished || drive.tally.max_stats.hits_counted_exceeded || result.is_err();
        if stopped {
            self.halt_workers();
        }
        self.publication.publish(&mut drive.tally, drive.capture_names.as_ref(), drive.finished);
        self.query_info.merge_max_stats(drive.tally.max_stats);

        match &result {
            Ok(()) if drive.finished => debug!(
                search = self.query_info.id(),
                hits = drive.tally.materialized,
                counted = drive.tally.hits_counted,
                segments = drive.merge.current(),
                "all hits merged"
            ),
            Err(e) if e.is_interrupted() => debug!(search = self.query_info.id(), "hit collection interrupted"),
            Err(e) => warn!(search = self.query_info.id(), error = %e, "hit collection failed"),
            _ => {}
        }
        result
    }
}

impl HitSource for ParallelCollector {
    fn ensure_results_read(&self, wanted: HitsWanted) -> Result<()> {
        let config = self.query_info.config();
        if wanted == HitsWanted::All || config.eager_parallel_launch {
            self.launch_workers();
        }
        let fetch_min = config.fetch_hits_min;
        self.publication.ensure(&self.drive, wanted, |drive| {
            if drive.finished {
                return Ok(());
            }
            let target = wanted.rounded_up(drive.tally.materialized, fetch_min);
            self.drive_merge(drive, target)
        })
    }

    fn state(&self) -> RwLockReadGuard<'_, HitsState> {
        self.publication.read()
    }

    fn query_info(&self) -> &Arc<QueryInfo> {
        &self.query_info
    }
}

impl Drop for ParallelCollector {
    fn drop(&mut self) {
        self.halt_workers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use rayon::ThreadPoolBuilder;
    use crate::core::config::{Config, SearchSettings};
    use crate::index::memory::MemoryIndex;
    use crate::query::pattern::{PatternWeight, TokenPattern};
    use crate::search::searcher::Searcher;

    #[test]
    fn workers_stop_reading_ahead_of_the_merge() {
        // 4 segments x 25 docs x 100 hits
        let text = vec!["the"; 100].join(" ");
        let mut builder = MemoryIndex::builder("contents");
        for segment in 0..4 {
            if segment > 0 {
                builder = builder.new_segment();
            }
            builder = builder.add_documents(std::iter::repeat(text.as_str()).take(25));
        }
        let index = builder.build().unwrap();
        let config = Config {
            search_pool_threads: 4,
            max_threads_per_search: 4,
            eager_parallel_launch: true,
            worker_batch_size: 16,
            max_read_ahead_per_segment: 32,
            ..Config::default()
        };
        let searcher = Searcher::new(index.clone(), config).unwrap();
        let query_info = searcher.query_info(SearchSettings::new(Some(100), None), Checkpoint::new());
        let pool = Arc::new(ThreadPoolBuilder::new().num_threads(4).build().unwrap());
        let weight = Arc::new(PatternWeight::new(index, TokenPattern::phrase(&["the"])));
        let collector = ParallelCollector::new(query_info, weight, pool).unwrap();

        collector.ensure_results_read(HitsWanted::AtLeast(10)).unwrap();
        assert!(collector.is_launched());
        thread::sleep(Duration::from_millis(300));
        let visible = collector.state().hits().len();
        assert!(visible <= 100);
        // Merged hits plus at most read-ahead and one chunk per segment
        assert!(collector.hits_read() <= visible + 200 + 4 * (32 + 16), "read {}", collector.hits_read());

        collector.ensure_results_read(HitsWanted::All).unwrap();
        let state = collector.state();
        assert_eq!(state.hits().len(), 100);
        assert_eq!(state.hits_counted(), 10_000);
        assert!(state.max_stats().hits_processed_exceeded);
        assert!(state.done_processing_and_counting());
    }
}
