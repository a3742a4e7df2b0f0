use std::sync::Arc;
use parking_lot::{Mutex, RwLockReadGuard};
use tracing::{debug, trace};
use crate::core::config::SearchSettings;
use crate::core::error::Result;
use crate::core::query_info::QueryInfo;
use crate::search::hits::{HitSource, Hits};
use crate::search::property::{HitProperty, PropertyContext, PropertyValue};
use crate::search::state::{HitsState, HitsWanted, Publication, Tally};

struct FilterDrive {
    /// Next source position to test
    source_index: usize,
    tally: Tally,
    capture_names: Option<Arc<[String]>>,
    finished: bool,
}

/// Hits of another result set whose property equals a value.
///
/// Pulls the source lazily in batches and keeps source order.
pub struct FilteredHits {
    query_info: Arc<QueryInfo>,
    source: Hits,
    property: Arc<dyn HitProperty>,
    value: PropertyValue,
    publication: Publication,
    drive: Mutex<FilterDrive>,
}

impl FilteredHits {
    pub fn new(source: Hits, property: Arc<dyn HitProperty>, value: PropertyValue) -> Self {
        let query_info = source.query_info().clone();
        FilteredHits {
            query_info,
            source,
            property,
            value,
            publication: Publication::new(),
            drive: Mutex::new(FilterDrive {
                source_index: 0,
                tally: Tally::new(SearchSettings::unlimited()),
                capture_names: None,
                finished: false,
            }),
        }
    }

    fn drive_filter(&self, drive: &mut FilterDrive, wanted: HitsWanted) -> Result<()> {
        let batch_size = self.query_info.config().worker_batch_size.max(1);
        let checkpoint = self.query_info.checkpoint();

        let result = loop {
            if !drive.tally.wants_more(wanted) {
                break Ok(());
            }
            if let Err(e) = checkpoint.check() {
                drive.tally.interrupted();
                break Err(e);
            }
            if let Err(e) = self.source.ensure_results_read(drive.source_index + batch_size) {
                break Err(e);
            }

            let batch = {
                let state = self.source.state();
                let end = (drive.source_index + batch_size).min(state.hits.len());
                state.hits.get(drive.source_index..end).map(|s| s.to_vec()).unwrap_or_default()
            };
            if batch.is_empty() {
                // ensure_results_read came back short, so the source is done
                drive.finished = true;
                break Ok(());
            }

            // The source publishes its capture names with its first hits
            if drive.capture_names.is_none() {
                drive.capture_names = self.source.capture_names();
            }
            let captures = self.source.captures_for(&batch);
            let context = PropertyContext {
                index: self.query_info.index().as_ref(),
                captures: captures.as_ref(),
                checkpoint,
            };
            let values = match self.property.values(&batch, &context) {
                Ok(values) => values,
                Err(e) => break Err(e),
            };
            for (hit, value) in batch.iter().zip(values) {
                if value == self.value {
                    drive.tally.add(*hit, captures.as_ref().and_then(|c| c.get_shared(hit)));
                }
            }
            drive.source_index += batch.len();
            self.publication.publish(&mut drive.tally, drive.capture_names.as_ref(), false);
        };

        if drive.finished {
            let source_stats = self.source.max_stats();
            drive.tally.max_stats.hits_processed_exceeded |= source_stats.hits_processed_exceeded;
            drive.tally.max_stats.hits_counted_exceeded |= source_stats.hits_counted_exceeded;
            debug!(
                source = self.source.id(),
                property = %self.property.name(),
                kept = drive.tally.materialized,
                tested = drive.source_index,
                "filter complete"
            );
        } else {
            trace!(source = self.source.id(), kept = drive.tally.materialized, "filter paused");
        }
        self.publication.publish(&mut drive.tally, drive.capture_names.as_ref(), drive.finished);
        result
    }
}

impl HitSource for FilteredHits {
    fn ensure_results_read(&self, wanted: HitsWanted) -> Result<()> {
        let fetch_min = self.query_info.config().fetch_hits_min;
        self.publication.ensure(&self.drive, wanted, |drive| {
            if drive.finished {
                return Ok(());
            }
            let target = wanted.rounded_up(drive.tally.materialized, fetch_min);
            self.drive_filter(drive, target)
        })
    }

    fn state(&self) -> RwLockReadGuard<'_, HitsState> {
        self.publication.read()
    }

    fn query_info(&self) -> &Arc<QueryInfo> {
        &self.query_info
    }
}

impl Hits {
    /// Lazily filtered view keeping hits whose `property` equals `value`
    pub fn filter(&self, property: Arc<dyn HitProperty>, value: PropertyValue) -> Hits {
        Hits::from_source(Arc::new(FilteredHits::new(self.clone(), property, value)))
    }
}
