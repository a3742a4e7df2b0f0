use std::sync::Arc;
use parking_lot::{Mutex, RwLockReadGuard};
use tracing::{debug, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::query_info::QueryInfo;
use crate::index::SegmentInfo;
use crate::query::{HitQueryContext, SpanWeight};
use crate::reader::hit_reader::LiveCursor;
use crate::search::hits::HitSource;
use crate::search::state::{HitsState, HitsWanted, Publication, Tally};

/// Term-context setup, done once per search before any segment is visited.
///
/// Returns the number of terms the query expands to.
pub(crate) fn extract_query_terms(query_info: &QueryInfo, weight: &dyn SpanWeight) -> Result<usize> {
    let max_terms = query_info.config().max_terms_per_query;
    let terms = weight.extract_terms(max_terms)?;
    if terms.len() > max_terms {
        return Err(Error::new(
            ErrorKind::QueryTooBroad,
            format!("query uses {} terms, limit is {}", terms.len(), max_terms),
        ));
    }
    Ok(terms.len())
}

/// Cursor position and running counters; owned by whoever drives
struct SequentialDrive {
    segments: Vec<SegmentInfo>,
    next_segment: usize,
    current: Option<LiveCursor>,
    context: HitQueryContext,
    capture_names: Option<Arc<[String]>>,
    tally: Tally,
    finished: bool,
}

/// Single-threaded collector: visits segments one at a time in order.
///
/// One caller drives at a time. Others wait for publications and return as
/// soon as enough hits are visible, or take over if the driver stopped short.
pub struct SequentialCollector {
    query_info: Arc<QueryInfo>,
    weight: Arc<dyn SpanWeight>,
    publication: Publication,
    drive: Mutex<SequentialDrive>,
}

impl SequentialCollector {
    pub fn new(query_info: Arc<QueryInfo>, weight: Arc<dyn SpanWeight>) -> Result<Self> {
        let terms = extract_query_terms(&query_info, weight.as_ref())?;
        let segments = query_info.index().segments().to_vec();
        debug!(
            search = query_info.id(),
            terms,
            segments = segments.len(),
            "created sequential hit collector"
        );

        let tally = Tally::new(query_info.settings());
        Ok(SequentialCollector {
            query_info,
            weight,
            publication: Publication::new(),
            drive: Mutex::new(SequentialDrive {
                segments,
                next_segment: 0,
                current: None,
                context: HitQueryContext::new(),
                capture_names: None,
                tally,
                finished: false,
            }),
        })
    }

    /// Position on the next live hit, opening segments as needed
    fn next_hit(&self, drive: &mut SequentialDrive) -> Result<bool> {
        loop {
            if let Some(cursor) = drive.current.as_mut() {
                if cursor.advance()? {
                    return Ok(true);
                }
                drive.current = None;
            }

            let Some(segment) = drive.segments.get(drive.next_segment).cloned() else {
                return Ok(false);
            };
            drive.next_segment += 1;

            if let Some(cursor) = self.weight.cursor(&segment)? {
                let mut cursor = LiveCursor::new(cursor, segment);
                cursor.register_captures(&mut drive.context);
                if drive.capture_names.is_none() && !drive.context.is_empty() {
                    drive.capture_names = Some(drive.context.shared_names());
                }
                drive.current = Some(cursor);
            }
        }
    }

    fn drive_hits(&self, drive: &mut SequentialDrive, wanted: HitsWanted) -> Result<()> {
        let checkpoint = self.query_info.checkpoint().clone();
        let publish_every = self.query_info.config().publish_batch_size.max(1);

        let result = loop {
            if !drive.tally.wants_more(wanted) {
                break Ok(());
            }
            if let Err(e) = checkpoint.check() {
                drive.tally.interrupted();
                break Err(e);
            }
            if drive.tally.count_limit_reached() {
                debug!(search = self.query_info.id(), counted = drive.tally.hits_counted, "count limit reached");
                break Ok(());
            }

            match self.next_hit(drive) {
                Ok(true) => {
                    let capture_count = drive.context.len();
                    if let Some(cursor) = drive.current.as_ref() {
                        let (hit, captures) = cursor.buffered(capture_count);
                        drive.tally.add(hit, captures);
                    }
                    if drive.tally.pending() >= publish_every {
                        self.publication.publish(&mut drive.tally, drive.capture_names.as_ref(), false);
                    }
                }
                Ok(false) => {
                    drive.finished = true;
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };

        self.publication.publish(&mut drive.tally, drive.capture_names.as_ref(), drive.finished);
        self.query_info.merge_max_stats(drive.tally.max_stats);

        match &result {
            Ok(()) if drive.finished => debug!(
                search = self.query_info.id(),
                hits = drive.tally.materialized,
                counted = drive.tally.hits_counted,
                "all hits read"
            ),
            Err(e) if e.is_interrupted() => debug!(search = self.query_info.id(), "hit collection interrupted"),
            Err(e) => warn!(search = self.query_info.id(), error = %e, "hit collection failed"),
            _ => {}
        }
        result
    }
}

impl HitSource for SequentialCollector {
    fn ensure_results_read(&self, wanted: HitsWanted) -> Result<()> {
        let fetch_min = self.query_info.config().fetch_hits_min;
        self.publication.ensure(&self.drive, wanted, |drive| {
            if drive.finished {
                return Ok(());
            }
            let target = wanted.rounded_up(drive.tally.materialized, fetch_min);
            self.drive_hits(drive, target)
        })
    }

    fn state(&self) -> RwLockReadGuard<'_, HitsState> {
        self.publication.read()
    }

    fn query_info(&self) -> &Arc<QueryInfo> {
        &self.query_info
    }
}
