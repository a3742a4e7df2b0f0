use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use parking_lot::{Condvar, Mutex};
use tracing::trace;
use crate::core::cancel::Checkpoint;
use crate::core::error::{Error, Result};
use crate::core::types::Span;
use crate::index::SegmentInfo;
use crate::query::{EphemeralHit, HitQueryContext, SegmentCursor, SpanWeight};
use crate::search::state::BufferedHit;

/// Segment cursor restricted to live documents
pub(crate) struct LiveCursor {
    cursor: Box<dyn SegmentCursor>,
    segment: SegmentInfo,
    started: bool,
    exhausted: bool,
}

impl LiveCursor {
    pub fn new(cursor: Box<dyn SegmentCursor>, segment: SegmentInfo) -> Self {
        LiveCursor { cursor, segment, started: false, exhausted: false }
    }

    /// Step to the next hit; `false` once the segment is exhausted
    pub fn advance(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        if !self.started {
            self.started = true;
            if !self.next_live_doc()? {
                self.exhausted = true;
                return Ok(false);
            }
        }
        loop {
            if self.cursor.next_start()?.is_some() {
                return Ok(true);
            }
            // End of document; go to first hit in the next one
            if !self.next_live_doc()? {
                self.exhausted = true;
                return Ok(false);
            }
        }
    }

    fn next_live_doc(&mut self) -> Result<bool> {
        while let Some(doc) = self.cursor.next_doc()? {
            if self.segment.is_live(doc) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn hit(&self) -> EphemeralHit<'_> {
        EphemeralHit::new(self.cursor.as_ref(), self.segment.doc_base)
    }

    pub fn register_captures(&mut self, context: &mut HitQueryContext) {
        self.cursor.register_captures(context);
    }

    /// Current hit with its capture slots
    pub fn buffered(&self, capture_count: usize) -> BufferedHit {
        let hit = self.hit().to_hit();
        if capture_count == 0 {
            return (hit, None);
        }
        let mut slots: Vec<Option<Span>> = vec![None; capture_count];
        self.cursor.captured_groups(&mut slots);
        (hit, Some(slots.into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    NotStarted,
    Reading,
    Exhausted,
    Interrupted,
    /// The cursor returned an error; it is never advanced again
    Failed,
}

impl ReaderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReaderState::Exhausted | ReaderState::Interrupted | ReaderState::Failed)
    }
}

struct ReaderBuffer {
    pending: VecDeque<BufferedHit>,
    read: usize,
    state: ReaderState,
    failure: Option<Error>,
    capture_names: Option<Arc<[String]>>,
}

struct ReaderDrive {
    cursor: Option<LiveCursor>,
    capture_count: usize,
}

/// Drains one segment's cursor into an append-only buffer.
///
/// Advancing holds the drive lock; consumers only touch the buffer lock,
/// so they can take hits while another thread keeps reading.
pub struct SegmentHitReader {
    segment: SegmentInfo,
    weight: Arc<dyn SpanWeight>,
    batch_size: usize,
    drive: Mutex<ReaderDrive>,
    buffer: Mutex<ReaderBuffer>,
    /// Signalled when hits are taken out of the buffer
    space: Condvar,
    total_read: Option<Arc<AtomicUsize>>,
}

impl SegmentHitReader {
    pub fn new(segment: SegmentInfo, weight: Arc<dyn SpanWeight>, batch_size: usize) -> Self {
        SegmentHitReader {
            segment,
            weight,
            batch_size: batch_size.max(1),
            drive: Mutex::new(ReaderDrive { cursor: None, capture_count: 0 }),
            buffer: Mutex::new(ReaderBuffer {
                pending: VecDeque::new(),
                read: 0,
                state: ReaderState::NotStarted,
                failure: None,
                capture_names: None,
            }),
            space: Condvar::new(),
            total_read: None,
        }
    }

    /// Also add every hit read to a counter shared with sibling readers
    pub(crate) fn with_shared_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.total_read = Some(counter);
        self
    }

    pub fn segment(&self) -> &SegmentInfo {
        &self.segment
    }

    pub fn state(&self) -> ReaderState {
        self.buffer.lock().state
    }

    /// Hits read from the cursor so far, taken or not
    pub fn hits_read(&self) -> usize {
        self.buffer.lock().read
    }

    pub fn available(&self) -> usize {
        self.buffer.lock().pending.len()
    }

    pub fn capture_names(&self) -> Option<Arc<[String]>> {
        self.buffer.lock().capture_names.clone()
    }

    /// The error that put this reader in the `Failed` state
    pub fn failure(&self) -> Option<Error> {
        self.buffer.lock().failure.clone()
    }

    /// Read until `n` hits have been read in total, the cursor is exhausted,
    /// or the checkpoint reports cancellation.
    ///
    /// A cursor error fails the reader: this call and every later one return it.
    pub fn ensure_read(&self, n: usize, checkpoint: &Checkpoint) -> Result<()> {
        let mut drive = self.drive.lock();
        let already = {
            let buffer = self.buffer.lock();
            if let Some(e) = &buffer.failure {
                return Err(e.clone());
            }
            if buffer.state.is_terminal() || buffer.read >= n {
                return Ok(());
            }
            buffer.read
        };

        if drive.cursor.is_none() {
            match self.open(&mut drive) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => {
                    self.fail(&e);
                    return Err(e);
                }
            }
        }
        let ReaderDrive { cursor, capture_count } = &mut *drive;
        let Some(cursor) = cursor.as_mut() else {
            return Ok(());
        };

        let wanted = n - already;
        let mut batch = Vec::with_capacity(wanted.min(self.batch_size));
        let mut produced = 0;
        let outcome = loop {
            if produced >= wanted {
                break Ok(ReaderState::Reading);
            }
            if let Err(e) = checkpoint.check() {
                break Err(e);
            }
            match cursor.advance() {
                Ok(true) => {
                    batch.push(cursor.buffered(*capture_count));
                    produced += 1;
                    if batch.len() >= self.batch_size {
                        self.flush(&mut batch, None);
                    }
                }
                Ok(false) => break Ok(ReaderState::Exhausted),
                Err(e) => break Err(e),
            }
        };

        match outcome {
            Ok(state) => {
                self.flush(&mut batch, Some(state));
                if state == ReaderState::Exhausted {
                    trace!(segment = self.segment.ord, hits = self.hits_read(), "segment exhausted");
                }
                Ok(())
            }
            Err(e) if e.is_interrupted() => {
                self.flush(&mut batch, Some(ReaderState::Interrupted));
                Err(e)
            }
            Err(e) => {
                // Hits read before the error stay available
                self.flush(&mut batch, None);
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Remove up to `max` buffered hits, in read order
    pub fn take_available(&self, max: usize) -> Vec<BufferedHit> {
        let taken: Vec<BufferedHit> = {
            let mut buffer = self.buffer.lock();
            let n = max.min(buffer.pending.len());
            buffer.pending.drain(..n).collect()
        };
        if !taken.is_empty() {
            self.space.notify_all();
        }
        taken
    }

    /// Block while at least `cap` hits wait to be taken.
    ///
    /// Gives up after `timeout` so the caller can recheck its own stop
    /// conditions; returns whether there is room now.
    pub fn wait_for_space(&self, cap: usize, timeout: Duration) -> bool {
        let mut buffer = self.buffer.lock();
        if buffer.pending.len() >= cap && !buffer.state.is_terminal() {
            self.space.wait_for(&mut buffer, timeout);
        }
        buffer.pending.len() < cap || buffer.state.is_terminal()
    }

    /// Release threads blocked in `wait_for_space`
    pub(crate) fn wake_waiters(&self) {
        self.space.notify_all();
    }

    fn open(&self, drive: &mut ReaderDrive) -> Result<bool> {
        match self.weight.cursor(&self.segment)? {
            None => {
                self.buffer.lock().state = ReaderState::Exhausted;
                Ok(false)
            }
            Some(cursor) => {
                let mut cursor = LiveCursor::new(cursor, self.segment.clone());
                let mut context = HitQueryContext::new();
                cursor.register_captures(&mut context);
                drive.capture_count = context.len();
                drive.cursor = Some(cursor);

                let mut buffer = self.buffer.lock();
                buffer.state = ReaderState::Reading;
                if !context.is_empty() {
                    buffer.capture_names = Some(context.shared_names());
                }
                Ok(true)
            }
        }
    }

    fn fail(&self, error: &Error) {
        let mut buffer = self.buffer.lock();
        buffer.state = ReaderState::Failed;
        buffer.failure.get_or_insert_with(|| error.clone());
        drop(buffer);
        self.space.notify_all();
    }

    fn flush(&self, batch: &mut Vec<BufferedHit>, state: Option<ReaderState>) {
        let added = batch.len();
        let mut buffer = self.buffer.lock();
        buffer.pending.extend(batch.drain(..));
        buffer.read += added;
        if let Some(state) = state {
            buffer.state = state;
        }
        if let Some(counter) = &self.total_read {
            counter.fetch_add(added, Ordering::AcqRel);
        }
    }
}
