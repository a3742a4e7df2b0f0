use std::sync::Arc;
use crate::core::cancel::Checkpoint;
use crate::core::error::{Error, ErrorKind, Result};
use crate::reader::hit_reader::{ReaderState, SegmentHitReader};
use crate::search::state::BufferedHit;

/// Round-robin assignment of `count` readers to at most `workers` workers.
///
/// Worker `w` gets readers `w, w + workers, w + 2 * workers, ...`.
pub fn partition_readers(count: usize, workers: usize) -> Vec<Vec<usize>> {
    let workers = workers.clamp(1, count.max(1));
    let mut partitions = vec![Vec::new(); workers];
    for reader in 0..count {
        partitions[reader % workers].push(reader);
    }
    partitions.retain(|p| !p.is_empty());
    partitions
}

/// Outcome of one merge step
pub(crate) enum MergeStep {
    /// Hits from the reader at this position
    Hits(usize, Vec<BufferedHit>),
    Exhausted,
}

/// Walks segment readers in registration order, so the merged stream is the
/// same as a sequential pass over the segments.
#[derive(Debug, Default)]
pub(crate) struct RegistrationOrderMerge {
    current: usize,
}

impl RegistrationOrderMerge {
    pub fn new() -> Self {
        RegistrationOrderMerge::default()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Take up to `max` hits from the current reader, reading them on this
    /// thread when no worker has buffered any yet.
    pub fn take(&mut self, readers: &[Arc<SegmentHitReader>], max: usize, checkpoint: &Checkpoint) -> Result<MergeStep> {
        let max = max.max(1);
        loop {
            let Some(reader) = readers.get(self.current) else {
                return Ok(MergeStep::Exhausted);
            };
            let batch = reader.take_available(max);
            if !batch.is_empty() {
                return Ok(MergeStep::Hits(self.current, batch));
            }
            match reader.state() {
                ReaderState::Exhausted => {
                    // The final flush may have landed after the take above
                    let rest = reader.take_available(max);
                    if !rest.is_empty() {
                        return Ok(MergeStep::Hits(self.current, rest));
                    }
                    self.current += 1;
                }
                ReaderState::Interrupted => {
                    return Err(Error::interrupted(format!("segment {} reader was interrupted", reader.segment().ord)));
                }
                ReaderState::Failed => {
                    // Hits read before the failure come first
                    let rest = reader.take_available(max);
                    if !rest.is_empty() {
                        return Ok(MergeStep::Hits(self.current, rest));
                    }
                    return Err(reader.failure().unwrap_or_else(|| {
                        Error::new(ErrorKind::Internal, format!("segment {} reader failed", reader.segment().ord))
                    }));
                }
                ReaderState::NotStarted | ReaderState::Reading => {
                    reader.ensure_read(reader.hits_read() + max, checkpoint)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_partitions() {
        assert_eq!(partition_readers(5, 2), vec![vec![0, 2, 4], vec![1, 3]]);
        assert_eq!(partition_readers(2, 8), vec![vec![0], vec![1]]);
        assert_eq!(partition_readers(3, 0), vec![vec![0, 1, 2]]);
        assert!(partition_readers(0, 4).is_empty());
    }
}
