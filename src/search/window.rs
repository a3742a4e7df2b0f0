use tracing::trace;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::WindowStats;
use crate::core::types::Hit;
use crate::search::hits::Hits;
use crate::search::state::{count_docs, HitsState};

/// Check a window request against a list that can report whether it holds
/// at least `n` items. Returns the unclamped end and `has_next`.
pub(crate) fn window_bounds<F>(first: usize, size: usize, mut at_least: F) -> Result<(usize, bool)>
where
    F: FnMut(usize) -> Result<bool>,
{
    let empty = !at_least(1)?;
    if (empty && first > 0) || (!empty && !at_least(first + 1)?) {
        return Err(Error::out_of_range(format!("window start {} is beyond the end of the results", first)));
    }
    let end = first.saturating_add(size);
    let has_next = at_least(end.saturating_add(1))?;
    Ok((end, has_next))
}

impl Hits {
    /// A slice of at most `size` hits starting at `first`.
    ///
    /// Fails with `OutOfRange` when `first` lies past the last hit (an empty
    /// result set allows only `first == 0`).
    pub fn window(&self, first: usize, size: usize) -> Result<Hits> {
        let (end, has_next) = window_bounds(first, size, |n| self.hits_processed_at_least(n))?;

        let (selected, max_stats) = {
            let state = self.state();
            let end = end.min(state.hits.len());
            let selected: Vec<Hit> = state.hits.get(first..end).map(|s| s.to_vec()).unwrap_or_default();
            (selected, state.max_stats)
        };
        let captures = self.captures_for(&selected);
        let actual = selected.len();
        let docs = count_docs(&selected);
        trace!(results = self.id(), first, requested = size, actual, has_next, "hits window");

        let state = HitsState::fixed(selected, captures, actual, docs, max_stats);
        Ok(Hits::fixed(self.query_info(), state).with_window_stats(WindowStats {
            first,
            requested_size: size,
            actual_size: actual,
            has_next,
        }))
    }

    /// Single-hit window positioned at `hit`
    pub fn window_for_hit(&self, hit: &Hit) -> Result<Hits> {
        for (i, candidate) in self.iter().enumerate() {
            if candidate? == *hit {
                return self.window(i, 1);
            }
        }
        Err(Error::new(ErrorKind::NotFound, format!("hit {} is not in these results", hit)))
    }
}
