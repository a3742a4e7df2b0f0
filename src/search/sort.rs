use tracing::debug;
use crate::core::error::Result;
use crate::search::hits::Hits;
use crate::search::property::{HitProperty, PropertyContext, PropertyValue};
use crate::search::state::HitsState;

impl Hits {
    /// All hits ordered by `property`, ties kept in original order.
    ///
    /// Counters of the source are carried over unchanged.
    pub fn sort(&self, property: &dyn HitProperty, reverse: bool) -> Result<Hits> {
        self.ensure_all_read()?;
        let query_info = self.query_info();

        let state = self.state();
        let context = PropertyContext {
            index: query_info.index().as_ref(),
            captures: state.captures.as_ref(),
            checkpoint: query_info.checkpoint(),
        };
        let values = property.values(&state.hits, &context)?;
        let mut keyed: Vec<(PropertyValue, usize)> = values.into_iter().zip(0..).collect();
        // Vec::sort_by is stable
        if reverse {
            keyed.sort_by(|a, b| b.0.cmp(&a.0));
        } else {
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
        }
        let sorted = keyed.into_iter().map(|(_, i)| state.hits[i]).collect();
        let sorted_state = HitsState {
            hits: sorted,
            captures: state.captures.clone(),
            hits_counted: state.hits_counted,
            docs_counted: state.docs_counted,
            docs_retrieved: state.docs_retrieved,
            max_stats: state.max_stats,
            done: true,
            failure: None,
        };
        drop(state);

        debug!(results = self.id(), property = %property.name(), reverse, "sorted hits");
        Ok(Hits::fixed(query_info, sorted_state))
    }
}
