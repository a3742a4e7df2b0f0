use serde::{Serialize, Deserialize};

/// Whether a search ran into its process/count limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxStats {
    pub hits_processed_exceeded: bool,
    pub hits_counted_exceeded: bool,
}

impl MaxStats {
    pub const NOT_EXCEEDED: MaxStats = MaxStats {
        hits_processed_exceeded: false,
        hits_counted_exceeded: false,
    };

    /// Both limits flagged; used when a search is cut short
    pub fn set_both(&mut self) {
        self.hits_processed_exceeded = true;
        self.hits_counted_exceeded = true;
    }

    pub fn exceeded_any(&self) -> bool {
        self.hits_processed_exceeded || self.hits_counted_exceeded
    }
}

/// Snapshot of result counters for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsStats {
    pub hits_processed: usize,
    pub hits_counted: usize,
    pub docs_processed: usize,
    pub docs_counted: usize,
    pub done: bool,
    pub max_stats: MaxStats,
}

/// Describes a materialized slice of a larger result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStats {
    pub first: usize,
    pub requested_size: usize,
    pub actual_size: usize,
    pub has_next: bool,
}

impl WindowStats {
    pub fn has_previous(&self) -> bool {
        self.first > 0
    }

    pub fn next_first(&self) -> usize {
        self.first + self.requested_size
    }

    pub fn previous_first(&self) -> usize {
        self.first.saturating_sub(self.requested_size)
    }
}
