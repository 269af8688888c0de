use chrono::{DateTime, Utc};

/// An open long position. Owned by the simulator between entry and exit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub entry_timestamp: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_bar_index: usize,
}

impl Position {
    pub fn new(entry_timestamp: DateTime<Utc>, entry_price: f64, entry_bar_index: usize) -> Self {
        Self {
            entry_timestamp,
            entry_price,
            entry_bar_index,
        }
    }
}
