pub mod spi;

use serde::{Deserialize, Serialize};

/// One sample of the input word, taken whenever it changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSample {
    pub time_ns: u64,
    pub word: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start_ns: u64,
    pub end_ns: u64,
}

impl TimeSpan {
    pub fn duration_ns(&self) -> u64 {
        self.end_ns.saturating_sub(self.start_ns)
    }
}
