//! Document number generation.
//!
//! Numbers look like `ORD20250105000123`: prefix, business date, then a
//! process-wide monotonically increasing sequence per prefix. The sequence
//! never resets, so numbers are collision-free even across midnight.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;

pub struct DocumentNumbers {
    counters: Mutex<HashMap<&'static str, u64>>,
}

impl Default for DocumentNumbers {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentNumbers {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Next number for `prefix`, dated `date`.
    pub fn next(&self, prefix: &'static str, date: NaiveDate) -> String {
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let counter = counters.entry(prefix).or_insert(0);
        *counter += 1;
        format!("{prefix}{}{:06}", date.format("%Y%m%d"), *counter)
    }
}
