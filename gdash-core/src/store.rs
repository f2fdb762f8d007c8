use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::WeatherLog;

/// Bounded, newest-wins buffer of received logs.
///
/// Appends and snapshot reads are mutually exclusive. When the buffer is
/// full the oldest entry is evicted, so memory stays flat no matter how
/// long the process runs.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<WeatherLog>>,
}

impl LogBuffer {
    /// A zero capacity is bumped to one so an append is never a drop.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append one log, evicting the oldest entry when full. Returns the
    /// number of entries stored after the append.
    pub fn append(&self, log: WeatherLog) -> usize {
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(log);
        entries.len()
    }

    /// Clone of the buffered logs in arrival order.
    pub fn snapshot(&self) -> Vec<WeatherLog> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<WeatherLog>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
