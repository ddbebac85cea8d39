//! Bounded history of completed runs for display

use super::metrics::TestRun;
use std::collections::VecDeque;

/// Keeps the most recent completed runs, oldest evicted first
#[derive(Debug, Clone)]
pub struct RunHistory {
    runs: VecDeque<TestRun>,
    capacity: usize,
}

impl RunHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            runs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, run: TestRun) {
        if self.runs.len() == self.capacity {
            self.runs.pop_front();
        }
        self.runs.push_back(run);
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &TestRun> {
        self.runs.iter()
    }

    pub fn latest(&self) -> Option<&TestRun> {
        self.runs.back()
    }

    pub fn average_download_mbps(&self) -> Option<f64> {
        crate::stats::mean(&self.runs.iter().filter_map(TestRun::download_mbps).collect::<Vec<_>>())
    }

    pub fn average_upload_mbps(&self) -> Option<f64> {
        crate::stats::mean(&self.runs.iter().filter_map(TestRun::upload_mbps).collect::<Vec<_>>())
    }
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new(crate::defaults::DEFAULT_HISTORY_SIZE)
    }
}
