use std::collections::VecDeque;

/// Fixed-capacity FIFO of recent probe results, `true` meaning success.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    results: VecDeque<bool>,
    capacity: usize,
    failures: usize,
}

impl RollingWindow {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            results: VecDeque::with_capacity(capacity),
            capacity,
            failures: 0,
        }
    }

    pub fn push(&mut self, success: bool) {
        if self.results.len() == self.capacity {
            if let Some(false) = self.results.pop_front() {
                self.failures -= 1;
            }
        }
        if !success {
            self.failures += 1;
        }
        self.results.push_back(success);
    }

    pub fn loss_percent(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.failures as f64 / self.results.len() as f64 * 100.0
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
