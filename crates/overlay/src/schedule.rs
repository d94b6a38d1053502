//! Debounced redraw scheduling
//!
//! Input events request a redraw; the redraw runs once the input has been
//! quiet for the debounce delay. Each request bumps a generation so a
//! redraw started for an older request can be recognized and dropped.

/// Trailing-edge debouncer driven by caller-supplied timestamps
#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    delay_ms: u64,
    generation: u64,
    due_at: Option<u64>,
}

impl RedrawScheduler {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            generation: 0,
            due_at: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Record an input at `now_ms`, pushing the pending redraw back
    ///
    /// # Returns
    /// Generation of this request
    pub fn request(&mut self, now_ms: u64) -> u64 {
        self.generation += 1;
        self.due_at = Some(now_ms.saturating_add(self.delay_ms));
        self.generation
    }

    /// Generation to redraw if the quiet period has passed
    pub fn poll(&mut self, now_ms: u64) -> Option<u64> {
        match self.due_at {
            Some(due) if now_ms >= due => {
                self.due_at = None;
                Some(self.generation)
            }
            _ => None,
        }
    }

    /// Milliseconds until the pending redraw is due
    pub fn remaining(&self, now_ms: u64) -> Option<u64> {
        self.due_at.map(|due| due.saturating_sub(now_ms))
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    /// Whether a redraw for `generation` is still the latest
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

impl Default for RedrawScheduler {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_burst_collapses_to_one_redraw() {
        let mut scheduler = RedrawScheduler::default();
        scheduler.request(0);
        scheduler.request(20);
        let last = scheduler.request(40);

        assert_eq!(scheduler.poll(60), None);
        assert_eq!(scheduler.remaining(60), Some(30));
        assert_eq!(scheduler.poll(90), Some(last));
        assert_eq!(scheduler.poll(200), None);
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn test_stale_generation() {
        let mut scheduler = RedrawScheduler::new(10);
        let first = scheduler.request(0);
        let due = scheduler.poll(10).unwrap();
        assert_eq!(due, first);

        // Input arrives while the first redraw is running
        let second = scheduler.request(12);
        assert!(!scheduler.is_current(first));
        assert!(scheduler.is_current(second));
    }
}
