//! Shared, monotonic job progress.

use parking_lot::RwLock;

use super::JobProgress;

/// Percent reported once a job has finished.
pub const COMPLETE_PERCENT: u8 = 100;

/// Progress owned by the controller and read by job handles.
///
/// Percent never decreases: an update below the current value keeps the
/// current percent and only replaces the status text.
#[derive(Debug)]
pub struct ProgressTracker {
    current: RwLock<JobProgress>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(JobProgress {
                percent: 0,
                status_text: String::new(),
            }),
        }
    }

    /// Record an update and return the snapshot that was stored.
    pub fn update(&self, percent: u8, status_text: impl Into<String>) -> JobProgress {
        let mut current = self.current.write();
        current.percent = percent.min(COMPLETE_PERCENT).max(current.percent);
        current.status_text = status_text.into();
        current.clone()
    }

    pub fn snapshot(&self) -> JobProgress {
        self.current.read().clone()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Batch percent for 1-based data row `position` of `record_count`.
///
/// Reaches exactly 95 at the last record; the rest is reserved for
/// finishing the job.
pub fn batch_percent(position: usize, record_count: usize) -> u8 {
    if record_count == 0 {
        return 0;
    }
    let percent = (position.min(record_count) as u64 * 95) / record_count as u64;
    percent as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_update_and_snapshot() {
        let tracker = ProgressTracker::new();
        let progress = tracker.update(10, "Encoding XML file");
        assert_eq!(progress.percent, 10);
        assert_eq!(tracker.snapshot().status_text, "Encoding XML file");
    }

    #[test]
    fn test_percent_never_decreases() {
        let tracker = ProgressTracker::new();
        tracker.update(50, "halfway");
        let progress = tracker.update(20, "later");
        assert_eq!(progress.percent, 50);
        assert_eq!(progress.status_text, "later");
    }

    #[test]
    fn test_percent_capped() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.update(250, "over").percent, 100);
    }

    #[test]
    fn test_batch_percent() {
        assert_eq!(batch_percent(1, 1), 95);
        assert_eq!(batch_percent(1, 3), 31);
        assert_eq!(batch_percent(2, 3), 63);
        assert_eq!(batch_percent(3, 3), 95);
        assert_eq!(batch_percent(1, 0), 0);
    }

    proptest! {
        #[test]
        fn prop_batch_percent_monotonic(record_count in 1usize..5000) {
            let mut previous = 0;
            for position in 1..=record_count {
                let percent = batch_percent(position, record_count);
                prop_assert!(percent >= previous);
                prop_assert!(percent <= 95);
                previous = percent;
            }
            prop_assert_eq!(previous, 95);
        }
    }
}
