/// Counts item submissions modulo batch threshold.
///
/// This base implementation does not handle any locking or signalling of the flush worker.
#[derive(Debug)]
pub struct SubmissionCounter {
    count: usize,
    threshold: usize,
}

impl SubmissionCounter {
    /// Creates counter that completes a cycle every `threshold` submissions.
    ///
    /// Panics if `threshold == 0`.
    pub fn new(threshold: usize) -> SubmissionCounter {
        assert!(threshold > 0, "SubmissionCounter::new bad threshold");

        SubmissionCounter {
            count: 0,
            threshold,
        }
    }

    /// Records one submission.
    ///
    /// Returns `true` when this submission completed a full cycle of `threshold` submissions
    /// and counter wrapped back to zero.
    pub fn advance(&mut self) -> bool {
        self.count = (self.count + 1) % self.threshold;
        self.count == 0
    }

    /// Number of submissions since the counter last wrapped; always less than `threshold`.
    pub fn count(&self) -> usize {
        self.count
    }
}
