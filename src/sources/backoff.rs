use std::time::Duration;

/// Delay schedule for delayed retries after a failed fetch.
///
/// Delays are taken from `delays` in order; once exhausted the last value
/// repeats. Sleeping is left to the caller (`tokio::time::sleep`) so tests can
/// fast-forward a paused clock instead of waiting.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    delays: Vec<Duration>,
    max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5),
                Duration::from_secs(10),
            ],
            3,
        )
    }
}

impl BackoffPolicy {
    pub fn new(delays: Vec<Duration>, max_retries: u32) -> Self {
        let delays = if delays.is_empty() {
            vec![Duration::from_secs(1)]
        } else {
            delays
        };
        BackoffPolicy {
            delays,
            max_retries,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let idx = (retry.max(1) - 1) as usize;
        self.delays[idx.min(self.delays.len() - 1)]
    }

    /// A retry may be scheduled while the number of retries already spent
    /// is below the cap.
    pub fn allows_retry(&self, retries_spent: u32) -> bool {
        retries_spent < self.max_retries
    }
}
