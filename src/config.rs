use crate::error::ConfigError;
use std::time::Duration;

/// Default number of items that triggers a flush.
pub const DEFAULT_THRESHOLD: usize = 20;
/// Default maximum idle time between flushes.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);
/// Default number of items that can be buffered before `Bundle::add` blocks.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Limits of a `Bundle` fixed at construction.
///
/// ```rust
/// use bundle_batch::BundleConfig;
/// use std::time::Duration;
///
/// let config = BundleConfig::default()
///     .with_threshold(10)
///     .with_max_wait(Duration::from_secs(3))
///     .with_buffer_capacity(1000);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.trigger_capacity(), 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleConfig {
    threshold: usize,
    max_wait: Duration,
    buffer_capacity: usize,
}

impl Default for BundleConfig {
    fn default() -> BundleConfig {
        BundleConfig {
            threshold: DEFAULT_THRESHOLD,
            max_wait: DEFAULT_MAX_WAIT,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl BundleConfig {
    /// Sets maximum batch size in number of items; reaching it triggers a flush.
    pub fn with_threshold(mut self, threshold: usize) -> BundleConfig {
        self.threshold = threshold;
        self
    }

    /// Sets maximum duration since last flush after which buffered items are flushed regardless of their count.
    pub fn with_max_wait(mut self, max_wait: Duration) -> BundleConfig {
        self.max_wait = max_wait;
        self
    }

    /// Sets the number of items that can be waiting for a flush before producers start to block.
    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> BundleConfig {
        self.buffer_capacity = buffer_capacity;
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Number of pending flush triggers that can be queued for the worker.
    ///
    /// Only meaningful for a configuration that passed `validate()`, in which case it is at least 1.
    pub fn trigger_capacity(&self) -> usize {
        self.buffer_capacity / self.threshold.max(1)
    }

    /// Checks that limits are usable.
    ///
    /// Returns `Err(ConfigError)` if:
    /// * `threshold` is zero,
    /// * `max_wait` is zero,
    /// * `buffer_capacity` cannot hold `threshold` items.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }

        if self.max_wait == Duration::from_secs(0) {
            return Err(ConfigError::ZeroMaxWait);
        }

        if self.buffer_capacity < self.threshold {
            return Err(ConfigError::BufferTooSmall {
                buffer_capacity: self.buffer_capacity,
                threshold: self.threshold,
            });
        }

        Ok(())
    }
}
