use std::any::Any;
use std::io;
use thiserror::Error;

/// The error that is returned when `BundleConfig` limits cannot produce a working `Bundle`.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Error)]
pub enum ConfigError {
    /// Batch threshold of zero items would never trigger a flush.
    #[error("threshold must be greater than zero")]
    ZeroThreshold,
    /// Idle timer of zero length would make the worker flush in a busy loop.
    #[error("max_wait must be greater than zero")]
    ZeroMaxWait,
    /// Buffer is not able to hold a single full batch.
    #[error("buffer_capacity ({buffer_capacity}) must not be less than threshold ({threshold})")]
    BufferTooSmall {
        buffer_capacity: usize,
        threshold: usize,
    },
}

/// Errors returned by `Bundle` lifecycle operations.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The flush worker thread could not be started.
    #[error("failed to spawn flush worker thread: {0}")]
    Spawn(#[from] io::Error),
    /// Handler panicked and took the flush worker down with it; items it did not flush are lost.
    #[error("flush worker terminated abnormally: {0}")]
    WorkerPanicked(String),
}

impl BundleError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> BundleError {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_owned()
        };
        BundleError::WorkerPanicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_from_panic_str() {
        assert_matches!(BundleError::from_panic(Box::new("boom")), BundleError::WorkerPanicked(message) =>
            assert_eq!(message, "boom")
        );
    }

    #[test]
    fn test_from_panic_string() {
        assert_matches!(BundleError::from_panic(Box::new(format!("boom {}", 42))), BundleError::WorkerPanicked(message) =>
            assert_eq!(message, "boom 42")
        );
    }

    #[test]
    fn test_from_panic_other() {
        assert_matches!(BundleError::from_panic(Box::new(42u8)), BundleError::WorkerPanicked(_));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::BufferTooSmall {
            buffer_capacity: 2,
            threshold: 3,
        };
        assert_eq!(
            err.to_string(),
            "buffer_capacity (2) must not be less than threshold (3)"
        );
    }
}
