/*!
This module provides `Bundle` that accepts items from any number of producer threads and delivers them to a single
handler in batches of up to `threshold` items.

A batch is flushed when producers have submitted another `threshold` items or when `max_wait` has elapsed since the
previous flush, whichever comes first. Closing the bundle flushes all outstanding items before returning.

# Example

```rust
use bundle_batch::{Bundle, BundleConfig};
use crossbeam_channel::unbounded;
use std::sync::Arc;
use std::time::Duration;

let (batches_tx, batches) = unbounded();

let bundle = Arc::new(Bundle::new(
    move |batch: Vec<u32>| batches_tx.send(batch).unwrap(),
    BundleConfig::default()
        .with_threshold(10)
        .with_max_wait(Duration::from_secs(3))
        .with_buffer_capacity(100),
).unwrap());

bundle.start().unwrap();

let producers: Vec<_> = (0..4).map(|p| {
    let bundle = bundle.clone();
    std::thread::spawn(move || {
        for i in 0..25 {
            // Blocks if 100 items are already waiting for a flush
            bundle.add(p * 100 + i);
        }
    })
}).collect();

for producer in producers {
    producer.join().unwrap();
}

// Flushes whatever is still buffered before returning
bundle.close().unwrap();

let batches: Vec<Vec<u32>> = batches.try_iter().collect();
assert!(batches.iter().all(|batch| !batch.is_empty() && batch.len() <= 10));
assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 100);
```
!*/

use crate::config::BundleConfig;
use crate::counter::SubmissionCounter;
use crate::error::{BundleError, ConfigError};
use crate::worker::Worker;
use crossbeam_channel::Sender;
use log::{debug, error};
use parking_lot::Mutex;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Lifecycle stage of a `Bundle`.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum State {
    /// Items are buffered but nothing is flushed until `start()` is called.
    Created,
    /// Flush worker is running.
    Running,
    /// `close()` has begun and outstanding items are being flushed.
    Draining,
    /// All items were flushed and the worker is gone.
    Terminated,
}

enum WorkerSlot<T> {
    Created(Worker<T>),
    Running(JoinHandle<()>),
    Draining,
    Terminated,
}

/// Accumulates items from concurrent producers and delivers them to the handler in batches.
///
/// Both `add` and `close` take `&self` so the bundle is meant to be shared, i.e. with `Arc`.
pub struct Bundle<T> {
    config: BundleConfig,
    items: Sender<T>,
    triggers: Sender<()>,
    shutdown: Sender<()>,
    counter: Mutex<SubmissionCounter>,
    closed: AtomicBool,
    worker: Mutex<WorkerSlot<T>>,
}

impl<T> fmt::Debug for Bundle<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Send + 'static> Bundle<T> {
    /// Creates bundle delivering batches to `handler` with limits given by `config`.
    ///
    /// Returns `Err(ConfigError)` if `config` does not pass `BundleConfig::validate()`.
    ///
    /// The bundle won't flush anything until `start()` is called.
    pub fn new(
        handler: impl FnMut(Vec<T>) + Send + 'static,
        config: BundleConfig,
    ) -> Result<Bundle<T>, ConfigError> {
        config.validate()?;
        Ok(Bundle::build(handler, config))
    }

    /// Creates bundle with `BundleConfig::default()` limits.
    pub fn with_defaults(handler: impl FnMut(Vec<T>) + Send + 'static) -> Bundle<T> {
        Bundle::build(handler, BundleConfig::default())
    }

    fn build(handler: impl FnMut(Vec<T>) + Send + 'static, config: BundleConfig) -> Bundle<T> {
        let (items, items_rx) = crossbeam_channel::bounded(config.buffer_capacity());
        let (triggers, triggers_rx) = crossbeam_channel::bounded(config.trigger_capacity());
        let (shutdown, shutdown_rx) = crossbeam_channel::bounded(1);

        let worker = Worker::new(items_rx, triggers_rx, shutdown_rx, Box::new(handler), &config);

        Bundle {
            counter: Mutex::new(SubmissionCounter::new(config.threshold())),
            config,
            items,
            triggers,
            shutdown,
            closed: AtomicBool::new(false),
            worker: Mutex::new(WorkerSlot::Created(worker)),
        }
    }

    /// Starts flush worker thread.
    ///
    /// If the thread cannot be spawned `Err(BundleError::Spawn)` is returned and the bundle becomes unusable.
    ///
    /// Panics if called more than once or after `close()`.
    pub fn start(&self) -> Result<(), BundleError> {
        let mut slot = self.worker.lock();

        let worker = match std::mem::replace(&mut *slot, WorkerSlot::Terminated) {
            WorkerSlot::Created(worker) => worker,
            WorkerSlot::Running(handle) => {
                *slot = WorkerSlot::Running(handle);
                panic!("Bundle::start called more than once");
            }
            other => {
                *slot = other;
                panic!("Bundle::start called after close");
            }
        };

        let handle = std::thread::Builder::new()
            .name("bundle flush worker".to_string())
            .spawn(move || worker.run())?;

        *slot = WorkerSlot::Running(handle);
        debug!("bundle started with {} items pending", self.pending());
        Ok(())
    }

    /// Submits item for batching.
    ///
    /// This call will block while the buffer holds `buffer_capacity` items waiting for flush, or while
    /// the worker has not yet picked up previously triggered flushes.
    ///
    /// Panics if called after `close()` has begun or if the flush worker has died due to handler panic.
    pub fn add(&self, item: T) {
        assert!(
            !self.closed.load(Ordering::SeqCst),
            "Bundle::add called after close"
        );

        if self.items.send(item).is_err() {
            panic!("Bundle::add flush worker has terminated");
        }

        let mut counter = self.counter.lock();
        if counter.advance() && self.triggers.send(()).is_err() {
            panic!("Bundle::add flush worker has terminated");
        }
    }
}

impl<T> Bundle<T> {
    /// Stops accepting items and blocks until all buffered items were flushed.
    ///
    /// Items added before `start()` was ever called are flushed on the calling thread. In that case a panicking
    /// handler panics out of `close()` itself instead of being reported as `Err(BundleError::WorkerPanicked)`.
    ///
    /// Returns `Err(BundleError::WorkerPanicked)` if the handler panicked on the flush worker thread;
    /// items remaining in the buffer at that point are lost.
    ///
    /// Calling `close()` more than once, including concurrently, is a contract error and panics.
    pub fn close(&self) -> Result<(), BundleError> {
        assert!(
            !self.closed.swap(true, Ordering::SeqCst),
            "Bundle::close called more than once"
        );

        self.shutdown()
    }

    fn shutdown(&self) -> Result<(), BundleError> {
        let slot = std::mem::replace(&mut *self.worker.lock(), WorkerSlot::Draining);
        debug!("closing bundle with {} items pending", self.pending());

        let result = match slot {
            WorkerSlot::Created(mut worker) => {
                worker.drain();
                Ok(())
            }
            WorkerSlot::Running(handle) => {
                // Worker is already gone if it failed on handler panic
                let _ = self.shutdown.send(());
                handle.join().map_err(BundleError::from_panic)
            }
            // Worker thread failed to spawn
            WorkerSlot::Draining | WorkerSlot::Terminated => Ok(()),
        };

        *self.worker.lock() = WorkerSlot::Terminated;
        result
    }

    /// Number of items waiting to be flushed.
    pub fn pending(&self) -> usize {
        self.items.len()
    }

    pub fn state(&self) -> State {
        match &*self.worker.lock() {
            WorkerSlot::Created(_) => State::Created,
            WorkerSlot::Running(_) => State::Running,
            WorkerSlot::Draining => State::Draining,
            WorkerSlot::Terminated => State::Terminated,
        }
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }
}

impl<T> Drop for Bundle<T> {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Err(err) = self.shutdown() {
                error!("bundle dropped without close: {}", err);
            }
        }
    }
}
