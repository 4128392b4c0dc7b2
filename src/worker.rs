use crate::config::BundleConfig;
use crossbeam_channel::{after, select, Receiver};
use log::{debug, trace};

use std::fmt;
use std::time::{Duration, Instant};

/// Callback receiving every flushed batch.
pub type Handler<T> = Box<dyn FnMut(Vec<T>) + Send + 'static>;

/// Event that ended worker's wait.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Wakeup {
    /// Producers completed a full threshold of submissions.
    Trigger,
    /// No flush happened for `max_wait`.
    Timeout,
    /// `Bundle` is closing or gone.
    Shutdown,
}

/// Owns the receiving ends of `Bundle` channels and decides when to flush.
///
/// Only one `Worker` exists per `Bundle` so flushes never run concurrently.
pub struct Worker<T> {
    items: Receiver<T>,
    triggers: Receiver<()>,
    shutdown: Receiver<()>,
    handler: Handler<T>,
    threshold: usize,
    max_wait: Duration,
}

impl<T> fmt::Debug for Worker<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Worker")
            .field("pending", &self.items.len())
            .field("threshold", &self.threshold)
            .field("max_wait", &self.max_wait)
            .finish()
    }
}

impl<T> Worker<T> {
    pub fn new(
        items: Receiver<T>,
        triggers: Receiver<()>,
        shutdown: Receiver<()>,
        handler: Handler<T>,
        config: &BundleConfig,
    ) -> Worker<T> {
        Worker {
            items,
            triggers,
            shutdown,
            handler,
            threshold: config.threshold(),
            max_wait: config.max_wait(),
        }
    }

    /// Flushes on every trigger or idle timeout until shutdown is signalled, then drains the buffer.
    ///
    /// Idle timer is rearmed after each flush so `max_wait` counts from the previous flush.
    pub fn run(mut self) {
        debug!(
            "flush worker started; threshold: {}, max_wait: {:?}",
            self.threshold, self.max_wait
        );

        let mut timer = after(self.max_wait);
        loop {
            match self.wait(&timer) {
                Wakeup::Trigger | Wakeup::Timeout => {
                    self.flush();
                    timer = after(self.max_wait);
                }
                Wakeup::Shutdown => break,
            }
        }

        self.drain();
        debug!("flush worker drained and terminated");
    }

    /// Blocks until one of trigger, `timer` or shutdown becomes ready.
    pub fn wait(&self, timer: &Receiver<Instant>) -> Wakeup {
        let wakeup = select! {
            recv(self.triggers) -> trigger => match trigger {
                Ok(()) => Wakeup::Trigger,
                // Sender side gone with the bundle
                Err(_) => Wakeup::Shutdown,
            },
            recv(timer) -> _ => Wakeup::Timeout,
            recv(self.shutdown) -> _ => Wakeup::Shutdown,
        };
        trace!("flush worker woken up by {:?}", wakeup);
        wakeup
    }

    /// Removes up to `threshold` buffered items in arrival order and passes them to the handler.
    ///
    /// Returns number of items flushed; handler is not called when buffer is empty.
    pub fn flush(&mut self) -> usize {
        let buffered = self.items.len();
        let size = buffered.min(self.threshold);
        if size == 0 {
            return 0;
        }

        let batch: Vec<T> = self.items.try_iter().take(size).collect();
        debug_assert_eq!(batch.len(), size);
        trace!("flushing {} of {} buffered items", size, buffered);

        (self.handler)(batch);
        size
    }

    /// Flushes until buffer is empty.
    pub fn drain(&mut self) {
        while !self.items.is_empty() {
            self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    pub use super::*;
    use assert_matches::assert_matches;
    use crossbeam_channel::{bounded, unbounded, Sender};

    struct Fixture {
        items: Sender<u32>,
        triggers: Sender<()>,
        shutdown: Sender<()>,
        batches: Receiver<Vec<u32>>,
        worker: Worker<u32>,
    }

    fn fixture(threshold: usize, max_wait: Duration) -> Fixture {
        let config = BundleConfig::default()
            .with_threshold(threshold)
            .with_max_wait(max_wait)
            .with_buffer_capacity(100);
        let (items, items_rx) = bounded(config.buffer_capacity());
        let (triggers, triggers_rx) = bounded(config.trigger_capacity());
        let (shutdown, shutdown_rx) = bounded(1);
        let (batches_tx, batches) = unbounded();

        let worker = Worker::new(
            items_rx,
            triggers_rx,
            shutdown_rx,
            Box::new(move |batch| batches_tx.send(batch).unwrap()),
            &config,
        );

        Fixture {
            items,
            triggers,
            shutdown,
            batches,
            worker,
        }
    }

    #[test]
    fn test_flush_max_threshold() {
        let mut f = fixture(2, Duration::from_secs(10));
        for i in 1..=5 {
            f.items.send(i).unwrap();
        }

        assert_eq!(f.worker.flush(), 2);
        assert_eq!(f.batches.try_recv().unwrap(), [1, 2]);
        assert_eq!(f.worker.flush(), 2);
        assert_eq!(f.batches.try_recv().unwrap(), [3, 4]);
        assert_eq!(f.worker.flush(), 1);
        assert_eq!(f.batches.try_recv().unwrap(), [5]);
    }

    #[test]
    fn test_flush_empty() {
        let mut f = fixture(2, Duration::from_secs(10));

        assert_eq!(f.worker.flush(), 0);
        assert!(f.batches.try_recv().is_err());
    }

    #[test]
    fn test_drain() {
        let mut f = fixture(3, Duration::from_secs(10));
        for i in 1..=7 {
            f.items.send(i).unwrap();
        }

        f.worker.drain();

        assert_eq!(f.batches.try_iter().collect::<Vec<_>>(), vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    }

    #[test]
    fn test_wait_trigger() {
        let f = fixture(2, Duration::from_secs(10));
        f.triggers.send(()).unwrap();

        assert_matches!(f.worker.wait(&after(Duration::from_secs(10))), Wakeup::Trigger);
    }

    #[test]
    fn test_wait_timeout() {
        let f = fixture(2, Duration::from_millis(10));

        assert_matches!(f.worker.wait(&after(Duration::from_millis(10))), Wakeup::Timeout);
    }

    #[test]
    fn test_wait_shutdown() {
        let f = fixture(2, Duration::from_secs(10));
        f.shutdown.send(()).unwrap();

        assert_matches!(f.worker.wait(&after(Duration::from_secs(10))), Wakeup::Shutdown);
    }

    #[test]
    fn test_wait_triggers_disconnected() {
        let Fixture {
            triggers,
            shutdown: _shutdown,
            worker,
            ..
        } = fixture(2, Duration::from_secs(10));
        drop(triggers);

        assert_matches!(worker.wait(&after(Duration::from_secs(10))), Wakeup::Shutdown);
    }

    #[test]
    fn test_run_drains_on_shutdown() {
        let f = fixture(2, Duration::from_secs(10));
        for i in 1..=5 {
            f.items.send(i).unwrap();
        }
        f.shutdown.send(()).unwrap();

        f.worker.run();

        assert_eq!(f.batches.try_iter().collect::<Vec<_>>(), vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[test]
    fn test_run_flushes_on_timeout() {
        let Fixture {
            items,
            triggers: _triggers,
            shutdown,
            batches,
            worker,
        } = fixture(10, Duration::from_millis(50));
        let handle = std::thread::spawn(move || worker.run());

        items.send(1).unwrap();
        items.send(2).unwrap();

        assert_eq!(batches.recv_timeout(Duration::from_secs(5)).unwrap(), [1, 2]);

        shutdown.send(()).unwrap();
        handle.join().unwrap();
        assert!(batches.try_recv().is_err());
    }
}
