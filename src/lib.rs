/*!
Accumulates items submitted one at a time by any number of producers and delivers them to a single handler in
batches, amortizing cost of a downstream bulk operation while bounding delivery latency.

A batch of up to `threshold` items is flushed when producers have submitted another `threshold` items or when
`max_wait` has elapsed since the previous flush, whichever comes first. Producers block when `buffer_capacity`
items are waiting to be flushed.

# Example

```rust
use bundle_batch::{Bundle, BundleConfig};
use crossbeam_channel::unbounded;
use std::time::Duration;

let (batches_tx, batches) = unbounded();

let bundle = Bundle::new(
    move |batch: Vec<u32>| batches_tx.send(batch).unwrap(),
    BundleConfig::default()
        .with_threshold(3)
        .with_max_wait(Duration::from_millis(100))
        .with_buffer_capacity(9),
).unwrap();

bundle.start().unwrap();

// Batch flushed due to threshold
bundle.add(1);
bundle.add(2);
bundle.add(3);
assert_eq!(batches.recv().unwrap(), [1, 2, 3]);

// Batch flushed due to max_wait since last flush
bundle.add(4);
assert_eq!(batches.recv().unwrap(), [4]);

// Outstanding items are flushed on close
bundle.add(5);
bundle.add(6);
bundle.close().unwrap();
assert_eq!(batches.iter().flatten().collect::<Vec<_>>(), [5, 6]);
```
!*/

pub mod bundle;
pub mod config;
pub mod counter;
pub mod error;
mod worker;

pub use crate::bundle::{Bundle, State};
pub use crate::config::BundleConfig;
pub use crate::error::{BundleError, ConfigError};
