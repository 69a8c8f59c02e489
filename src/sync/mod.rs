//! Concurrency primitives used across the engine: cancellable task
//! registries and multi-subscriber value streams.

mod broadcast;
mod cancel;

pub use broadcast::{BroadcastValue, Subscription};
pub use cancel::{CancelBag, CancelToken, Cancellable};
