//! Lifecycle event delivery.
//!
//! [`BufferedEventDispatcher`] implements the domain publisher port with a
//! bounded in-process buffer and a retrying worker. The worker hands events
//! to a [`LifecycleEventChannel`](crate::domain::ports::LifecycleEventChannel);
//! [`RedisLifecycleEventChannel`] is the production transport.

mod dispatcher;
mod redis_channel;

pub use dispatcher::{
    BufferedEventDispatcher, DispatchJitter, DispatchSleeper, DispatchStats, DispatcherConfig,
    DispatcherHandle, DispatcherRuntime, RandomJitter, TokioSleeper,
};
pub use redis_channel::RedisLifecycleEventChannel;
