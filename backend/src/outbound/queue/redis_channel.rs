//! Redis list transport for lifecycle events.
//!
//! Each event kind has its own list (`scheduling.created`, ...). Messages are
//! pushed on the left as the decimal record id, so consumers can use
//! `BLMOVE .. RIGHT LEFT` into a processing list for at-least-once handling.

use async_trait::async_trait;
use bb8_redis::redis::{AsyncCommands, RedisError};
use tracing::debug;

use crate::domain::ports::{LifecycleEvent, LifecycleEventChannel, LifecycleEventChannelError};
use crate::outbound::redis::{RedisPool, RedisPoolError};

/// Lifecycle event channel writing to Redis lists.
#[derive(Clone)]
pub struct RedisLifecycleEventChannel {
    pool: RedisPool,
}

impl RedisLifecycleEventChannel {
    /// Create a channel over the given pool.
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: RedisPoolError) -> LifecycleEventChannelError {
    LifecycleEventChannelError::unavailable(error.to_string())
}

/// Server error code for an operation against a key of the wrong type.
const WRONG_TYPE: &str = "WRONGTYPE";

/// `WRONGTYPE` means the destination key holds something other than a list;
/// retrying cannot help.
fn map_redis_error(error: RedisError) -> LifecycleEventChannelError {
    if error.code() == Some(WRONG_TYPE) {
        LifecycleEventChannelError::rejected(error.to_string())
    } else {
        LifecycleEventChannelError::unavailable(error.to_string())
    }
}

#[async_trait]
impl LifecycleEventChannel for RedisLifecycleEventChannel {
    async fn send(&self, event: &LifecycleEvent) -> Result<(), LifecycleEventChannelError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let destination = event.kind.destination();
        let depth: usize = conn
            .lpush(destination, event.payload())
            .await
            .map_err(map_redis_error)?;
        debug!(
            kind = %event.kind,
            scheduling_id = %event.scheduling_id,
            depth,
            "lifecycle event pushed"
        );
        Ok(())
    }
}
