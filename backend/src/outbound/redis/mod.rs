//! Shared Redis connection pool for the cache and event channel adapters.
//!
//! Mirrors the PostgreSQL pool: a cloneable wrapper around `bb8` that maps
//! build and checkout failures into [`RedisPoolError`].

use std::time::Duration;

use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::redis::{self, AsyncCommands};

/// Errors raised while building or using the Redis pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RedisPoolError {
    /// Failed to check out a connection from the pool.
    #[error("failed to get redis connection from pool: {message}")]
    Checkout { message: String },

    /// Failed to build the connection pool.
    #[error("failed to build redis pool: {message}")]
    Build { message: String },
}

impl RedisPoolError {
    /// Create a checkout error with the given message.
    pub fn checkout(message: impl Into<String>) -> Self {
        Self::Checkout {
            message: message.into(),
        }
    }

    /// Create a build error with the given message.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }
}

/// Cloneable Redis pool.
#[derive(Clone)]
pub struct RedisPool {
    inner: Pool<RedisConnectionManager>,
}

impl RedisPool {
    /// Build a pool for `redis_url` with at most `max_size` connections.
    ///
    /// # Errors
    ///
    /// Returns [`RedisPoolError::Build`] for an invalid URL or when the first
    /// connection cannot be opened.
    pub async fn connect(
        redis_url: &str,
        max_size: u32,
        connection_timeout: Duration,
    ) -> Result<Self, RedisPoolError> {
        let manager = RedisConnectionManager::new(redis_url)
            .map_err(|err| RedisPoolError::build(err.to_string()))?;
        let inner = Pool::builder()
            .max_size(max_size)
            .connection_timeout(connection_timeout)
            .build(manager)
            .await
            .map_err(|err| RedisPoolError::build(err.to_string()))?;
        Ok(Self { inner })
    }

    /// Check out a connection.
    ///
    /// # Errors
    ///
    /// Returns [`RedisPoolError::Checkout`] when no connection is available
    /// within the configured timeout.
    pub async fn get(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, RedisPoolError> {
        self.inner
            .get()
            .await
            .map_err(|err| RedisPoolError::checkout(err.to_string()))
    }

    /// Round-trip a `PING`.
    ///
    /// # Errors
    ///
    /// Returns [`RedisPoolError::Checkout`] when the server does not answer.
    pub async fn ping(&self) -> Result<(), RedisPoolError> {
        let mut conn = self.get().await?;
        let _: String = conn
            .ping()
            .await
            .map_err(|err: redis::RedisError| {
                RedisPoolError::checkout(format!("ping failed: {err}"))
            })?;
        Ok(())
    }
}
