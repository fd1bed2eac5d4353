//! Port for the TTL cache of materialised scheduling views.
//!
//! Values are always replaced wholesale. Expiry is enforced by the backing
//! store; callers only supply the time-to-live.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::SchedulingView;

use super::{SchedulingCacheKey, define_port_error};

define_port_error! {
    /// Errors surfaced by the caching adapter.
    pub enum SchedulingCacheError {
        /// Cache backend is unavailable or timing out.
        Backend { message: String } => "scheduling cache backend failure: {message}",
        /// Serialisation or deserialisation of cached content failed.
        Serialization { message: String } =>
            "scheduling cache serialisation failed: {message}",
    }
}

/// String-keyed view cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulingCache: Send + Sync {
    /// Read a cached view.
    async fn get(
        &self,
        key: &SchedulingCacheKey,
    ) -> Result<Option<SchedulingView>, SchedulingCacheError>;

    /// Store a view under `key`, expiring after `ttl`.
    async fn put(
        &self,
        key: &SchedulingCacheKey,
        view: &SchedulingView,
        ttl: Duration,
    ) -> Result<(), SchedulingCacheError>;

    /// Remove the entry for `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &SchedulingCacheKey) -> Result<(), SchedulingCacheError>;
}

/// Cache that never stores anything; every read is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSchedulingCache;

#[async_trait]
impl SchedulingCache for NoOpSchedulingCache {
    async fn get(
        &self,
        _key: &SchedulingCacheKey,
    ) -> Result<Option<SchedulingView>, SchedulingCacheError> {
        Ok(None)
    }

    async fn put(
        &self,
        _key: &SchedulingCacheKey,
        _view: &SchedulingView,
        _ttl: Duration,
    ) -> Result<(), SchedulingCacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &SchedulingCacheKey) -> Result<(), SchedulingCacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::SchedulingId;

    #[rstest]
    #[tokio::test]
    async fn noop_cache_always_misses() {
        let key = SchedulingCacheKey::for_scheduling(SchedulingId::new(9));
        let cache = NoOpSchedulingCache;
        cache.delete(&key).await.expect("noop delete");
        assert!(cache.get(&key).await.expect("noop get").is_none());
    }
}
