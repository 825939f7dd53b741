//! Caching Conference DAO
//!
//! Decorator consulting the shared cache before delegating to the wrapped
//! conference read model.
//!
//! Entries age out only through expiration; readers may observe data that is
//! stale by at most the expiration window. Two concurrent misses on the same
//! key may both reach the inner DAO, and the last write wins.

use crate::domain::entities::{ConferenceAlias, ConferenceDetails, SeatType};
use crate::domain::ports::{ConferenceDao, DataAccessError, Disposable};
use crate::infrastructure::SharedCache;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Cache-backed `ConferenceDao`.
pub struct CachingConferenceDao {
    inner: Arc<dyn ConferenceDao>,
    cache: Arc<SharedCache>,
    seat_types_ttl: Duration,
}

impl CachingConferenceDao {
    /// Wrap `inner`. Conference details and aliases use the cache's default
    /// expiration; seat types use `seat_types_ttl`.
    pub fn new(
        inner: Arc<dyn ConferenceDao>,
        cache: Arc<SharedCache>,
        seat_types_ttl: Duration,
    ) -> Self {
        Self {
            inner,
            cache,
            seat_types_ttl,
        }
    }

    pub fn cache(&self) -> &Arc<SharedCache> {
        &self.cache
    }

    /// Serve `key` from the cache, or load it and remember found values.
    async fn lookup<T, F, Fut>(
        &self,
        key: String,
        ttl: Duration,
        load: F,
    ) -> Result<Option<T>, DataAccessError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, DataAccessError>>,
    {
        if let Some(hit) = self.cache.get::<T>(&key) {
            tracing::trace!(%key, "read model cache hit");
            return Ok(Some(hit));
        }

        tracing::trace!(%key, "read model cache miss");
        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.cache.insert_with_ttl(key, value.clone(), ttl);
        }
        Ok(loaded)
    }
}

impl Disposable for CachingConferenceDao {
    fn dispose(&self) -> anyhow::Result<()> {
        self.inner.dispose()
    }
}

#[async_trait]
impl ConferenceDao for CachingConferenceDao {
    async fn get_conference_details(
        &self,
        conference_code: &str,
    ) -> Result<Option<ConferenceDetails>, DataAccessError> {
        let key = format!("ConferenceDetails_{}", conference_code);
        self.lookup(key, self.cache.default_ttl(), || {
            self.inner.get_conference_details(conference_code)
        })
        .await
    }

    async fn get_conference_alias(
        &self,
        conference_code: &str,
    ) -> Result<Option<ConferenceAlias>, DataAccessError> {
        let key = format!("ConferenceAlias_{}", conference_code);
        self.lookup(key, self.cache.default_ttl(), || {
            self.inner.get_conference_alias(conference_code)
        })
        .await
    }

    async fn get_published_seat_types(
        &self,
        conference_id: Uuid,
    ) -> Result<Vec<SeatType>, DataAccessError> {
        let key = format!("ConferenceSeatTypes_{}", conference_id);
        let seats = self
            .lookup(key, self.seat_types_ttl, || async {
                self.inner
                    .get_published_seat_types(conference_id)
                    .await
                    .map(Some)
            })
            .await?;
        Ok(seats.unwrap_or_default())
    }
}
