pub mod access;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod requests;
pub mod totals;

#[cfg(test)]
pub(crate) mod test_support;

use campusdesk_db::{DbError, RequestStore};
use campusdesk_models::totals::{RequestTotals, TotalsScope};
use chrono::{DateTime, SubsecRound, Utc};
use error::CoreError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Engine tunables. The binary fills these from the `[engine]` config table.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    pub operation_timeout: Duration,
    pub totals_cache_ttl: Duration,
    pub totals_cache_capacity: u64,
    /// Refuse awards for issues that are not yet `Success`.
    pub award_requires_resolution: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
            totals_cache_ttl: Duration::from_secs(60),
            totals_cache_capacity: 10_000,
            award_requires_resolution: true,
        }
    }
}

/// Build the totals cache, bounded by entry count and TTL.
pub fn build_totals_cache(config: &CoreConfig) -> moka::future::Cache<TotalsScope, RequestTotals> {
    moka::future::Cache::builder()
        .max_capacity(config.totals_cache_capacity)
        .time_to_live(config.totals_cache_ttl)
        .build()
}

#[derive(Clone)]
pub struct DeskState {
    pub store: Arc<dyn RequestStore>,
    pub config: CoreConfig,
    /// Read-through totals per scope. Never authoritative.
    pub totals_cache: moka::future::Cache<TotalsScope, RequestTotals>,
    /// Bumped on every invalidation so a fill that raced a mutation is
    /// discarded instead of cached.
    totals_epoch: Arc<AtomicU64>,
}

impl DeskState {
    pub fn new(store: Arc<dyn RequestStore>, config: CoreConfig) -> Self {
        let totals_cache = build_totals_cache(&config);
        Self {
            store,
            config,
            totals_cache,
            totals_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run one store call under the operation timeout. Expiry drops the
    /// future, which rolls back any transaction it had open.
    pub(crate) async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, DbError>>,
    ) -> Result<T, CoreError> {
        match tokio::time::timeout(self.config.operation_timeout, call).await {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.operation_timeout.as_millis() as u64,
                    "store call timed out"
                );
                Err(CoreError::Timeout)
            }
        }
    }

    /// `bounded` for mutating calls. A failed or timed-out write may still
    /// have reached the store, so cached totals for `student_id` (or, when the
    /// owner is not known up front, every scope) are dropped on error.
    pub(crate) async fn bounded_write<T>(
        &self,
        student_id: Option<&str>,
        call: impl Future<Output = Result<T, DbError>>,
    ) -> Result<T, CoreError> {
        let result = self.bounded(call).await;
        if result.is_err() {
            match student_id {
                Some(student_id) => self.invalidate_totals(student_id).await,
                None => self.invalidate_all_totals(),
            }
        }
        result
    }

    pub(crate) fn totals_epoch(&self) -> u64 {
        self.totals_epoch.load(Ordering::Acquire)
    }

    /// Drop cached totals for the student and for the global rollup.
    pub async fn invalidate_totals(&self, student_id: &str) {
        self.totals_epoch.fetch_add(1, Ordering::AcqRel);
        self.totals_cache
            .invalidate(&TotalsScope::Student(student_id.to_string()))
            .await;
        self.totals_cache.invalidate(&TotalsScope::All).await;
    }

    pub fn invalidate_all_totals(&self) {
        self.totals_epoch.fetch_add(1, Ordering::AcqRel);
        self.totals_cache.invalidate_all();
    }
}

/// Current time at the microsecond precision both stores persist.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
