pub mod events;
pub mod issues;
pub mod memory;
pub mod rewards;
pub mod sqlite;
pub mod store;
pub mod users;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{
    EventFilter, EventPatch, IssueFilter, IssuePatch, RequestStore, RewardCredit, RewardOutcome,
    SortOrder,
};

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub type DbPool = sqlx::SqlitePool;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite primary result codes that signal write contention rather than a
/// broken query: BUSY, LOCKED and their extended forms.
const CONTENTION_CODES: [&str; 5] = ["5", "6", "261", "262", "517"];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("not found")]
    NotFound,
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("duplicate {0}")]
    Duplicate(String),
}

impl DbError {
    /// True when the failure came from concurrent writers and the same call
    /// may succeed if retried.
    pub fn is_contention(&self) -> bool {
        match self {
            DbError::Sqlx(sqlx::Error::Database(db_err)) => db_err
                .code()
                .is_some_and(|code| CONTENTION_CODES.contains(&&*code)),
            DbError::Sqlx(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }

    /// True for unique-key collisions from either engine.
    pub fn is_duplicate(&self) -> bool {
        match self {
            DbError::Duplicate(_) => true,
            DbError::Sqlx(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations: applied successfully");
    Ok(())
}

/// Fixed-width UTC text so that `ORDER BY created_at` sorts chronologically.
pub(crate) fn datetime_to_db_text(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn datetime_from_db_text(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

pub(crate) fn date_to_db_text(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_db_text(raw: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DbError::Corrupt(format!("date {raw:?}: {e}")))
}

pub(crate) fn time_to_db_text(value: NaiveTime) -> String {
    value.format("%H:%M:%S").to_string()
}

pub(crate) fn time_from_db_text(raw: &str) -> Result<NaiveTime, DbError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .map_err(|e| DbError::Corrupt(format!("time {raw:?}: {e}")))
}

pub(crate) fn parse_column<T>(raw: &str) -> Result<T, DbError>
where
    T: FromStr<Err = campusdesk_models::ParseEnumError>,
{
    raw.parse::<T>().map_err(|e| DbError::Corrupt(e.to_string()))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> DbPool {
    let pool = create_pool("sqlite::memory:", 1).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
