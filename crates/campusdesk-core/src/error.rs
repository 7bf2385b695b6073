use campusdesk_db::DbError;
use campusdesk_models::ParseEnumError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("green points already awarded for issue {0}")]
    AlreadyAwarded(String),
    #[error("concurrent write conflict, retry the request")]
    ConflictRetry,
    #[error("store operation timed out")]
    Timeout,
    #[error("database error: {0}")]
    Database(DbError),
}

impl CoreError {
    pub(crate) fn not_found(kind: &str, id: &str) -> Self {
        CoreError::NotFound(format!("{kind} {id}"))
    }

    /// Machine-readable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::InvalidTransition(_) => "INVALID_TRANSITION",
            CoreError::InvalidInput(_) => "INVALID_INPUT",
            CoreError::AlreadyAwarded(_) => "ALREADY_AWARDED",
            CoreError::ConflictRetry => "CONFLICT_RETRY",
            CoreError::Timeout => "TIMEOUT",
            CoreError::Database(_) => "INTERNAL_ERROR",
        }
    }

    /// Only write contention may be retried without the caller changing
    /// anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::ConflictRetry)
    }
}

impl From<DbError> for CoreError {
    fn from(e: DbError) -> Self {
        if e.is_contention() {
            return CoreError::ConflictRetry;
        }
        if e.is_duplicate() {
            return CoreError::InvalidInput(format!("record already exists ({e})"));
        }
        match e {
            DbError::NotFound => CoreError::NotFound("record".into()),
            other => CoreError::Database(other),
        }
    }
}

impl From<ParseEnumError> for CoreError {
    fn from(e: ParseEnumError) -> Self {
        CoreError::InvalidInput(e.to_string())
    }
}
