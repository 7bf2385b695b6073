pub mod event;
pub mod issue;
pub mod role;
pub mod totals;
pub mod user;

use thiserror::Error;

/// A status, role or purpose string that is not part of its closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
