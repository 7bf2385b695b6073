use serde::{Deserialize, Serialize};

/// Which requests a rollup covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TotalsScope {
    Student(String),
    All,
}

impl TotalsScope {
    pub fn student_id(&self) -> Option<&str> {
        match self {
            TotalsScope::Student(id) => Some(id),
            TotalsScope::All => None,
        }
    }
}

/// Dashboard counters across events and issues.
///
/// Rejected events only count toward `total_requests`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTotals {
    pub total_requests: u64,
    pub total_success: u64,
    pub total_pending: u64,
}
