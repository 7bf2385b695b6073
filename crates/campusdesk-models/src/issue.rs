use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueStatus {
    Pending,
    /// Resolved by maintenance.
    Success,
}

impl IssueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Pending => "Pending",
            IssueStatus::Success => "Success",
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, IssueStatus::Success)
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(IssueStatus::Pending),
            "Success" => Ok(IssueStatus::Success),
            other => Err(ParseEnumError::new("issue status", other)),
        }
    }
}

/// A maintenance report submitted by a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub issue_type: String,
    pub title: String,
    pub description: String,
    pub student_id: String,
    pub status: IssueStatus,
    pub points_given: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIssue {
    pub issue_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Ledger entry written when green points are credited for an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointAward {
    pub issue_id: String,
    pub student_id: String,
    pub points: i64,
    pub awarded_by: String,
    pub awarded_at: DateTime<Utc>,
}
