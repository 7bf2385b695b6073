use async_trait::async_trait;
use campusdesk_models::event::{Event, EventStatus};
use campusdesk_models::issue::{Issue, IssueStatus, PointAward};
use campusdesk_models::user::User;
use chrono::{DateTime, NaiveDate, Utc};

use crate::DbError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// `created_at` descending.
    #[default]
    Newest,
    /// `created_at` ascending.
    Oldest,
    /// `date`, then `start_time`, ascending. Issues have no schedule and fall
    /// back to `Oldest`.
    Schedule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub student_id: Option<String>,
    pub status: Option<EventStatus>,
    /// Inclusive lower bound on the booked date.
    pub date_from: Option<NaiveDate>,
}

impl EventFilter {
    pub fn for_student(student_id: impl Into<String>) -> Self {
        Self {
            student_id: Some(student_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.student_id
            .as_deref()
            .is_none_or(|id| event.student_id == id)
            && self.status.is_none_or(|status| event.status == status)
            && self.date_from.is_none_or(|from| event.date >= from)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilter {
    pub student_id: Option<String>,
    pub status: Option<IssueStatus>,
}

impl IssueFilter {
    pub fn for_student(student_id: impl Into<String>) -> Self {
        Self {
            student_id: Some(student_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, issue: &Issue) -> bool {
        self.student_id
            .as_deref()
            .is_none_or(|id| issue.student_id == id)
            && self.status.is_none_or(|status| issue.status == status)
    }
}

/// Guarded status write: applied only while the stored status still equals
/// `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPatch {
    pub expected: EventStatus,
    pub status: EventStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuePatch {
    pub expected: IssueStatus,
    pub status: IssueStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardCredit {
    pub points: i64,
    pub awarded_by: String,
    pub awarded_at: DateTime<Utc>,
    /// Refuse the credit unless the issue is already resolved.
    pub require_resolved: bool,
}

/// Result of the atomic flag-and-credit operation. Every variant other than
/// `Credited` leaves the store untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardOutcome {
    Credited { student_id: String, green_point: i64 },
    IssueMissing,
    AlreadyAwarded,
    NotResolved,
    StudentMissing,
    /// The credit would push the balance past `i64::MAX`.
    BalanceOverflow,
}

/// Collection operations the request engine is written against.
///
/// Implementations must apply `update_*_by_id` as a compare-and-swap on the
/// status and must apply `credit_reward` as a single atomic unit.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), DbError>;
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, DbError>;

    async fn insert_event(&self, event: &Event) -> Result<(), DbError>;
    async fn find_event_by_id(&self, event_id: &str) -> Result<Option<Event>, DbError>;
    async fn find_events(&self, filter: &EventFilter, sort: SortOrder)
        -> Result<Vec<Event>, DbError>;
    /// Returns `None` when the event is missing or the guard did not match.
    async fn update_event_by_id(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<Option<Event>, DbError>;

    async fn insert_issue(&self, issue: &Issue) -> Result<(), DbError>;
    async fn find_issue_by_id(&self, issue_id: &str) -> Result<Option<Issue>, DbError>;
    async fn find_issues(&self, filter: &IssueFilter, sort: SortOrder)
        -> Result<Vec<Issue>, DbError>;
    async fn update_issue_by_id(
        &self,
        issue_id: &str,
        patch: &IssuePatch,
    ) -> Result<Option<Issue>, DbError>;

    /// Flip `points_given`, credit the student and record the award, or do
    /// nothing at all.
    async fn credit_reward(
        &self,
        issue_id: &str,
        credit: &RewardCredit,
    ) -> Result<RewardOutcome, DbError>;
    /// Newest first.
    async fn find_awards(&self, student_id: &str) -> Result<Vec<PointAward>, DbError>;
}
