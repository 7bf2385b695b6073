use async_trait::async_trait;
use campusdesk_models::event::Event;
use campusdesk_models::issue::{Issue, PointAward};
use campusdesk_models::user::User;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::cmp::Ordering;

use crate::store::{
    EventFilter, EventPatch, IssueFilter, IssuePatch, RequestStore, RewardCredit, RewardOutcome,
    SortOrder,
};
use crate::users::normalize_email;
use crate::DbError;

/// Process-local `RequestStore` for tests and embedding.
///
/// Per-record serialisation comes from dashmap's shard write guards. The
/// reward path always locks the issue entry before the user entry and no
/// other path holds a user guard while taking an issue guard.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    emails: DashMap<String, String>,
    events: DashMap<String, Event>,
    issues: DashMap<String, Issue>,
    awards: DashMap<String, PointAward>,
}

fn duplicate(what: &str, id: &str) -> DbError {
    DbError::Duplicate(format!("{what} {id}"))
}

fn created_order(a: (&DateTime<Utc>, &str), b: (&DateTime<Utc>, &str)) -> Ordering {
    a.0.cmp(b.0).then_with(|| a.1.cmp(b.1))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), DbError> {
        if user.green_point < 0 {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(
                "green_point must be non-negative".to_string(),
            )));
        }
        let email = normalize_email(&user.email);
        match self.emails.entry(email.clone()) {
            Entry::Occupied(_) => return Err(duplicate("email", &email)),
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
            }
        }
        match self.users.entry(user.id.clone()) {
            Entry::Occupied(_) => {
                self.emails.remove(&email);
                Err(duplicate("user", &user.id))
            }
            Entry::Vacant(slot) => {
                slot.insert(User {
                    email,
                    ..user.clone()
                });
                Ok(())
            }
        }
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, DbError> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn insert_event(&self, event: &Event) -> Result<(), DbError> {
        match self.events.entry(event.id.clone()) {
            Entry::Occupied(_) => Err(duplicate("event", &event.id)),
            Entry::Vacant(slot) => {
                slot.insert(event.clone());
                Ok(())
            }
        }
    }

    async fn find_event_by_id(&self, event_id: &str) -> Result<Option<Event>, DbError> {
        Ok(self.events.get(event_id).map(|e| e.value().clone()))
    }

    async fn find_events(
        &self,
        filter: &EventFilter,
        sort: SortOrder,
    ) -> Result<Vec<Event>, DbError> {
        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        match sort {
            SortOrder::Newest => events.sort_by(|a, b| {
                created_order((&b.created_at, b.id.as_str()), (&a.created_at, a.id.as_str()))
            }),
            SortOrder::Oldest => events.sort_by(|a, b| {
                created_order((&a.created_at, a.id.as_str()), (&b.created_at, b.id.as_str()))
            }),
            SortOrder::Schedule => events.sort_by(|a, b| {
                (a.date, a.start_time, a.created_at).cmp(&(b.date, b.start_time, b.created_at))
            }),
        }
        Ok(events)
    }

    async fn update_event_by_id(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<Option<Event>, DbError> {
        let Some(mut event) = self.events.get_mut(event_id) else {
            return Ok(None);
        };
        if event.status != patch.expected {
            return Ok(None);
        }
        event.status = patch.status;
        event.updated_at = patch.updated_at;
        Ok(Some(event.clone()))
    }

    async fn insert_issue(&self, issue: &Issue) -> Result<(), DbError> {
        match self.issues.entry(issue.id.clone()) {
            Entry::Occupied(_) => Err(duplicate("issue", &issue.id)),
            Entry::Vacant(slot) => {
                slot.insert(issue.clone());
                Ok(())
            }
        }
    }

    async fn find_issue_by_id(&self, issue_id: &str) -> Result<Option<Issue>, DbError> {
        Ok(self.issues.get(issue_id).map(|i| i.value().clone()))
    }

    async fn find_issues(
        &self,
        filter: &IssueFilter,
        sort: SortOrder,
    ) -> Result<Vec<Issue>, DbError> {
        let mut issues: Vec<Issue> = self
            .issues
            .iter()
            .filter(|i| filter.matches(i.value()))
            .map(|i| i.value().clone())
            .collect();
        match sort {
            SortOrder::Newest => issues.sort_by(|a, b| {
                created_order((&b.created_at, b.id.as_str()), (&a.created_at, a.id.as_str()))
            }),
            SortOrder::Oldest | SortOrder::Schedule => issues.sort_by(|a, b| {
                created_order((&a.created_at, a.id.as_str()), (&b.created_at, b.id.as_str()))
            }),
        }
        Ok(issues)
    }

    async fn update_issue_by_id(
        &self,
        issue_id: &str,
        patch: &IssuePatch,
    ) -> Result<Option<Issue>, DbError> {
        let Some(mut issue) = self.issues.get_mut(issue_id) else {
            return Ok(None);
        };
        if issue.status != patch.expected {
            return Ok(None);
        }
        issue.status = patch.status;
        Ok(Some(issue.clone()))
    }

    async fn credit_reward(
        &self,
        issue_id: &str,
        credit: &RewardCredit,
    ) -> Result<RewardOutcome, DbError> {
        if credit.points <= 0 {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(
                "points must be positive".to_string(),
            )));
        }
        let Some(mut issue) = self.issues.get_mut(issue_id) else {
            return Ok(RewardOutcome::IssueMissing);
        };
        if issue.points_given {
            return Ok(RewardOutcome::AlreadyAwarded);
        }
        if credit.require_resolved && !issue.status.is_resolved() {
            return Ok(RewardOutcome::NotResolved);
        }
        let Some(mut student) = self.users.get_mut(&issue.student_id) else {
            return Ok(RewardOutcome::StudentMissing);
        };
        let Some(green_point) = student.green_point.checked_add(credit.points) else {
            return Ok(RewardOutcome::BalanceOverflow);
        };

        student.green_point = green_point;
        issue.points_given = true;
        self.awards.insert(
            issue_id.to_string(),
            PointAward {
                issue_id: issue_id.to_string(),
                student_id: issue.student_id.clone(),
                points: credit.points,
                awarded_by: credit.awarded_by.clone(),
                awarded_at: credit.awarded_at,
            },
        );
        Ok(RewardOutcome::Credited {
            student_id: issue.student_id.clone(),
            green_point,
        })
    }

    async fn find_awards(&self, student_id: &str) -> Result<Vec<PointAward>, DbError> {
        let mut awards: Vec<PointAward> = self
            .awards
            .iter()
            .filter(|a| a.student_id == student_id)
            .map(|a| a.value().clone())
            .collect();
        awards.sort_by(|a, b| {
            created_order((&b.awarded_at, b.issue_id.as_str()), (&a.awarded_at, a.issue_id.as_str()))
        });
        Ok(awards)
    }
}
