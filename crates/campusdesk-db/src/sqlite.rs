use async_trait::async_trait;
use campusdesk_models::event::Event;
use campusdesk_models::issue::{Issue, PointAward};
use campusdesk_models::user::User;

use crate::store::{
    EventFilter, EventPatch, IssueFilter, IssuePatch, RequestStore, RewardCredit, RewardOutcome,
    SortOrder,
};
use crate::{events, issues, rewards, users, DbError, DbPool};

/// `RequestStore` backed by the SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for SqliteStore {
    async fn insert_user(&self, user: &User) -> Result<(), DbError> {
        users::create_user(&self.pool, user).await
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, DbError> {
        users::get_user_by_id(&self.pool, user_id).await
    }

    async fn insert_event(&self, event: &Event) -> Result<(), DbError> {
        events::create_event(&self.pool, event).await
    }

    async fn find_event_by_id(&self, event_id: &str) -> Result<Option<Event>, DbError> {
        events::get_event(&self.pool, event_id).await
    }

    async fn find_events(
        &self,
        filter: &EventFilter,
        sort: SortOrder,
    ) -> Result<Vec<Event>, DbError> {
        events::list_events(&self.pool, filter, sort).await
    }

    async fn update_event_by_id(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<Option<Event>, DbError> {
        events::update_event_status(&self.pool, event_id, patch).await
    }

    async fn insert_issue(&self, issue: &Issue) -> Result<(), DbError> {
        issues::create_issue(&self.pool, issue).await
    }

    async fn find_issue_by_id(&self, issue_id: &str) -> Result<Option<Issue>, DbError> {
        issues::get_issue(&self.pool, issue_id).await
    }

    async fn find_issues(
        &self,
        filter: &IssueFilter,
        sort: SortOrder,
    ) -> Result<Vec<Issue>, DbError> {
        issues::list_issues(&self.pool, filter, sort).await
    }

    async fn update_issue_by_id(
        &self,
        issue_id: &str,
        patch: &IssuePatch,
    ) -> Result<Option<Issue>, DbError> {
        issues::update_issue_status(&self.pool, issue_id, patch).await
    }

    async fn credit_reward(
        &self,
        issue_id: &str,
        credit: &RewardCredit,
    ) -> Result<RewardOutcome, DbError> {
        rewards::credit_reward(&self.pool, issue_id, credit).await
    }

    async fn find_awards(&self, student_id: &str) -> Result<Vec<PointAward>, DbError> {
        rewards::list_awards_for_student(&self.pool, student_id).await
    }
}
