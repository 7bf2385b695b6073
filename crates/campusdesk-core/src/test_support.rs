use async_trait::async_trait;
use campusdesk_db::{
    DbError, EventFilter, EventPatch, IssueFilter, IssuePatch, MemoryStore, RequestStore,
    RewardCredit, RewardOutcome, SortOrder,
};
use campusdesk_models::event::{Event, EventPurpose, NewEvent};
use campusdesk_models::issue::{Issue, NewIssue, PointAward};
use campusdesk_models::role::{Principal, Role};
use campusdesk_models::user::{NewUser, User};
use chrono::{Days, NaiveTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::{CoreConfig, DeskState};

/// Wraps a `MemoryStore` and injects failures or latency on demand.
#[derive(Default)]
pub(crate) struct FaultyStore {
    pub inner: MemoryStore,
    pub fail_events: AtomicBool,
    pub fail_issues: AtomicBool,
    pub delay: Option<Duration>,
    /// Extra latency after a write has already been applied, in ms.
    pub write_lag_ms: AtomicU64,
}

impl FaultyStore {
    fn injected(what: &str) -> DbError {
        DbError::Sqlx(sqlx::Error::Protocol(format!("injected {what} failure")))
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn lag_write(&self) {
        let lag = self.write_lag_ms.load(Ordering::SeqCst);
        if lag > 0 {
            tokio::time::sleep(Duration::from_millis(lag)).await;
        }
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> Result<(), DbError> {
        if flag.load(Ordering::SeqCst) {
            return Err(Self::injected(what));
        }
        Ok(())
    }
}

#[async_trait]
impl RequestStore for FaultyStore {
    async fn insert_user(&self, user: &User) -> Result<(), DbError> {
        self.inner.insert_user(user).await
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, DbError> {
        self.pause().await;
        self.inner.find_user_by_id(user_id).await
    }

    async fn insert_event(&self, event: &Event) -> Result<(), DbError> {
        let result = self.inner.insert_event(event).await;
        self.lag_write().await;
        result
    }

    async fn find_event_by_id(&self, event_id: &str) -> Result<Option<Event>, DbError> {
        self.pause().await;
        self.inner.find_event_by_id(event_id).await
    }

    async fn find_events(
        &self,
        filter: &EventFilter,
        sort: SortOrder,
    ) -> Result<Vec<Event>, DbError> {
        self.pause().await;
        self.check(&self.fail_events, "event fetch")?;
        self.inner.find_events(filter, sort).await
    }

    async fn update_event_by_id(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<Option<Event>, DbError> {
        self.pause().await;
        let result = self.inner.update_event_by_id(event_id, patch).await;
        self.lag_write().await;
        result
    }

    async fn insert_issue(&self, issue: &Issue) -> Result<(), DbError> {
        let result = self.inner.insert_issue(issue).await;
        self.lag_write().await;
        result
    }

    async fn find_issue_by_id(&self, issue_id: &str) -> Result<Option<Issue>, DbError> {
        self.pause().await;
        self.inner.find_issue_by_id(issue_id).await
    }

    async fn find_issues(
        &self,
        filter: &IssueFilter,
        sort: SortOrder,
    ) -> Result<Vec<Issue>, DbError> {
        self.pause().await;
        self.check(&self.fail_issues, "issue fetch")?;
        self.inner.find_issues(filter, sort).await
    }

    async fn update_issue_by_id(
        &self,
        issue_id: &str,
        patch: &IssuePatch,
    ) -> Result<Option<Issue>, DbError> {
        self.pause().await;
        let result = self.inner.update_issue_by_id(issue_id, patch).await;
        self.lag_write().await;
        result
    }

    async fn credit_reward(
        &self,
        issue_id: &str,
        credit: &RewardCredit,
    ) -> Result<RewardOutcome, DbError> {
        self.pause().await;
        let result = self.inner.credit_reward(issue_id, credit).await;
        self.lag_write().await;
        result
    }

    async fn find_awards(&self, student_id: &str) -> Result<Vec<PointAward>, DbError> {
        self.pause().await;
        self.inner.find_awards(student_id).await
    }
}

pub(crate) fn memory_state() -> DeskState {
    DeskState::new(Arc::new(MemoryStore::new()), CoreConfig::default())
}

pub(crate) fn faulty_state(store: Arc<FaultyStore>, config: CoreConfig) -> DeskState {
    DeskState::new(store, config)
}

pub(crate) fn student(id: &str) -> Principal {
    Principal::new(id, Role::Student)
}

pub(crate) fn faculty() -> Principal {
    Principal::new("f1", Role::Faculty)
}

pub(crate) fn admin() -> Principal {
    Principal::new("a1", Role::Admin)
}

pub(crate) fn maintenance() -> Principal {
    Principal::new("m1", Role::Maintenance)
}

/// Store a user with a fixed id, bypassing id generation.
pub(crate) async fn seed_user(state: &DeskState, id: &str, role: Role) {
    let user = User {
        id: id.to_string(),
        name: format!("user {id}"),
        email: format!("{id}@campus.example"),
        role,
        green_point: 0,
        created_at: Utc::now(),
    };
    state.store.insert_user(&user).await.unwrap();
}

pub(crate) fn new_user(name: &str, email: &str, role: Role) -> NewUser {
    NewUser {
        name: name.into(),
        email: email.into(),
        role,
    }
}

/// A valid booking one week out.
pub(crate) fn new_event(title: &str) -> NewEvent {
    NewEvent {
        title: title.into(),
        description: "quarterly review".into(),
        date: Utc::now().date_naive() + Days::new(7),
        start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        expected_participants: 40,
        purpose: EventPurpose::Meeting,
    }
}

pub(crate) fn new_issue(title: &str) -> NewIssue {
    NewIssue {
        issue_type: "electrical".into(),
        title: title.into(),
        description: "flickering lights in room 204".into(),
    }
}
