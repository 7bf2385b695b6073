use campusdesk_db::{EventFilter, IssueFilter, SortOrder};
use campusdesk_models::event::{Event, EventStatus, NewEvent};
use campusdesk_models::issue::{Issue, IssueStatus, NewIssue};
use campusdesk_models::role::{Capabilities, Principal};
use campusdesk_models::user::{NewUser, User};
use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::access::{require_capability, require_student_access};
use crate::error::CoreError;
use crate::DeskState;

pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;
pub const MAX_ISSUE_TYPE_CHARS: usize = 60;
pub const MAX_NAME_CHARS: usize = 120;

fn bounded_text(field: &str, value: &str, min: usize, max: usize) -> Result<String, CoreError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(CoreError::InvalidInput(if min > 0 {
            format!("{field} must be {min}-{max} characters")
        } else {
            format!("{field} must be at most {max} characters")
        }));
    }
    Ok(trimmed.to_string())
}

fn whole_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

/// Check a booking against `today` and normalise its text and times.
pub fn validate_event(input: NewEvent, today: NaiveDate) -> Result<NewEvent, CoreError> {
    let title = bounded_text("title", &input.title, 1, MAX_TITLE_CHARS)?;
    let description = bounded_text("description", &input.description, 0, MAX_DESCRIPTION_CHARS)?;
    if input.expected_participants == 0 {
        return Err(CoreError::InvalidInput(
            "expectedParticipants must be greater than zero".into(),
        ));
    }
    let start_time = whole_seconds(input.start_time);
    let end_time = whole_seconds(input.end_time);
    if start_time >= end_time {
        return Err(CoreError::InvalidInput(format!(
            "startTime {start_time} must be before endTime {end_time}"
        )));
    }
    if input.date < today {
        return Err(CoreError::InvalidInput(format!(
            "date {} is in the past",
            input.date
        )));
    }
    Ok(NewEvent {
        title,
        description,
        start_time,
        end_time,
        ..input
    })
}

pub fn validate_issue(input: NewIssue) -> Result<NewIssue, CoreError> {
    Ok(NewIssue {
        issue_type: bounded_text("issueType", &input.issue_type, 1, MAX_ISSUE_TYPE_CHARS)?,
        title: bounded_text("title", &input.title, 1, MAX_TITLE_CHARS)?,
        description: bounded_text("description", &input.description, 0, MAX_DESCRIPTION_CHARS)?,
    })
}

/// Provision a user record as handed over by the identity provider.
pub async fn register_user(state: &DeskState, input: NewUser) -> Result<User, CoreError> {
    let name = bounded_text("name", &input.name, 1, MAX_NAME_CHARS)?;
    let email = input.email.trim().to_string();
    if !email.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(CoreError::InvalidInput(format!("invalid email {email:?}")));
    }
    let user = User {
        id: crate::new_id(),
        name,
        email,
        role: input.role,
        green_point: 0,
        created_at: crate::now(),
    };
    state.bounded(state.store.insert_user(&user)).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "user registered");
    Ok(user)
}

/// Submit a venue booking. It starts `Pending`.
pub async fn create_event(
    state: &DeskState,
    principal: &Principal,
    input: NewEvent,
) -> Result<Event, CoreError> {
    require_capability(principal, Capabilities::SUBMIT_REQUESTS, "submit event requests")?;
    let now = crate::now();
    let draft = validate_event(input, now.date_naive())?;
    let event = Event {
        id: crate::new_id(),
        title: draft.title,
        description: draft.description,
        date: draft.date,
        start_time: draft.start_time,
        end_time: draft.end_time,
        expected_participants: draft.expected_participants,
        purpose: draft.purpose,
        student_id: principal.user_id.clone(),
        status: EventStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    state
        .bounded_write(Some(event.student_id.as_str()), state.store.insert_event(&event))
        .await?;
    state.invalidate_totals(&event.student_id).await;
    tracing::info!(event_id = %event.id, student_id = %event.student_id, "event request submitted");
    Ok(event)
}

/// Report a maintenance issue. It starts `Pending` with no points given.
pub async fn create_issue(
    state: &DeskState,
    principal: &Principal,
    input: NewIssue,
) -> Result<Issue, CoreError> {
    require_capability(principal, Capabilities::SUBMIT_REQUESTS, "report issues")?;
    let draft = validate_issue(input)?;
    let issue = Issue {
        id: crate::new_id(),
        issue_type: draft.issue_type,
        title: draft.title,
        description: draft.description,
        student_id: principal.user_id.clone(),
        status: IssueStatus::Pending,
        points_given: false,
        created_at: crate::now(),
    };
    state
        .bounded_write(Some(issue.student_id.as_str()), state.store.insert_issue(&issue))
        .await?;
    state.invalidate_totals(&issue.student_id).await;
    tracing::info!(issue_id = %issue.id, student_id = %issue.student_id, "issue reported");
    Ok(issue)
}

pub async fn student_events(
    state: &DeskState,
    principal: &Principal,
    student_id: &str,
) -> Result<Vec<Event>, CoreError> {
    require_student_access(principal, student_id)?;
    let filter = EventFilter::for_student(student_id);
    state
        .bounded(state.store.find_events(&filter, SortOrder::Newest))
        .await
}

pub async fn student_issues(
    state: &DeskState,
    principal: &Principal,
    student_id: &str,
) -> Result<Vec<Issue>, CoreError> {
    require_student_access(principal, student_id)?;
    let filter = IssueFilter::for_student(student_id);
    state
        .bounded(state.store.find_issues(&filter, SortOrder::Newest))
        .await
}

pub async fn all_events(state: &DeskState, principal: &Principal) -> Result<Vec<Event>, CoreError> {
    require_capability(principal, Capabilities::VIEW_ALL_EVENTS, "list all events")?;
    state
        .bounded(state.store.find_events(&EventFilter::default(), SortOrder::Newest))
        .await
}

pub async fn all_issues(state: &DeskState, principal: &Principal) -> Result<Vec<Issue>, CoreError> {
    require_capability(principal, Capabilities::VIEW_ALL_ISSUES, "list all issues")?;
    state
        .bounded(state.store.find_issues(&IssueFilter::default(), SortOrder::Newest))
        .await
}

/// Approved bookings from today onwards, in the order they happen.
pub async fn upcoming_events(
    state: &DeskState,
    principal: &Principal,
) -> Result<Vec<Event>, CoreError> {
    require_capability(principal, Capabilities::VIEW_SCHEDULE, "view the schedule")?;
    let filter = EventFilter {
        status: Some(EventStatus::Approved),
        date_from: Some(crate::now().date_naive()),
        ..EventFilter::default()
    };
    let events = state
        .bounded(state.store.find_events(&filter, SortOrder::Schedule))
        .await?;
    tracing::debug!(count = events.len(), "upcoming events loaded");
    Ok(events)
}

pub async fn user_name(
    state: &DeskState,
    _principal: &Principal,
    user_id: &str,
) -> Result<String, CoreError> {
    state
        .bounded(state.store.find_user_by_id(user_id))
        .await?
        .map(|user| user.name)
        .ok_or_else(|| CoreError::not_found("user", user_id))
}
