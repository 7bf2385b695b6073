use campusdesk_db::{EventPatch, IssuePatch};
use campusdesk_models::event::{Event, EventStatus};
use campusdesk_models::issue::{Issue, IssueStatus};
use campusdesk_models::role::{Capabilities, Principal};
use std::fmt;

use crate::access::require_capability;
use crate::error::CoreError;
use crate::DeskState;

/// Event transition table. `Approved` and `Rejected` are terminal and
/// re-applying the current status is not a transition.
pub fn event_transition_allowed(from: EventStatus, to: EventStatus) -> bool {
    match (from, to) {
        (EventStatus::Pending, EventStatus::Approved | EventStatus::Rejected) => true,
        (EventStatus::Pending, EventStatus::Pending) => false,
        (EventStatus::Approved | EventStatus::Rejected, _) => false,
    }
}

/// Issue transition table. `Success` is terminal.
pub fn issue_transition_allowed(from: IssueStatus, to: IssueStatus) -> bool {
    match (from, to) {
        (IssueStatus::Pending, IssueStatus::Success) => true,
        (IssueStatus::Pending, IssueStatus::Pending) => false,
        (IssueStatus::Success, _) => false,
    }
}

fn refused(kind: &str, id: &str, from: impl fmt::Display, to: impl fmt::Display) -> CoreError {
    CoreError::InvalidTransition(format!("{kind} {id} cannot move from {from} to {to}"))
}

/// Approve or reject a pending booking.
pub async fn set_event_status(
    state: &DeskState,
    principal: &Principal,
    event_id: &str,
    status: EventStatus,
) -> Result<Event, CoreError> {
    require_capability(principal, Capabilities::REVIEW_EVENTS, "review events")?;
    let current = state
        .bounded(state.store.find_event_by_id(event_id))
        .await?
        .ok_or_else(|| CoreError::not_found("event", event_id))?;
    if !event_transition_allowed(current.status, status) {
        return Err(refused("event", event_id, current.status, status));
    }

    let patch = EventPatch {
        expected: current.status,
        status,
        updated_at: crate::now(),
    };
    let Some(updated) = state
        .bounded_write(
            Some(current.student_id.as_str()),
            state.store.update_event_by_id(event_id, &patch),
        )
        .await?
    else {
        // Lost the race to another reviewer, or the row vanished.
        let latest = state
            .bounded(state.store.find_event_by_id(event_id))
            .await?
            .ok_or_else(|| CoreError::not_found("event", event_id))?;
        return Err(refused("event", event_id, latest.status, status));
    };

    state.invalidate_totals(&updated.student_id).await;
    tracing::info!(
        event_id,
        reviewer = %principal.user_id,
        status = %updated.status,
        "event reviewed"
    );
    Ok(updated)
}

/// Mark a pending issue resolved.
pub async fn set_issue_status(
    state: &DeskState,
    principal: &Principal,
    issue_id: &str,
    status: IssueStatus,
) -> Result<Issue, CoreError> {
    require_capability(principal, Capabilities::RESOLVE_ISSUES, "resolve issues")?;
    let current = state
        .bounded(state.store.find_issue_by_id(issue_id))
        .await?
        .ok_or_else(|| CoreError::not_found("issue", issue_id))?;
    if !issue_transition_allowed(current.status, status) {
        return Err(refused("issue", issue_id, current.status, status));
    }

    let patch = IssuePatch {
        expected: current.status,
        status,
    };
    let Some(updated) = state
        .bounded_write(
            Some(current.student_id.as_str()),
            state.store.update_issue_by_id(issue_id, &patch),
        )
        .await?
    else {
        let latest = state
            .bounded(state.store.find_issue_by_id(issue_id))
            .await?
            .ok_or_else(|| CoreError::not_found("issue", issue_id))?;
        return Err(refused("issue", issue_id, latest.status, status));
    };

    state.invalidate_totals(&updated.student_id).await;
    tracing::info!(
        issue_id,
        resolver = %principal.user_id,
        status = %updated.status,
        "issue status changed"
    );
    Ok(updated)
}
