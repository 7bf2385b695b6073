use campusdesk_db::{EventFilter, IssueFilter, SortOrder};
use campusdesk_models::event::{Event, EventStatus};
use campusdesk_models::issue::{Issue, IssueStatus};
use campusdesk_models::role::{Capabilities, Principal};
use campusdesk_models::totals::{RequestTotals, TotalsScope};

use crate::access::{require_capability, require_student_access};
use crate::error::CoreError;
use crate::DeskState;

/// Count requests by outcome. Rejected events only add to the total.
pub fn fold_totals(events: &[Event], issues: &[Issue]) -> RequestTotals {
    let mut totals = RequestTotals {
        total_requests: (events.len() + issues.len()) as u64,
        ..RequestTotals::default()
    };
    for event in events {
        match event.status {
            EventStatus::Approved => totals.total_success += 1,
            EventStatus::Pending => totals.total_pending += 1,
            EventStatus::Rejected => {}
        }
    }
    for issue in issues {
        match issue.status {
            IssueStatus::Success => totals.total_success += 1,
            IssueStatus::Pending => totals.total_pending += 1,
        }
    }
    totals
}

fn authorize_scope(principal: &Principal, scope: &TotalsScope) -> Result<(), CoreError> {
    match scope {
        TotalsScope::Student(student_id) => require_student_access(principal, student_id),
        TotalsScope::All => require_capability(
            principal,
            Capabilities::VIEW_GLOBAL_TOTALS,
            "view campus-wide totals",
        ),
    }
}

/// Dashboard totals for a scope, served from the cache when possible.
pub async fn compute_totals(
    state: &DeskState,
    principal: &Principal,
    scope: TotalsScope,
) -> Result<RequestTotals, CoreError> {
    authorize_scope(principal, &scope)?;
    if let Some(totals) = state.totals_cache.get(&scope).await {
        tracing::debug!(?scope, "totals cache hit");
        return Ok(totals);
    }

    let epoch = state.totals_epoch();
    let (totals, degraded) = fetch_totals(state, &scope).await?;
    if !degraded && state.totals_epoch() == epoch {
        state.totals_cache.insert(scope.clone(), totals).await;
        // An invalidation between the check and the insert would be lost.
        if state.totals_epoch() != epoch {
            state.totals_cache.invalidate(&scope).await;
        }
    }
    Ok(totals)
}

/// Fetch both collections concurrently. One failed side counts as empty and
/// marks the result degraded; two failures are an error.
async fn fetch_totals(
    state: &DeskState,
    scope: &TotalsScope,
) -> Result<(RequestTotals, bool), CoreError> {
    let event_filter = EventFilter {
        student_id: scope.student_id().map(str::to_string),
        ..EventFilter::default()
    };
    let issue_filter = IssueFilter {
        student_id: scope.student_id().map(str::to_string),
        ..IssueFilter::default()
    };
    let (events, issues) = tokio::join!(
        state.bounded(state.store.find_events(&event_filter, SortOrder::Newest)),
        state.bounded(state.store.find_issues(&issue_filter, SortOrder::Newest)),
    );

    match (events, issues) {
        (Ok(events), Ok(issues)) => Ok((fold_totals(&events, &issues), false)),
        (Ok(events), Err(err)) => {
            tracing::warn!(?scope, error = %err, "issue fetch failed, totals count events only");
            Ok((fold_totals(&events, &[]), true))
        }
        (Err(err), Ok(issues)) => {
            tracing::warn!(?scope, error = %err, "event fetch failed, totals count issues only");
            Ok((fold_totals(&[], &issues), true))
        }
        (Err(event_err), Err(issue_err)) => {
            tracing::error!(?scope, %event_err, %issue_err, "totals unavailable");
            Err(event_err)
        }
    }
}
