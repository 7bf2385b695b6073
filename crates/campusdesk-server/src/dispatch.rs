use campusdesk_core::error::CoreError;
use campusdesk_core::ledger::{self, AwardReceipt};
use campusdesk_core::{lifecycle, requests, totals, DeskState};
use campusdesk_models::event::{Event, EventStatus, NewEvent};
use campusdesk_models::issue::{Issue, IssueStatus, NewIssue, PointAward};
use campusdesk_models::role::{Principal, Role};
use campusdesk_models::totals::{RequestTotals, TotalsScope};
use campusdesk_models::user::{NewUser, User};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::cli::Command;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    User(User),
    Event(Event),
    Events(Vec<Event>),
    Issue(Issue),
    Issues(Vec<Issue>),
    Award(AwardReceipt),
    Totals(RequestTotals),
    #[serde(rename_all = "camelCase")]
    Balance {
        student_id: String,
        green_point: i64,
    },
    History(Vec<PointAward>),
    #[serde(rename_all = "camelCase")]
    Name {
        user_id: String,
        name: String,
    },
}

/// Error body printed for failed commands.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl From<&CoreError> for ErrorBody {
    fn from(err: &CoreError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Re-run `op` while it fails with a retryable error, backing off
/// exponentially between attempts.
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                let backoff = BASE_BACKOFF * 2u32.pow(attempt - 1);
                tracing::warn!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "write conflict, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn principal(user: Option<&str>, role: Option<Role>) -> Result<Principal, CoreError> {
    match (user, role) {
        (Some(user), Some(role)) => Ok(Principal::new(user, role)),
        _ => Err(CoreError::Unauthorized(
            "--user and --role are required for this command".into(),
        )),
    }
}

fn student_scope(principal: &Principal, student: Option<&String>) -> String {
    student.cloned().unwrap_or_else(|| principal.user_id.clone())
}

/// Execute one command against the desk. `Migrate` is handled by the caller.
pub async fn run(
    state: &DeskState,
    command: &Command,
    user: Option<&str>,
    role: Option<Role>,
) -> Result<Output, CoreError> {
    if let Command::AddUser {
        name,
        email,
        new_role,
    } = command
    {
        let input = NewUser {
            name: name.clone(),
            email: email.clone(),
            role: *new_role,
        };
        return requests::register_user(state, input).await.map(Output::User);
    }

    let principal = principal(user, role)?;
    let principal = &principal;
    match command {
        Command::Migrate | Command::AddUser { .. } => Err(CoreError::InvalidInput(
            "command is not dispatched through the desk".into(),
        )),
        Command::CreateEvent {
            title,
            description,
            date,
            start,
            end,
            participants,
            purpose,
        } => {
            let input = NewEvent {
                title: title.clone(),
                description: description.clone(),
                date: *date,
                start_time: *start,
                end_time: *end,
                expected_participants: *participants,
                purpose: *purpose,
            };
            with_retry(|| requests::create_event(state, principal, input.clone()))
                .await
                .map(Output::Event)
        }
        Command::CreateIssue {
            issue_type,
            title,
            description,
        } => {
            let input = NewIssue {
                issue_type: issue_type.clone(),
                title: title.clone(),
                description: description.clone(),
            };
            with_retry(|| requests::create_issue(state, principal, input.clone()))
                .await
                .map(Output::Issue)
        }
        Command::SetEventStatus { event_id, status } => {
            let status: EventStatus = status.parse()?;
            with_retry(|| lifecycle::set_event_status(state, principal, event_id, status))
                .await
                .map(Output::Event)
        }
        Command::SetIssueStatus { issue_id, status } => {
            let status: IssueStatus = status.parse()?;
            with_retry(|| lifecycle::set_issue_status(state, principal, issue_id, status))
                .await
                .map(Output::Issue)
        }
        Command::AwardPoints { issue_id, points } => {
            with_retry(|| ledger::award_points(state, principal, issue_id, *points))
                .await
                .map(Output::Award)
        }
        Command::Totals { student, all } => {
            let scope = if *all {
                TotalsScope::All
            } else {
                TotalsScope::Student(student_scope(principal, student.as_ref()))
            };
            totals::compute_totals(state, principal, scope)
                .await
                .map(Output::Totals)
        }
        Command::Events { student, all } => {
            let listed = if *all {
                requests::all_events(state, principal).await
            } else {
                let student_id = student_scope(principal, student.as_ref());
                requests::student_events(state, principal, &student_id).await
            };
            listed.map(Output::Events)
        }
        Command::Issues { student, all } => {
            let listed = if *all {
                requests::all_issues(state, principal).await
            } else {
                let student_id = student_scope(principal, student.as_ref());
                requests::student_issues(state, principal, &student_id).await
            };
            listed.map(Output::Issues)
        }
        Command::Upcoming => requests::upcoming_events(state, principal)
            .await
            .map(Output::Events),
        Command::Points { student } => {
            let student_id = student_scope(principal, student.as_ref());
            let green_point = ledger::green_points(state, principal, &student_id).await?;
            Ok(Output::Balance {
                student_id,
                green_point,
            })
        }
        Command::History { student } => {
            let student_id = student_scope(principal, student.as_ref());
            ledger::point_history(state, principal, &student_id)
                .await
                .map(Output::History)
        }
        Command::Name { user_id } => {
            let name = requests::user_name(state, principal, user_id).await?;
            Ok(Output::Name {
                user_id: user_id.clone(),
                name,
            })
        }
    }
}
