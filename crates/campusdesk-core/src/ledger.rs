use campusdesk_db::{RewardCredit, RewardOutcome};
use campusdesk_models::issue::PointAward;
use campusdesk_models::role::{Capabilities, Principal};
use serde::Serialize;

use crate::access::{require_capability, require_student_access};
use crate::error::CoreError;
use crate::DeskState;

/// Result of a successful award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardReceipt {
    pub issue_id: String,
    pub student_id: String,
    pub points: i64,
    pub green_point: i64,
}

/// Credit `points` to the student who reported `issue_id`, at most once per
/// issue.
///
/// The flag flip, balance update and ledger row are one atomic store
/// operation; of any number of concurrent callers exactly one is credited and
/// the rest see `AlreadyAwarded`.
pub async fn award_points(
    state: &DeskState,
    principal: &Principal,
    issue_id: &str,
    points: i64,
) -> Result<AwardReceipt, CoreError> {
    require_capability(principal, Capabilities::AWARD_POINTS, "award green points")?;
    if points <= 0 {
        return Err(CoreError::InvalidInput(format!(
            "points must be a positive integer, got {points}"
        )));
    }

    let credit = RewardCredit {
        points,
        awarded_by: principal.user_id.clone(),
        awarded_at: crate::now(),
        require_resolved: state.config.award_requires_resolution,
    };
    let outcome = state
        .bounded_write(None, state.store.credit_reward(issue_id, &credit))
        .await?;

    match outcome {
        RewardOutcome::Credited {
            student_id,
            green_point,
        } => {
            state.invalidate_totals(&student_id).await;
            tracing::info!(
                issue_id,
                student_id = %student_id,
                points,
                green_point,
                awarded_by = %principal.user_id,
                "green points awarded"
            );
            Ok(AwardReceipt {
                issue_id: issue_id.to_string(),
                student_id,
                points,
                green_point,
            })
        }
        RewardOutcome::IssueMissing => Err(CoreError::not_found("issue", issue_id)),
        RewardOutcome::AlreadyAwarded => {
            tracing::warn!(issue_id, awarded_by = %principal.user_id, "award refused: already awarded");
            Err(CoreError::AlreadyAwarded(issue_id.to_string()))
        }
        RewardOutcome::NotResolved => {
            tracing::warn!(issue_id, "award refused: issue not resolved");
            Err(CoreError::InvalidTransition(format!(
                "issue {issue_id} must be Success before points are awarded"
            )))
        }
        RewardOutcome::StudentMissing => Err(CoreError::NotFound(format!(
            "student who reported issue {issue_id}"
        ))),
        RewardOutcome::BalanceOverflow => Err(CoreError::InvalidInput(format!(
            "awarding {points} points for issue {issue_id} would overflow the balance"
        ))),
    }
}

pub async fn green_points(
    state: &DeskState,
    principal: &Principal,
    student_id: &str,
) -> Result<i64, CoreError> {
    require_student_access(principal, student_id)?;
    state
        .bounded(state.store.find_user_by_id(student_id))
        .await?
        .map(|user| user.green_point)
        .ok_or_else(|| CoreError::not_found("student", student_id))
}

/// Ledger rows for a student, newest first.
pub async fn point_history(
    state: &DeskState,
    principal: &Principal,
    student_id: &str,
) -> Result<Vec<PointAward>, CoreError> {
    require_student_access(principal, student_id)?;
    state.bounded(state.store.find_awards(student_id)).await
}
