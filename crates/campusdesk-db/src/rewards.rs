use crate::store::{RewardCredit, RewardOutcome};
use crate::{datetime_from_db_text, datetime_to_db_text, DbError, DbPool};
use campusdesk_models::issue::PointAward;
use sqlx::{Sqlite, Transaction};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PointAwardRow {
    pub issue_id: String,
    pub student_id: String,
    pub points: i64,
    pub awarded_by: String,
    pub awarded_at: String,
}

impl TryFrom<PointAwardRow> for PointAward {
    type Error = DbError;

    fn try_from(row: PointAwardRow) -> Result<Self, Self::Error> {
        Ok(PointAward {
            awarded_at: datetime_from_db_text(&row.awarded_at)?,
            issue_id: row.issue_id,
            student_id: row.student_id,
            points: row.points,
            awarded_by: row.awarded_by,
        })
    }
}

/// Flag the issue, credit its student and write the ledger row in one
/// transaction.
///
/// The first statement is the guarded write on `issues`, so the connection
/// holds SQLite's write lock before it reads anything; a second caller for the
/// same issue waits on the busy timeout and then finds `points_given = 1`.
/// Returning early drops `tx`, which rolls back.
pub async fn credit_reward(
    pool: &DbPool,
    issue_id: &str,
    credit: &RewardCredit,
) -> Result<RewardOutcome, DbError> {
    if credit.points <= 0 {
        return Err(DbError::Sqlx(sqlx::Error::Protocol(
            "points must be positive".to_string(),
        )));
    }

    let mut tx = pool.begin().await?;

    let resolved_guard = if credit.require_resolved {
        " AND status = 'Success'"
    } else {
        ""
    };
    let sql = format!(
        "UPDATE issues SET points_given = 1
         WHERE id = ?1 AND points_given = 0{resolved_guard}
         RETURNING student_id"
    );
    let flagged: Option<(String,)> = sqlx::query_as(&sql)
        .bind(issue_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some((student_id,)) = flagged else {
        return classify_refusal(&mut tx, issue_id).await;
    };

    let credited: Option<(i64,)> = sqlx::query_as(
        "UPDATE users SET green_point = green_point + ?2
         WHERE id = ?1 AND green_point <= ?3
         RETURNING green_point",
    )
    .bind(&student_id)
    .bind(credit.points)
    .bind(i64::MAX - credit.points)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((green_point,)) = credited else {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE id = ?1")
            .bind(&student_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_some() {
            tracing::warn!(issue_id, student_id = %student_id, "reward: balance would overflow, rolling back");
            return Ok(RewardOutcome::BalanceOverflow);
        }
        tracing::warn!(issue_id, student_id = %student_id, "reward: student missing, rolling back");
        return Ok(RewardOutcome::StudentMissing);
    };

    sqlx::query(
        "INSERT INTO point_awards (issue_id, student_id, points, awarded_by, awarded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(issue_id)
    .bind(&student_id)
    .bind(credit.points)
    .bind(&credit.awarded_by)
    .bind(datetime_to_db_text(credit.awarded_at))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(RewardOutcome::Credited {
        student_id,
        green_point,
    })
}

async fn classify_refusal(
    tx: &mut Transaction<'_, Sqlite>,
    issue_id: &str,
) -> Result<RewardOutcome, DbError> {
    let row: Option<(String, bool)> =
        sqlx::query_as("SELECT status, points_given FROM issues WHERE id = ?1")
            .bind(issue_id)
            .fetch_optional(&mut **tx)
            .await?;
    Ok(match row {
        None => RewardOutcome::IssueMissing,
        Some((_, true)) => RewardOutcome::AlreadyAwarded,
        Some((_, false)) => RewardOutcome::NotResolved,
    })
}

pub async fn list_awards_for_student(
    pool: &DbPool,
    student_id: &str,
) -> Result<Vec<PointAward>, DbError> {
    let rows = sqlx::query_as::<_, PointAwardRow>(
        "SELECT issue_id, student_id, points, awarded_by, awarded_at
         FROM point_awards
         WHERE student_id = ?1
         ORDER BY awarded_at DESC, issue_id DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(PointAward::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::tests::make_issue;
    use crate::users::tests::make_user;
    use campusdesk_models::issue::IssueStatus;
    use campusdesk_models::role::Role;
    use chrono::Utc;

    fn credit(points: i64) -> RewardCredit {
        RewardCredit {
            points,
            awarded_by: "f1".into(),
            awarded_at: Utc::now(),
            require_resolved: true,
        }
    }

    async fn seed(pool: &DbPool, status: IssueStatus) {
        crate::users::create_user(pool, &make_user("s1", Role::Student))
            .await
            .unwrap();
        crate::issues::create_issue(pool, &make_issue("i1", "s1", status))
            .await
            .unwrap();
    }

    async fn balance(pool: &DbPool, user_id: &str) -> i64 {
        crate::users::get_user_by_id(pool, user_id)
            .await
            .unwrap()
            .unwrap()
            .green_point
    }

    #[tokio::test]
    async fn test_credit_reward_flags_issue_and_credits_student() {
        let pool = crate::test_pool().await;
        seed(&pool, IssueStatus::Success).await;

        let outcome = credit_reward(&pool, "i1", &credit(10)).await.unwrap();
        assert_eq!(
            outcome,
            RewardOutcome::Credited {
                student_id: "s1".into(),
                green_point: 10
            }
        );
        let issue = crate::issues::get_issue(&pool, "i1").await.unwrap().unwrap();
        assert!(issue.points_given);

        let awards = list_awards_for_student(&pool, "s1").await.unwrap();
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].points, 10);
        assert_eq!(awards[0].awarded_by, "f1");
    }

    #[tokio::test]
    async fn test_second_credit_is_refused_and_balance_unchanged() {
        let pool = crate::test_pool().await;
        seed(&pool, IssueStatus::Success).await;

        credit_reward(&pool, "i1", &credit(10)).await.unwrap();
        let second = credit_reward(&pool, "i1", &credit(10)).await.unwrap();
        assert_eq!(second, RewardOutcome::AlreadyAwarded);
        assert_eq!(balance(&pool, "s1").await, 10);
    }

    #[tokio::test]
    async fn test_pending_issue_is_not_credited_when_resolution_required() {
        let pool = crate::test_pool().await;
        seed(&pool, IssueStatus::Pending).await;

        let outcome = credit_reward(&pool, "i1", &credit(5)).await.unwrap();
        assert_eq!(outcome, RewardOutcome::NotResolved);
        assert_eq!(balance(&pool, "s1").await, 0);

        let mut relaxed = credit(5);
        relaxed.require_resolved = false;
        let outcome = credit_reward(&pool, "i1", &relaxed).await.unwrap();
        assert!(matches!(outcome, RewardOutcome::Credited { green_point: 5, .. }));
    }

    #[tokio::test]
    async fn test_missing_student_rolls_back_flag() {
        let pool = crate::test_pool().await;
        crate::issues::create_issue(&pool, &make_issue("i1", "ghost", IssueStatus::Success))
            .await
            .unwrap();

        let outcome = credit_reward(&pool, "i1", &credit(5)).await.unwrap();
        assert_eq!(outcome, RewardOutcome::StudentMissing);
        let issue = crate::issues::get_issue(&pool, "i1").await.unwrap().unwrap();
        assert!(!issue.points_given);
        assert!(list_awards_for_student(&pool, "ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credit_past_max_balance_is_refused() {
        let pool = crate::test_pool().await;
        let mut rich = make_user("s1", Role::Student);
        rich.green_point = i64::MAX - 2;
        crate::users::create_user(&pool, &rich).await.unwrap();
        crate::issues::create_issue(&pool, &make_issue("i1", "s1", IssueStatus::Success))
            .await
            .unwrap();

        let outcome = credit_reward(&pool, "i1", &credit(5)).await.unwrap();
        assert_eq!(outcome, RewardOutcome::BalanceOverflow);
        assert_eq!(balance(&pool, "s1").await, i64::MAX - 2);
        let issue = crate::issues::get_issue(&pool, "i1").await.unwrap().unwrap();
        assert!(!issue.points_given);

        let outcome = credit_reward(&pool, "i1", &credit(2)).await.unwrap();
        assert!(matches!(outcome, RewardOutcome::Credited { green_point: i64::MAX, .. }));
    }

    #[tokio::test]
    async fn test_missing_issue() {
        let pool = crate::test_pool().await;
        let outcome = credit_reward(&pool, "nope", &credit(5)).await.unwrap();
        assert_eq!(outcome, RewardOutcome::IssueMissing);
    }

    #[tokio::test]
    async fn test_non_positive_points_rejected() {
        let pool = crate::test_pool().await;
        seed(&pool, IssueStatus::Success).await;
        assert!(credit_reward(&pool, "i1", &credit(0)).await.is_err());
        assert_eq!(balance(&pool, "s1").await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_credits_on_file_database_apply_once() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
        let pool = crate::create_pool(&url, 4).await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        seed(&pool, IssueStatus::Success).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                credit_reward(&pool, "i1", &credit(5)).await.unwrap()
            }));
        }
        let mut credited = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                RewardOutcome::Credited { .. } => credited += 1,
                RewardOutcome::AlreadyAwarded => refused += 1,
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(credited, 1);
        assert_eq!(refused, 9);
        assert_eq!(balance(&pool, "s1").await, 5);
    }
}
