use crate::store::{IssueFilter, IssuePatch, SortOrder};
use crate::{datetime_from_db_text, datetime_to_db_text, parse_column, DbError, DbPool};
use campusdesk_models::issue::Issue;
use sqlx::{QueryBuilder, Sqlite};

pub(crate) const ISSUE_COLUMNS: &str =
    "id, issue_type, title, description, student_id, status, points_given, created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IssueRow {
    pub id: String,
    pub issue_type: String,
    pub title: String,
    pub description: String,
    pub student_id: String,
    pub status: String,
    pub points_given: bool,
    pub created_at: String,
}

impl TryFrom<IssueRow> for Issue {
    type Error = DbError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        Ok(Issue {
            status: parse_column(&row.status)?,
            created_at: datetime_from_db_text(&row.created_at)?,
            id: row.id,
            issue_type: row.issue_type,
            title: row.title,
            description: row.description,
            student_id: row.student_id,
            points_given: row.points_given,
        })
    }
}

pub async fn create_issue(pool: &DbPool, issue: &Issue) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO issues (id, issue_type, title, description, student_id, status, points_given, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(&issue.id)
    .bind(&issue.issue_type)
    .bind(&issue.title)
    .bind(&issue.description)
    .bind(&issue.student_id)
    .bind(issue.status.as_str())
    .bind(issue.points_given)
    .bind(datetime_to_db_text(issue.created_at))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_issue(pool: &DbPool, id: &str) -> Result<Option<Issue>, DbError> {
    let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1");
    let row = sqlx::query_as::<_, IssueRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(Issue::try_from).transpose()
}

pub async fn list_issues(
    pool: &DbPool,
    filter: &IssueFilter,
    sort: SortOrder,
) -> Result<Vec<Issue>, DbError> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE 1 = 1"));
    if let Some(student_id) = &filter.student_id {
        qb.push(" AND student_id = ").push_bind(student_id.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    qb.push(match sort {
        SortOrder::Newest => " ORDER BY created_at DESC, id DESC",
        SortOrder::Oldest | SortOrder::Schedule => " ORDER BY created_at ASC, id ASC",
    });

    let rows = qb.build_query_as::<IssueRow>().fetch_all(pool).await?;
    rows.into_iter().map(Issue::try_from).collect()
}

pub async fn update_issue_status(
    pool: &DbPool,
    id: &str,
    patch: &IssuePatch,
) -> Result<Option<Issue>, DbError> {
    let sql = format!(
        "UPDATE issues SET status = ?3
         WHERE id = ?1 AND status = ?2
         RETURNING {ISSUE_COLUMNS}"
    );
    let row = sqlx::query_as::<_, IssueRow>(&sql)
        .bind(id)
        .bind(patch.expected.as_str())
        .bind(patch.status.as_str())
        .fetch_optional(pool)
        .await?;
    row.map(Issue::try_from).transpose()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use campusdesk_models::issue::IssueStatus;
    use chrono::{Duration, Utc};

    pub(crate) fn make_issue(id: &str, student_id: &str, status: IssueStatus) -> Issue {
        Issue {
            id: id.to_string(),
            issue_type: "plumbing".into(),
            title: format!("issue {id}"),
            description: "leaking tap".into(),
            student_id: student_id.to_string(),
            status,
            points_given: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_issue() {
        let pool = crate::test_pool().await;
        create_issue(&pool, &make_issue("i1", "s1", IssueStatus::Pending))
            .await
            .unwrap();
        let issue = get_issue(&pool, "i1").await.unwrap().unwrap();
        assert_eq!(issue.issue_type, "plumbing");
        assert_eq!(issue.status, IssueStatus::Pending);
        assert!(!issue.points_given);
    }

    #[tokio::test]
    async fn test_list_issues_by_status() {
        let pool = crate::test_pool().await;
        let base = Utc::now();
        for (i, status) in [IssueStatus::Pending, IssueStatus::Success, IssueStatus::Pending]
            .into_iter()
            .enumerate()
        {
            let mut issue = make_issue(&format!("i{i}"), "s1", status);
            issue.created_at = base + Duration::seconds(i as i64);
            create_issue(&pool, &issue).await.unwrap();
        }
        let filter = IssueFilter {
            status: Some(IssueStatus::Pending),
            ..IssueFilter::default()
        };
        let issues = list_issues(&pool, &filter, SortOrder::Oldest).await.unwrap();
        let ids: Vec<_> = issues.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i0", "i2"]);
    }

    #[tokio::test]
    async fn test_update_issue_status_is_guarded() {
        let pool = crate::test_pool().await;
        create_issue(&pool, &make_issue("i1", "s1", IssueStatus::Pending))
            .await
            .unwrap();
        let patch = IssuePatch {
            expected: IssueStatus::Pending,
            status: IssueStatus::Success,
        };
        let updated = update_issue_status(&pool, "i1", &patch).await.unwrap().unwrap();
        assert_eq!(updated.status, IssueStatus::Success);
        assert!(update_issue_status(&pool, "i1", &patch).await.unwrap().is_none());
    }
}
