use crate::store::{EventFilter, EventPatch, SortOrder};
use crate::{
    date_from_db_text, date_to_db_text, datetime_from_db_text, datetime_to_db_text, parse_column,
    time_from_db_text, time_to_db_text, DbError, DbPool,
};
use campusdesk_models::event::Event;
use sqlx::{QueryBuilder, Sqlite};

const EVENT_COLUMNS: &str = "id, title, description, date, start_time, end_time, expected_participants, purpose, student_id, status, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub expected_participants: i64,
    pub purpose: String,
    pub student_id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<EventRow> for Event {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let expected_participants = u32::try_from(row.expected_participants).map_err(|_| {
            DbError::Corrupt(format!(
                "expected_participants {} out of range",
                row.expected_participants
            ))
        })?;
        Ok(Event {
            date: date_from_db_text(&row.date)?,
            start_time: time_from_db_text(&row.start_time)?,
            end_time: time_from_db_text(&row.end_time)?,
            purpose: parse_column(&row.purpose)?,
            status: parse_column(&row.status)?,
            created_at: datetime_from_db_text(&row.created_at)?,
            updated_at: datetime_from_db_text(&row.updated_at)?,
            expected_participants,
            id: row.id,
            title: row.title,
            description: row.description,
            student_id: row.student_id,
        })
    }
}

pub async fn create_event(pool: &DbPool, event: &Event) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO events (id, title, description, date, start_time, end_time,
                             expected_participants, purpose, student_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(&event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(date_to_db_text(event.date))
    .bind(time_to_db_text(event.start_time))
    .bind(time_to_db_text(event.end_time))
    .bind(i64::from(event.expected_participants))
    .bind(event.purpose.as_str())
    .bind(&event.student_id)
    .bind(event.status.as_str())
    .bind(datetime_to_db_text(event.created_at))
    .bind(datetime_to_db_text(event.updated_at))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_event(pool: &DbPool, id: &str) -> Result<Option<Event>, DbError> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
    let row = sqlx::query_as::<_, EventRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(Event::try_from).transpose()
}

pub async fn list_events(
    pool: &DbPool,
    filter: &EventFilter,
    sort: SortOrder,
) -> Result<Vec<Event>, DbError> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE 1 = 1"));
    if let Some(student_id) = &filter.student_id {
        qb.push(" AND student_id = ").push_bind(student_id.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND date >= ").push_bind(date_to_db_text(from));
    }
    qb.push(match sort {
        SortOrder::Newest => " ORDER BY created_at DESC, id DESC",
        SortOrder::Oldest => " ORDER BY created_at ASC, id ASC",
        SortOrder::Schedule => " ORDER BY date ASC, start_time ASC, created_at ASC",
    });

    let rows = qb.build_query_as::<EventRow>().fetch_all(pool).await?;
    rows.into_iter().map(Event::try_from).collect()
}

/// Compare-and-swap on `status`. `None` means the row is gone or someone else
/// moved it first.
pub async fn update_event_status(
    pool: &DbPool,
    id: &str,
    patch: &EventPatch,
) -> Result<Option<Event>, DbError> {
    let sql = format!(
        "UPDATE events SET status = ?3, updated_at = ?4
         WHERE id = ?1 AND status = ?2
         RETURNING {EVENT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, EventRow>(&sql)
        .bind(id)
        .bind(patch.expected.as_str())
        .bind(patch.status.as_str())
        .bind(datetime_to_db_text(patch.updated_at))
        .fetch_optional(pool)
        .await?;
    row.map(Event::try_from).transpose()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use campusdesk_models::event::{EventPurpose, EventStatus};
    use chrono::{Duration, NaiveDate, NaiveTime, Utc};

    pub(crate) fn make_event(id: &str, student_id: &str, status: EventStatus) -> Event {
        let now = Utc::now();
        Event {
            id: id.to_string(),
            title: format!("event {id}"),
            description: String::new(),
            date: NaiveDate::from_ymd_opt(2031, 5, 20).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            expected_participants: 25,
            purpose: EventPurpose::Meeting,
            student_id: student_id.to_string(),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_event() {
        let pool = crate::test_pool().await;
        create_event(&pool, &make_event("e1", "s1", EventStatus::Pending))
            .await
            .unwrap();
        let loaded = get_event(&pool, "e1").await.unwrap().unwrap();
        assert_eq!(loaded.status, EventStatus::Pending);
        assert_eq!(loaded.purpose, EventPurpose::Meeting);
        assert_eq!(loaded.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_schema_rejects_inverted_times() {
        let pool = crate::test_pool().await;
        let mut event = make_event("bad", "s1", EventStatus::Pending);
        std::mem::swap(&mut event.start_time, &mut event.end_time);
        assert!(create_event(&pool, &event).await.is_err());
    }

    #[tokio::test]
    async fn test_list_events_filters_by_student_and_sorts_newest_first() {
        let pool = crate::test_pool().await;
        let base = Utc::now();
        for (i, student) in ["s1", "s2", "s1"].iter().enumerate() {
            let mut event = make_event(&format!("e{i}"), student, EventStatus::Pending);
            event.created_at = base + Duration::seconds(i as i64);
            create_event(&pool, &event).await.unwrap();
        }
        let events = list_events(&pool, &EventFilter::for_student("s1"), SortOrder::Newest)
            .await
            .unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e0"]);
    }

    #[tokio::test]
    async fn test_list_events_schedule_order_and_date_bound() {
        let pool = crate::test_pool().await;
        let mut late = make_event("late", "s1", EventStatus::Approved);
        late.date = NaiveDate::from_ymd_opt(2031, 6, 2).unwrap();
        let mut early = make_event("early", "s1", EventStatus::Approved);
        early.date = NaiveDate::from_ymd_opt(2031, 6, 1).unwrap();
        let mut past = make_event("past", "s1", EventStatus::Approved);
        past.date = NaiveDate::from_ymd_opt(2031, 5, 1).unwrap();
        let pending = make_event("pending", "s1", EventStatus::Pending);
        for event in [&late, &early, &past, &pending] {
            create_event(&pool, event).await.unwrap();
        }

        let filter = EventFilter {
            status: Some(EventStatus::Approved),
            date_from: NaiveDate::from_ymd_opt(2031, 5, 15),
            ..EventFilter::default()
        };
        let events = list_events(&pool, &filter, SortOrder::Schedule).await.unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_update_event_status_is_guarded() {
        let pool = crate::test_pool().await;
        create_event(&pool, &make_event("e1", "s1", EventStatus::Pending))
            .await
            .unwrap();
        let patch = EventPatch {
            expected: EventStatus::Pending,
            status: EventStatus::Approved,
            updated_at: Utc::now(),
        };
        let updated = update_event_status(&pool, "e1", &patch).await.unwrap().unwrap();
        assert_eq!(updated.status, EventStatus::Approved);

        // Guard no longer matches.
        assert!(update_event_status(&pool, "e1", &patch).await.unwrap().is_none());
        assert!(update_event_status(&pool, "missing", &patch)
            .await
            .unwrap()
            .is_none());
    }
}
