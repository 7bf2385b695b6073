use crate::{datetime_from_db_text, datetime_to_db_text, parse_column, DbError, DbPool};
use campusdesk_models::user::User;

pub(crate) const USER_COLUMNS: &str = "id, name, email, role, green_point, created_at";

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub green_point: i64,
    pub created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            role: parse_column(&row.role)?,
            created_at: datetime_from_db_text(&row.created_at)?,
            id: row.id,
            name: row.name,
            email: row.email,
            green_point: row.green_point,
        })
    }
}

pub async fn create_user(pool: &DbPool, user: &User) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO users (id, name, email, role, green_point, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(normalize_email(&user.email))
    .bind(user.role.as_str())
    .bind(user.green_point)
    .bind(datetime_to_db_text(user.created_at))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_user_by_id(pool: &DbPool, id: &str) -> Result<Option<User>, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(User::try_from).transpose()
}
