use sqlx::{sqlite::SqliteRow, Row};

use expensa_core::domain::company::CompanyId;
use expensa_core::domain::user::{User, UserId, UserRole};

use super::company::parse_timestamp;
use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_USER: &str =
    "SELECT id, company_id, email, password_hash, role, manager_id, created_at FROM app_user";

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn insert(&self, user: User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO app_user (id, company_id, email, password_hash, role, manager_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id.0)
        .bind(&user.company_id.0)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.manager_id.as_ref().map(|id| id.0.as_str()))
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(user_from_row).transpose()
    }

    async fn list_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_USER} WHERE company_id = ? ORDER BY created_at ASC"))
            .bind(&company_id.0)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(user_from_row).collect()
    }
}

fn user_from_row(row: SqliteRow) -> Result<User, RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = UserRole::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown user role `{role_raw}`")))?;

    Ok(User {
        id: UserId(row.try_get("id")?),
        company_id: CompanyId(row.try_get("company_id")?),
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role,
        manager_id: row.try_get::<Option<String>, _>("manager_id")?.map(UserId),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
