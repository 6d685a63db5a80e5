use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use expensa_core::domain::company::{Company, CompanyId};

use super::{CompanyRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCompanyRepository {
    pool: DbPool,
}

impl SqlCompanyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CompanyRepository for SqlCompanyRepository {
    async fn insert(&self, company: Company) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO company (id, name, base_currency, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&company.id.0)
        .bind(&company.name)
        .bind(&company.base_currency)
        .bind(company.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, base_currency, created_at FROM company WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(company_from_row).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, base_currency, created_at FROM company WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(company_from_row).transpose()
    }
}

fn company_from_row(row: SqliteRow) -> Result<Company, RepositoryError> {
    Ok(Company {
        id: CompanyId(row.try_get("id")?),
        name: row.try_get("name")?,
        base_currency: row.try_get("base_currency")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

#[cfg(test)]
mod tests {
    use expensa_core::domain::company::Company;

    use super::SqlCompanyRepository;
    use crate::repositories::CompanyRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn company_round_trips_by_id_and_name() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");

        let repo = SqlCompanyRepository::new(pool.clone());
        let company = Company::new("Initech", "USD");
        repo.insert(company.clone()).await.expect("insert company");

        let by_id = repo.find_by_id(&company.id).await.expect("find by id");
        assert_eq!(by_id, Some(company.clone()));

        let by_name = repo.find_by_name("Initech").await.expect("find by name");
        assert_eq!(by_name, Some(company));

        assert_eq!(repo.find_by_name("Globex").await.expect("miss"), None);

        pool.close().await;
    }
}
