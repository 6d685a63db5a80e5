use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use expensa_core::domain::company::CompanyId;
use expensa_core::domain::rule::{
    ApprovalRule, ApprovalRuleId, RuleApprover, RuleConditions, RuleType,
};
use expensa_core::domain::user::UserRole;

use super::company::parse_timestamp;
use super::{RepositoryError, RuleRepository};
use crate::DbPool;

pub struct SqlRuleRepository {
    pool: DbPool,
}

impl SqlRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn list_where_active(
        &self,
        company_id: &CompanyId,
        active_only: bool,
    ) -> Result<Vec<ApprovalRule>, RepositoryError> {
        let query = if active_only {
            "SELECT id, company_id, name, is_active, rule_type, percentage,
                    specific_approver_role, min_amount, category, department, updated_at
             FROM approval_rule
             WHERE company_id = ? AND is_active = 1
             ORDER BY updated_at DESC"
        } else {
            "SELECT id, company_id, name, is_active, rule_type, percentage,
                    specific_approver_role, min_amount, category, department, updated_at
             FROM approval_rule
             WHERE company_id = ?
             ORDER BY updated_at DESC"
        };

        let rows = sqlx::query(query).bind(&company_id.0).fetch_all(&self.pool).await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let mut rule = rule_from_row(row)?;
            rule.approvers = self.load_approvers(&rule.id).await?;
            rules.push(rule);
        }

        Ok(rules)
    }

    async fn load_approvers(
        &self,
        rule_id: &ApprovalRuleId,
    ) -> Result<Vec<RuleApprover>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT role, step_order, required FROM rule_approver
             WHERE rule_id = ? ORDER BY step_order ASC",
        )
        .bind(&rule_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(approver_from_row).collect()
    }
}

#[async_trait::async_trait]
impl RuleRepository for SqlRuleRepository {
    async fn insert(&self, rule: ApprovalRule) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO approval_rule (
                id, company_id, name, is_active, rule_type, percentage,
                specific_approver_role, min_amount, category, department, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rule.id.0)
        .bind(&rule.company_id.0)
        .bind(&rule.name)
        .bind(i64::from(rule.is_active))
        .bind(rule.rule_type.as_str())
        .bind(rule.percentage.map(i64::from))
        .bind(rule.specific_approver_role.map(|role| role.as_str()))
        .bind(rule.conditions.min_amount.map(|amount| amount.to_string()))
        .bind(rule.conditions.category.as_deref())
        .bind(rule.conditions.department.as_deref())
        .bind(rule.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for approver in &rule.approvers {
            sqlx::query(
                "INSERT INTO rule_approver (rule_id, role, step_order, required)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&rule.id.0)
            .bind(approver.role.as_str())
            .bind(i64::from(approver.order))
            .bind(i64::from(approver.required))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApprovalRule>, RepositoryError> {
        self.list_where_active(company_id, false).await
    }

    async fn list_active_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApprovalRule>, RepositoryError> {
        self.list_where_active(company_id, true).await
    }
}

fn rule_from_row(row: SqliteRow) -> Result<ApprovalRule, RepositoryError> {
    let rule_type_raw = row.try_get::<String, _>("rule_type")?;
    let rule_type = RuleType::parse(&rule_type_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown rule type `{rule_type_raw}`")))?;

    let specific_approver_role = row
        .try_get::<Option<String>, _>("specific_approver_role")?
        .map(|value| {
            UserRole::parse(&value).ok_or_else(|| {
                RepositoryError::Decode(format!("unknown specific approver role `{value}`"))
            })
        })
        .transpose()?;

    let min_amount = row
        .try_get::<Option<String>, _>("min_amount")?
        .map(|value| {
            Decimal::from_str(&value).map_err(|error| {
                RepositoryError::Decode(format!("invalid min_amount `{value}` ({error})"))
            })
        })
        .transpose()?;

    let percentage = row
        .try_get::<Option<i64>, _>("percentage")?
        .map(|value| {
            u8::try_from(value).map_err(|_| {
                RepositoryError::Decode(format!("percentage out of range: {value}"))
            })
        })
        .transpose()?;

    Ok(ApprovalRule {
        id: ApprovalRuleId(row.try_get("id")?),
        company_id: CompanyId(row.try_get("company_id")?),
        name: row.try_get("name")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        rule_type,
        percentage,
        specific_approver_role,
        approvers: Vec::new(),
        conditions: RuleConditions {
            min_amount,
            category: row.try_get("category")?,
            department: row.try_get("department")?,
        },
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn approver_from_row(row: SqliteRow) -> Result<RuleApprover, RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = UserRole::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown approver role `{role_raw}`")))?;
    let order = row.try_get::<i64, _>("step_order")?;

    Ok(RuleApprover {
        role,
        order: u32::try_from(order)
            .map_err(|_| RepositoryError::Decode(format!("invalid step_order: {order}")))?,
        required: row.try_get::<i64, _>("required")? != 0,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use expensa_core::domain::company::Company;
    use expensa_core::domain::rule::{
        ApprovalRule, ApprovalRuleId, RuleApprover, RuleConditions, RuleType,
    };
    use expensa_core::domain::user::UserRole;

    use super::SqlRuleRepository;
    use crate::repositories::{CompanyRepository, RuleRepository, SqlCompanyRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn rule_round_trips_with_approvers_and_conditions() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");

        let company = Company::new("Initech", "USD");
        SqlCompanyRepository::new(pool.clone())
            .insert(company.clone())
            .await
            .expect("insert company");

        let repo = SqlRuleRepository::new(pool.clone());
        let rule = ApprovalRule {
            id: ApprovalRuleId("r-1".to_string()),
            company_id: company.id.clone(),
            name: "big travel".to_string(),
            is_active: true,
            rule_type: RuleType::Hybrid,
            percentage: Some(60),
            specific_approver_role: Some(UserRole::Admin),
            approvers: vec![
                RuleApprover { role: UserRole::Manager, order: 1, required: true },
                RuleApprover { role: UserRole::Admin, order: 2, required: false },
            ],
            conditions: RuleConditions {
                min_amount: Some(Decimal::new(50_000, 2)),
                category: Some("Travel".to_string()),
                department: None,
            },
            updated_at: Utc::now(),
        };
        repo.insert(rule.clone()).await.expect("insert rule");

        let mut inactive = rule.clone();
        inactive.id = ApprovalRuleId("r-2".to_string());
        inactive.is_active = false;
        repo.insert(inactive).await.expect("insert inactive rule");

        let all = repo.list_for_company(&company.id).await.expect("list all");
        assert_eq!(all.len(), 2);

        let active = repo.list_active_for_company(&company.id).await.expect("list active");
        assert_eq!(active, vec![rule]);

        pool.close().await;
    }
}
