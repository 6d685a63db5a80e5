use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use expensa_core::domain::company::CompanyId;
use expensa_core::domain::expense::{Expense, ExpenseId, ExpenseStatus};
use expensa_core::domain::rule::RuleType;
use expensa_core::domain::step::{ApprovalPlan, ApprovalStep};
use expensa_core::domain::user::UserId;
use expensa_core::workflow::DecisionOutcome;

use super::company::{parse_optional_timestamp, parse_timestamp};
use super::{ExpenseRepository, ExpenseWorkflow, RepositoryError};
use crate::DbPool;

pub struct SqlExpenseRepository {
    pool: DbPool,
}

impl SqlExpenseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_EXPENSE: &str = "SELECT
    id, user_id, company_id, amount, currency, category, description, department,
    expense_date, status, status_version, plan_rule_type, plan_percentage,
    plan_specific_approver_id, created_at
 FROM expense";

#[async_trait::async_trait]
impl ExpenseRepository for SqlExpenseRepository {
    async fn create_with_steps(
        &self,
        expense: &Expense,
        plan: &ApprovalPlan,
        steps: &[ApprovalStep],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO expense (
                id, user_id, company_id, amount, currency, category, description,
                department, expense_date, status, status_version, plan_rule_type,
                plan_percentage, plan_specific_approver_id, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&expense.id.0)
        .bind(&expense.user_id.0)
        .bind(&expense.company_id.0)
        .bind(expense.amount.to_string())
        .bind(&expense.currency)
        .bind(&expense.category)
        .bind(&expense.description)
        .bind(expense.department.as_deref())
        .bind(expense.date.format("%Y-%m-%d").to_string())
        .bind(expense.status.as_str())
        .bind(i64::from(expense.status_version))
        .bind(plan.rule_type.as_str())
        .bind(plan.percentage.map(i64::from))
        .bind(plan.specific_approver_id.as_ref().map(|id| id.0.as_str()))
        .bind(expense.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for step in steps {
            sqlx::query(
                "INSERT INTO approval_step (
                    expense_id, approver_id, sequence_index, decision, comments,
                    decided_at, moot
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&step.expense_id.0)
            .bind(&step.approver_id.0)
            .bind(i64::from(step.sequence_index))
            .bind(step.decision.map(i64::from))
            .bind(step.comments.as_deref())
            .bind(step.decided_at.map(|value| value.to_rfc3339()))
            .bind(i64::from(step.moot))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_workflow(
        &self,
        expense_id: &ExpenseId,
    ) -> Result<Option<ExpenseWorkflow>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_EXPENSE} WHERE id = ?"))
            .bind(&expense_id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let plan = plan_from_row(&row)?;
        let expense = expense_from_row(row)?;

        let step_rows = sqlx::query(
            "SELECT expense_id, approver_id, sequence_index, decision, comments, decided_at, moot
             FROM approval_step
             WHERE expense_id = ?
             ORDER BY sequence_index ASC",
        )
        .bind(&expense_id.0)
        .fetch_all(&self.pool)
        .await?;

        let steps =
            step_rows.into_iter().map(step_from_row).collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ExpenseWorkflow { expense, plan, steps }))
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Expense>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_EXPENSE} WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(expense_from_row).collect()
    }

    async fn list_pending_for_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<Expense>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_EXPENSE} WHERE status = 'pending' AND id IN (
                SELECT expense_id FROM approval_step
                WHERE approver_id = ? AND decision IS NULL AND moot = 0
             )
             ORDER BY created_at DESC"
        ))
        .bind(&approver_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(expense_from_row).collect()
    }

    async fn commit_decision(
        &self,
        outcome: &DecisionOutcome,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Compare-and-set on status_version: exactly one concurrent decision
        // per expense can get past this update.
        let updated = sqlx::query(
            "UPDATE expense SET status = ?, status_version = ?
             WHERE id = ? AND status_version = ?",
        )
        .bind(outcome.expense.status.as_str())
        .bind(i64::from(outcome.expense.status_version))
        .bind(&outcome.expense.id.0)
        .bind(i64::from(expected_version))
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::Conflict(format!(
                "expense `{}` changed since version {expected_version}",
                outcome.expense.id.0
            )));
        }

        for step in &outcome.steps {
            sqlx::query(
                "UPDATE approval_step
                 SET decision = ?, comments = ?, decided_at = ?, moot = ?
                 WHERE expense_id = ? AND approver_id = ?",
            )
            .bind(step.decision.map(i64::from))
            .bind(step.comments.as_deref())
            .bind(step.decided_at.map(|value| value.to_rfc3339()))
            .bind(i64::from(step.moot))
            .bind(&step.expense_id.0)
            .bind(&step.approver_id.0)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn expense_from_row(row: SqliteRow) -> Result<Expense, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = ExpenseStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown expense status `{status_raw}`")))?;

    let amount_raw = row.try_get::<String, _>("amount")?;
    let amount = Decimal::from_str(&amount_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid amount `{amount_raw}` ({error})"))
    })?;

    let date_raw = row.try_get::<String, _>("expense_date")?;
    let date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d").map_err(|error| {
        RepositoryError::Decode(format!("invalid expense_date `{date_raw}` ({error})"))
    })?;

    let status_version = row.try_get::<i64, _>("status_version")?;

    Ok(Expense {
        id: ExpenseId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        company_id: CompanyId(row.try_get("company_id")?),
        amount,
        currency: row.try_get("currency")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        department: row.try_get("department")?,
        date,
        status,
        status_version: u32::try_from(status_version).map_err(|_| {
            RepositoryError::Decode(format!("invalid status_version: {status_version}"))
        })?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn plan_from_row(row: &SqliteRow) -> Result<ApprovalPlan, RepositoryError> {
    let rule_type_raw = row.try_get::<String, _>("plan_rule_type")?;
    let rule_type = RuleType::parse(&rule_type_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown plan rule type `{rule_type_raw}`"))
    })?;

    let percentage = row
        .try_get::<Option<i64>, _>("plan_percentage")?
        .map(|value| {
            u8::try_from(value).map_err(|_| {
                RepositoryError::Decode(format!("plan percentage out of range: {value}"))
            })
        })
        .transpose()?;

    Ok(ApprovalPlan {
        rule_type,
        percentage,
        specific_approver_id: row
            .try_get::<Option<String>, _>("plan_specific_approver_id")?
            .map(UserId),
    })
}

fn step_from_row(row: SqliteRow) -> Result<ApprovalStep, RepositoryError> {
    let sequence_index = row.try_get::<i64, _>("sequence_index")?;

    Ok(ApprovalStep {
        expense_id: ExpenseId(row.try_get("expense_id")?),
        approver_id: UserId(row.try_get("approver_id")?),
        sequence_index: u32::try_from(sequence_index).map_err(|_| {
            RepositoryError::Decode(format!("invalid sequence_index: {sequence_index}"))
        })?,
        decision: row.try_get::<Option<i64>, _>("decision")?.map(|value| value != 0),
        comments: row.try_get("comments")?,
        decided_at: parse_optional_timestamp("decided_at", row.try_get("decided_at")?)?,
        moot: row.try_get::<i64, _>("moot")? != 0,
    })
}
