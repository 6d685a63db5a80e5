//! In-memory repositories for tests and wiring experiments. They honor the
//! same contracts as the SQL implementations, including the optimistic
//! version check on decisions.

use std::collections::HashMap;

use tokio::sync::RwLock;

use expensa_core::domain::company::{Company, CompanyId};
use expensa_core::domain::expense::{Expense, ExpenseId};
use expensa_core::domain::rule::ApprovalRule;
use expensa_core::domain::step::{ApprovalPlan, ApprovalStep};
use expensa_core::domain::user::{User, UserId};
use expensa_core::workflow::DecisionOutcome;

use super::{
    CompanyRepository, ExpenseRepository, ExpenseWorkflow, RepositoryError, RuleRepository,
    UserRepository,
};

#[derive(Default)]
pub struct InMemoryCompanyRepository {
    companies: RwLock<HashMap<String, Company>>,
}

#[async_trait::async_trait]
impl CompanyRepository for InMemoryCompanyRepository {
    async fn insert(&self, company: Company) -> Result<(), RepositoryError> {
        let mut companies = self.companies.write().await;
        companies.insert(company.id.0.clone(), company);
        Ok(())
    }

    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let companies = self.companies.read().await;
        Ok(companies.get(&id.0).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError> {
        let companies = self.companies.read().await;
        Ok(companies.values().find(|company| company.name == name).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::Decode(format!(
                "email `{}` already registered",
                user.email
            )));
        }
        users.insert(user.id.0.clone(), user);
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn list_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut roster: Vec<User> =
            users.values().filter(|user| &user.company_id == company_id).cloned().collect();
        roster.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(roster)
    }
}

#[derive(Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<HashMap<String, ApprovalRule>>,
}

#[async_trait::async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn insert(&self, rule: ApprovalRule) -> Result<(), RepositoryError> {
        let mut rules = self.rules.write().await;
        rules.insert(rule.id.0.clone(), rule);
        Ok(())
    }

    async fn list_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApprovalRule>, RepositoryError> {
        let rules = self.rules.read().await;
        let mut matching: Vec<ApprovalRule> =
            rules.values().filter(|rule| &rule.company_id == company_id).cloned().collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matching)
    }

    async fn list_active_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApprovalRule>, RepositoryError> {
        let mut rules = self.list_for_company(company_id).await?;
        rules.retain(|rule| rule.is_active);
        Ok(rules)
    }
}

#[derive(Default)]
pub struct InMemoryExpenseRepository {
    workflows: RwLock<HashMap<String, ExpenseWorkflow>>,
}

#[async_trait::async_trait]
impl ExpenseRepository for InMemoryExpenseRepository {
    async fn create_with_steps(
        &self,
        expense: &Expense,
        plan: &ApprovalPlan,
        steps: &[ApprovalStep],
    ) -> Result<(), RepositoryError> {
        let mut workflows = self.workflows.write().await;
        workflows.insert(
            expense.id.0.clone(),
            ExpenseWorkflow {
                expense: expense.clone(),
                plan: plan.clone(),
                steps: steps.to_vec(),
            },
        );
        Ok(())
    }

    async fn load_workflow(
        &self,
        expense_id: &ExpenseId,
    ) -> Result<Option<ExpenseWorkflow>, RepositoryError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(&expense_id.0).cloned())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Expense>, RepositoryError> {
        let workflows = self.workflows.read().await;
        let mut expenses: Vec<Expense> = workflows
            .values()
            .filter(|workflow| &workflow.expense.user_id == user_id)
            .map(|workflow| workflow.expense.clone())
            .collect();
        expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(expenses)
    }

    async fn list_pending_for_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<Expense>, RepositoryError> {
        let workflows = self.workflows.read().await;
        let mut expenses: Vec<Expense> = workflows
            .values()
            .filter(|workflow| {
                !workflow.expense.status.is_final()
                    && workflow.steps.iter().any(|step| {
                        &step.approver_id == approver_id && step.is_outstanding()
                    })
            })
            .map(|workflow| workflow.expense.clone())
            .collect();
        expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(expenses)
    }

    async fn commit_decision(
        &self,
        outcome: &DecisionOutcome,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows.get_mut(&outcome.expense.id.0).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown expense `{}`", outcome.expense.id.0))
        })?;

        if workflow.expense.status_version != expected_version {
            return Err(RepositoryError::Conflict(format!(
                "expense `{}` changed since version {expected_version}",
                outcome.expense.id.0
            )));
        }

        workflow.expense = outcome.expense.clone();
        workflow.steps = outcome.steps.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use expensa_core::domain::company::CompanyId;
    use expensa_core::domain::expense::Expense;
    use expensa_core::domain::rule::RuleType;
    use expensa_core::domain::step::{ApprovalPlan, ApprovalStep};
    use expensa_core::domain::user::UserId;
    use expensa_core::workflow::apply_decision;

    use crate::repositories::{ExpenseRepository, InMemoryExpenseRepository, RepositoryError};

    fn sample_expense() -> Expense {
        Expense::submit(
            UserId("u-emp".to_string()),
            CompanyId("c-1".to_string()),
            Decimal::new(20_000, 2),
            "USD",
            "Travel",
            "client visit",
            NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date"),
        )
        .expect("valid expense")
    }

    #[tokio::test]
    async fn in_memory_expense_repo_round_trip() {
        let repo = InMemoryExpenseRepository::default();
        let expense = sample_expense();
        let plan = ApprovalPlan {
            rule_type: RuleType::Percentage,
            percentage: Some(60),
            specific_approver_id: None,
        };
        let steps =
            vec![ApprovalStep::outstanding(expense.id.clone(), UserId("a-1".to_string()), 0)];

        repo.create_with_steps(&expense, &plan, &steps).await.expect("create");

        let loaded =
            repo.load_workflow(&expense.id).await.expect("load").expect("workflow exists");
        assert_eq!(loaded.expense, expense);
        assert_eq!(loaded.plan, plan);
        assert_eq!(loaded.steps, steps);

        let pending = repo
            .list_pending_for_approver(&UserId("a-1".to_string()))
            .await
            .expect("pending");
        assert_eq!(pending, vec![expense]);
    }

    #[tokio::test]
    async fn in_memory_commit_enforces_the_version_check() {
        let repo = InMemoryExpenseRepository::default();
        let expense = sample_expense();
        let plan = ApprovalPlan {
            rule_type: RuleType::Percentage,
            percentage: Some(100),
            specific_approver_id: None,
        };
        let steps = vec![
            ApprovalStep::outstanding(expense.id.clone(), UserId("a-1".to_string()), 0),
            ApprovalStep::outstanding(expense.id.clone(), UserId("a-2".to_string()), 1),
        ];
        repo.create_with_steps(&expense, &plan, &steps).await.expect("create");

        let first =
            apply_decision(&expense, &plan, &steps, &UserId("a-1".to_string()), true, None, Utc::now())
                .expect("first decision");
        let second =
            apply_decision(&expense, &plan, &steps, &UserId("a-2".to_string()), true, None, Utc::now())
                .expect("second decision");

        repo.commit_decision(&first, expense.status_version).await.expect("first commit");
        let error = repo
            .commit_decision(&second, expense.status_version)
            .await
            .expect_err("stale commit must conflict");
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }
}
