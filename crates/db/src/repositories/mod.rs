use async_trait::async_trait;
use thiserror::Error;

use expensa_core::domain::company::{Company, CompanyId};
use expensa_core::domain::expense::{Expense, ExpenseId};
use expensa_core::domain::rule::ApprovalRule;
use expensa_core::domain::step::{ApprovalPlan, ApprovalStep};
use expensa_core::domain::user::{User, UserId};
use expensa_core::workflow::DecisionOutcome;

pub mod company;
pub mod expense;
pub mod memory;
pub mod rule;
pub mod user;

pub use company::SqlCompanyRepository;
pub use expense::SqlExpenseRepository;
pub use memory::{
    InMemoryCompanyRepository, InMemoryExpenseRepository, InMemoryRuleRepository,
    InMemoryUserRepository,
};
pub use rule::SqlRuleRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    /// The optimistic version check failed: another decision committed first.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// An expense together with its persisted satisfaction plan and step set,
/// loaded as one consistent snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpenseWorkflow {
    pub expense: Expense,
    pub plan: ApprovalPlan,
    pub steps: Vec<ApprovalStep>,
}

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn insert(&self, company: Company) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: User) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn list_for_company(&self, company_id: &CompanyId)
        -> Result<Vec<User>, RepositoryError>;
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn insert(&self, rule: ApprovalRule) -> Result<(), RepositoryError>;
    async fn list_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApprovalRule>, RepositoryError>;
    async fn list_active_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ApprovalRule>, RepositoryError>;
}

#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Persists the expense, its plan, and its generated steps in one
    /// transaction. Steps never exist without their expense.
    async fn create_with_steps(
        &self,
        expense: &Expense,
        plan: &ApprovalPlan,
        steps: &[ApprovalStep],
    ) -> Result<(), RepositoryError>;

    async fn load_workflow(
        &self,
        expense_id: &ExpenseId,
    ) -> Result<Option<ExpenseWorkflow>, RepositoryError>;

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Expense>, RepositoryError>;

    /// Expenses with an outstanding step assigned to `approver_id`.
    async fn list_pending_for_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<Expense>, RepositoryError>;

    /// Writes a decision outcome in one transaction, guarded by the
    /// expense's `status_version` as read before the decision was applied.
    /// A stale version yields [`RepositoryError::Conflict`] and writes
    /// nothing.
    async fn commit_decision(
        &self,
        outcome: &DecisionOutcome,
        expected_version: u32,
    ) -> Result<(), RepositoryError>;
}
