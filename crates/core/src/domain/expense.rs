use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::company::CompanyId;
use crate::domain::user::UserId;
use crate::errors::{ApplicationError, WorkflowError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpenseId(pub String);

impl ExpenseId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub amount: Decimal,
    pub currency: String,
    pub category: String,
    pub description: String,
    /// Submitter's department at submission time, when the company tracks
    /// one. Rule conditions on department match against this.
    pub department: Option<String>,
    pub date: NaiveDate,
    pub status: ExpenseStatus,
    /// Bumped on every status-affecting write. The persistence layer uses it
    /// as the compare-and-set guard so two concurrent decisions cannot both
    /// finalize the same expense.
    pub status_version: u32,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Builds a freshly submitted expense, rejecting malformed input before
    /// any workflow evaluation happens.
    pub fn submit(
        user_id: UserId,
        company_id: CompanyId,
        amount: Decimal,
        currency: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
        date: NaiveDate,
    ) -> Result<Self, ApplicationError> {
        let currency = currency.into();
        let category = category.into();

        if amount <= Decimal::ZERO {
            return Err(ApplicationError::Validation(format!(
                "expense amount must be positive, got {amount}"
            )));
        }
        if currency.trim().is_empty() {
            return Err(ApplicationError::Validation("expense currency is required".to_string()));
        }
        if category.trim().is_empty() {
            return Err(ApplicationError::Validation("expense category is required".to_string()));
        }

        Ok(Self {
            id: ExpenseId::generate(),
            user_id,
            company_id,
            amount,
            currency,
            category,
            description: description.into(),
            department: None,
            date,
            status: ExpenseStatus::Pending,
            status_version: 1,
            created_at: Utc::now(),
        })
    }

    pub fn can_transition_to(&self, next: ExpenseStatus) -> bool {
        matches!(
            (self.status, next),
            (ExpenseStatus::Pending, ExpenseStatus::Approved)
                | (ExpenseStatus::Pending, ExpenseStatus::Rejected)
        )
    }

    pub fn transition_to(&mut self, next: ExpenseStatus) -> Result<(), WorkflowError> {
        if self.can_transition_to(next) {
            self.status = next;
            self.status_version += 1;
            return Ok(());
        }

        Err(WorkflowError::InvalidExpenseTransition { from: self.status, to: next })
    }
}
