use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::expense::ExpenseId;
use crate::domain::rule::RuleType;
use crate::domain::user::UserId;

/// One approver's pending or resolved decision on one expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub expense_id: ExpenseId,
    pub approver_id: UserId,
    pub sequence_index: u32,
    /// `None` while outstanding, then `Some(true)` / `Some(false)` forever.
    pub decision: Option<bool>,
    pub comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Set when a short-circuit finalization made the step irrelevant. Moot
    /// steps are kept for audit and never accept a decision.
    pub moot: bool,
}

impl ApprovalStep {
    pub fn outstanding(expense_id: ExpenseId, approver_id: UserId, sequence_index: u32) -> Self {
        Self {
            expense_id,
            approver_id,
            sequence_index,
            decision: None,
            comments: None,
            decided_at: None,
            moot: false,
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decision.is_some()
    }

    pub fn is_outstanding(&self) -> bool {
        self.decision.is_none() && !self.moot
    }
}

/// The satisfaction condition snapshotted at submission time. Rules are
/// evaluated once; the plan, not the rule, drives every later decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPlan {
    pub rule_type: RuleType,
    pub percentage: Option<u8>,
    /// Resolved concrete user for the specific-approver branch.
    pub specific_approver_id: Option<UserId>,
}

impl ApprovalPlan {
    pub fn percentage_threshold(&self) -> Option<u8> {
        self.rule_type.has_percentage_branch().then(|| self.percentage.unwrap_or(100))
    }

    pub fn is_specific_approver(&self, user_id: &UserId) -> bool {
        self.specific_approver_id.as_ref() == Some(user_id)
    }
}
