use thiserror::Error;

use crate::domain::expense::ExpenseStatus;

/// Violations of the approval state machine. Every variant means "no state
/// was changed".
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("invalid expense transition from {from:?} to {to:?}")]
    InvalidExpenseTransition { from: ExpenseStatus, to: ExpenseStatus },
    #[error("expense is already finalized as {status:?}")]
    ExpenseAlreadyFinalized { status: ExpenseStatus },
    #[error("approver `{approver_id}` has no outstanding step on this expense")]
    NotAnAssignedApprover { approver_id: String },
    #[error("approver `{approver_id}` already decided this step")]
    StepAlreadyDecided { approver_id: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("approval configuration error: {0}")]
    Configuration(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("concurrent update conflict: {0}")]
    Conflict(String),
}
