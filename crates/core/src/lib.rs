pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod rules;
pub mod steps;
pub mod workflow;

pub use domain::company::{Company, CompanyId};
pub use domain::expense::{Expense, ExpenseId, ExpenseStatus};
pub use domain::rule::{
    ApprovalRule, ApprovalRuleId, RuleApprover, RuleConditions, RuleType,
};
pub use domain::step::{ApprovalPlan, ApprovalStep};
pub use domain::user::{User, UserId, UserRole};
pub use errors::{ApplicationError, WorkflowError};
pub use notify::{NoopNotifier, Notifier, TracingNotifier, WorkflowEvent};
pub use rules::select_rule;
pub use steps::{generate_steps, plan_workflow, CompanyRoster, ConfigurationError, GeneratedWorkflow};
pub use workflow::{apply_decision, DecisionOutcome};

pub use chrono;
pub use rust_decimal;
