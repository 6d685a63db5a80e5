//! Notification seam. The workflow reports step assignment and finalization
//! here; delivery is somebody else's problem and carries no guarantee.

use crate::domain::expense::{ExpenseId, ExpenseStatus};
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowEvent {
    StepAssigned { expense_id: ExpenseId },
    ExpenseFinalized { expense_id: ExpenseId, status: ExpenseStatus },
    /// No rule matched and the default direct-manager plan was used.
    RuleFallback { expense_id: ExpenseId },
}

pub trait Notifier: Send + Sync {
    /// Fire-and-forget; implementations must not fail the calling workflow.
    fn notify(&self, user_id: &UserId, event: WorkflowEvent);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _user_id: &UserId, _event: WorkflowEvent) {}
}

/// Logs events through the ambient tracing subscriber in place of a real
/// delivery channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, user_id: &UserId, event: WorkflowEvent) {
        match event {
            WorkflowEvent::StepAssigned { expense_id } => {
                tracing::info!(
                    event_name = "workflow.step.assigned",
                    user_id = %user_id.0,
                    expense_id = %expense_id.0,
                    "approval step assigned"
                );
            }
            WorkflowEvent::ExpenseFinalized { expense_id, status } => {
                tracing::info!(
                    event_name = "workflow.expense.finalized",
                    user_id = %user_id.0,
                    expense_id = %expense_id.0,
                    status = status.as_str(),
                    "expense finalized"
                );
            }
            WorkflowEvent::RuleFallback { expense_id } => {
                tracing::warn!(
                    event_name = "workflow.rule.fallback",
                    user_id = %user_id.0,
                    expense_id = %expense_id.0,
                    "no approval rule matched, using direct-manager fallback"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::expense::ExpenseId;
    use crate::domain::user::UserId;

    use super::{NoopNotifier, Notifier, WorkflowEvent};

    #[test]
    fn noop_notifier_swallows_events() {
        NoopNotifier.notify(
            &UserId("u-1".to_string()),
            WorkflowEvent::StepAssigned { expense_id: ExpenseId("e-1".to_string()) },
        );
    }
}
