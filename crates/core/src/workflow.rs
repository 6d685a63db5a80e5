//! The approval state machine: applies one approver's decision to an
//! expense's step set and decides the overall disposition.
//!
//! Pure function over immutable values. The caller owns the transactional
//! boundary: it loads the expense, plan, and steps, calls [`apply_decision`],
//! and persists the returned outcome under an optimistic version check.

use chrono::{DateTime, Utc};

use crate::domain::expense::{Expense, ExpenseStatus};
use crate::domain::rule::RuleType;
use crate::domain::step::{ApprovalPlan, ApprovalStep};
use crate::domain::user::UserId;
use crate::errors::WorkflowError;

#[derive(Clone, Debug, PartialEq)]
pub struct DecisionOutcome {
    /// The expense with its (possibly finalized) status and bumped version.
    pub expense: Expense,
    /// The full step set after the decision, moot flags included.
    pub steps: Vec<ApprovalStep>,
    pub finalized: bool,
    pub status: ExpenseStatus,
}

/// Records `approved` for `approver_id` on the expense's step set.
///
/// Decisions are not replayable: a second decision on the same step, a
/// decision by a non-assigned user, and any decision on a finalized expense
/// all fail with [`WorkflowError`] and change nothing.
pub fn apply_decision(
    expense: &Expense,
    plan: &ApprovalPlan,
    steps: &[ApprovalStep],
    approver_id: &UserId,
    approved: bool,
    comment: Option<String>,
    now: DateTime<Utc>,
) -> Result<DecisionOutcome, WorkflowError> {
    if expense.status.is_final() {
        return Err(WorkflowError::ExpenseAlreadyFinalized { status: expense.status });
    }

    let mut steps = steps.to_vec();
    let step = steps
        .iter_mut()
        .find(|step| &step.approver_id == approver_id)
        .ok_or_else(|| WorkflowError::NotAnAssignedApprover { approver_id: approver_id.0.clone() })?;

    if step.is_decided() {
        return Err(WorkflowError::StepAlreadyDecided { approver_id: approver_id.0.clone() });
    }
    if step.moot {
        return Err(WorkflowError::NotAnAssignedApprover { approver_id: approver_id.0.clone() });
    }

    step.decision = Some(approved);
    step.comments = comment;
    step.decided_at = Some(now);

    let mut expense = expense.clone();
    let disposition = evaluate(plan, &steps);

    if let Some(final_status) = disposition {
        expense.transition_to(final_status)?;
        // Short-circuited steps stay in the record for audit but never
        // accept a decision.
        for remaining in steps.iter_mut().filter(|step| !step.is_decided()) {
            remaining.moot = true;
        }
    } else {
        expense.status_version += 1;
    }

    let status = expense.status;
    Ok(DecisionOutcome { expense, steps, finalized: disposition.is_some(), status })
}

/// Evaluates the whole step set against the plan. `None` means the expense
/// stays pending.
fn evaluate(plan: &ApprovalPlan, steps: &[ApprovalStep]) -> Option<ExpenseStatus> {
    if let Some(specific_id) = &plan.specific_approver_id {
        if let Some(step) = steps.iter().find(|step| &step.approver_id == specific_id) {
            match step.decision {
                Some(true) => return Some(ExpenseStatus::Approved),
                // A lone designated approver decides outright; under a
                // hybrid plan the percentage branch may still approve.
                Some(false) if plan.rule_type == RuleType::SpecificApprover => {
                    return Some(ExpenseStatus::Rejected);
                }
                _ => {}
            }
        }
    }

    if let Some(threshold) = plan.percentage_threshold() {
        let pool: Vec<&ApprovalStep> = steps
            .iter()
            .filter(|step| {
                plan.rule_type != RuleType::Hybrid || !plan.is_specific_approver(&step.approver_id)
            })
            .collect();

        if !pool.is_empty() {
            let total = pool.len();
            let approved = pool.iter().filter(|step| step.decision == Some(true)).count();
            let undecided = pool.iter().filter(|step| step.is_outstanding()).count();
            let threshold = usize::from(threshold);

            if approved * 100 >= threshold * total {
                return Some(ExpenseStatus::Approved);
            }
            // Early rejection: even if every outstanding approver said yes,
            // the threshold is out of reach.
            if (approved + undecided) * 100 < threshold * total {
                return Some(ExpenseStatus::Rejected);
            }
            return None;
        }
    }

    // Hybrid whose percentage pool collapsed onto the specific approver:
    // their rejection leaves no live branch.
    if plan.rule_type == RuleType::Hybrid {
        if let Some(specific_id) = &plan.specific_approver_id {
            let rejected = steps
                .iter()
                .any(|step| &step.approver_id == specific_id && step.decision == Some(false));
            if rejected {
                return Some(ExpenseStatus::Rejected);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use crate::domain::company::CompanyId;
    use crate::domain::expense::{Expense, ExpenseStatus};
    use crate::domain::rule::RuleType;
    use crate::domain::step::{ApprovalPlan, ApprovalStep};
    use crate::domain::user::UserId;
    use crate::errors::WorkflowError;

    use super::{apply_decision, DecisionOutcome};

    fn expense() -> Expense {
        Expense::submit(
            UserId("u-submitter".to_string()),
            CompanyId("c-1".to_string()),
            Decimal::new(20_000, 2),
            "USD",
            "Travel",
            "",
            NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date"),
        )
        .expect("valid expense")
    }

    fn steps(expense: &Expense, approvers: &[&str]) -> Vec<ApprovalStep> {
        approvers
            .iter()
            .enumerate()
            .map(|(index, approver)| {
                ApprovalStep::outstanding(
                    expense.id.clone(),
                    UserId(approver.to_string()),
                    index as u32,
                )
            })
            .collect()
    }

    fn percentage_plan(percentage: u8) -> ApprovalPlan {
        ApprovalPlan {
            rule_type: RuleType::Percentage,
            percentage: Some(percentage),
            specific_approver_id: None,
        }
    }

    fn specific_plan(approver: &str) -> ApprovalPlan {
        ApprovalPlan {
            rule_type: RuleType::SpecificApprover,
            percentage: None,
            specific_approver_id: Some(UserId(approver.to_string())),
        }
    }

    fn hybrid_plan(percentage: u8, approver: &str) -> ApprovalPlan {
        ApprovalPlan {
            rule_type: RuleType::Hybrid,
            percentage: Some(percentage),
            specific_approver_id: Some(UserId(approver.to_string())),
        }
    }

    fn decide(
        outcome_expense: &Expense,
        plan: &ApprovalPlan,
        steps: &[ApprovalStep],
        approver: &str,
        approved: bool,
    ) -> Result<DecisionOutcome, WorkflowError> {
        apply_decision(
            outcome_expense,
            plan,
            steps,
            &UserId(approver.to_string()),
            approved,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn sixty_percent_of_three_finalizes_on_the_second_approval() {
        let expense = expense();
        let plan = percentage_plan(60);
        let steps = steps(&expense, &["a-1", "a-2", "a-3"]);

        let first = decide(&expense, &plan, &steps, "a-1", true).expect("first approval");
        assert!(!first.finalized);
        assert_eq!(first.status, ExpenseStatus::Pending);

        let second =
            decide(&first.expense, &plan, &first.steps, "a-2", true).expect("second approval");
        assert!(second.finalized);
        assert_eq!(second.status, ExpenseStatus::Approved);
        // The third step is retained for audit but marked moot.
        let third = second.steps.iter().find(|step| step.approver_id.0 == "a-3").expect("step");
        assert!(third.moot);
        assert!(!third.is_decided());
    }

    #[test]
    fn percentage_rejects_early_when_the_threshold_is_unreachable() {
        let expense = expense();
        let plan = percentage_plan(60);
        let steps = steps(&expense, &["a-1", "a-2", "a-3"]);

        let first = decide(&expense, &plan, &steps, "a-1", false).expect("first rejection");
        assert!(!first.finalized);

        // Best case after two rejections is 1/3 < 60%.
        let second =
            decide(&first.expense, &plan, &first.steps, "a-2", false).expect("second rejection");
        assert!(second.finalized);
        assert_eq!(second.status, ExpenseStatus::Rejected);
    }

    #[test]
    fn designated_approver_rejection_finalizes_immediately() {
        let expense = expense();
        let plan = specific_plan("a-boss");
        let steps = steps(&expense, &["a-boss"]);

        let outcome = decide(&expense, &plan, &steps, "a-boss", false).expect("rejection");
        assert!(outcome.finalized);
        assert_eq!(outcome.status, ExpenseStatus::Rejected);
    }

    #[test]
    fn designated_approver_approval_finalizes_immediately() {
        let expense = expense();
        let plan = specific_plan("a-boss");
        let steps = steps(&expense, &["a-boss"]);

        let outcome = decide(&expense, &plan, &steps, "a-boss", true).expect("approval");
        assert!(outcome.finalized);
        assert_eq!(outcome.status, ExpenseStatus::Approved);
    }

    #[test]
    fn hybrid_approves_via_two_of_four_percentage_approvals() {
        let expense = expense();
        let plan = hybrid_plan(50, "a-ceo");
        let steps = steps(&expense, &["a-ceo", "a-1", "a-2", "a-3", "a-4"]);

        let first = decide(&expense, &plan, &steps, "a-1", true).expect("first approval");
        assert!(!first.finalized);

        let second =
            decide(&first.expense, &plan, &first.steps, "a-2", true).expect("second approval");
        assert!(second.finalized);
        assert_eq!(second.status, ExpenseStatus::Approved);
    }

    #[test]
    fn hybrid_approves_via_a_single_ceo_approval() {
        let expense = expense();
        let plan = hybrid_plan(50, "a-ceo");
        let steps = steps(&expense, &["a-ceo", "a-1", "a-2", "a-3", "a-4"]);

        let outcome = decide(&expense, &plan, &steps, "a-ceo", true).expect("ceo approval");
        assert!(outcome.finalized);
        assert_eq!(outcome.status, ExpenseStatus::Approved);
        assert!(outcome
            .steps
            .iter()
            .filter(|step| step.approver_id.0 != "a-ceo")
            .all(|step| step.moot));
    }

    #[test]
    fn hybrid_ceo_rejection_alone_does_not_finalize() {
        let expense = expense();
        let plan = hybrid_plan(50, "a-ceo");
        let steps = steps(&expense, &["a-ceo", "a-1", "a-2", "a-3", "a-4"]);

        let outcome = decide(&expense, &plan, &steps, "a-ceo", false).expect("ceo rejection");
        assert!(!outcome.finalized);
        assert_eq!(outcome.status, ExpenseStatus::Pending);

        // The percentage branch can still approve afterwards.
        let first = decide(&outcome.expense, &plan, &outcome.steps, "a-1", true).expect("approve");
        let second = decide(&first.expense, &plan, &first.steps, "a-2", true).expect("approve");
        assert!(second.finalized);
        assert_eq!(second.status, ExpenseStatus::Approved);
    }

    #[test]
    fn hybrid_rejects_once_the_percentage_threshold_is_unreachable() {
        let expense = expense();
        let plan = hybrid_plan(50, "a-ceo");
        let steps = steps(&expense, &["a-ceo", "a-1", "a-2", "a-3", "a-4"]);

        let first = decide(&expense, &plan, &steps, "a-1", false).expect("reject");
        let second = decide(&first.expense, &plan, &first.steps, "a-2", false).expect("reject");
        assert!(!second.finalized);

        // Third percentage rejection leaves a best case of 1/4 < 50%.
        let third = decide(&second.expense, &plan, &second.steps, "a-3", false).expect("reject");
        assert!(third.finalized);
        assert_eq!(third.status, ExpenseStatus::Rejected);
    }

    #[test]
    fn replaying_a_decision_fails_and_changes_nothing() {
        let expense = expense();
        let plan = percentage_plan(60);
        let steps = steps(&expense, &["a-1", "a-2", "a-3"]);

        let first = decide(&expense, &plan, &steps, "a-1", true).expect("first approval");
        let error = decide(&first.expense, &plan, &first.steps, "a-1", false)
            .expect_err("replay should fail");

        assert_eq!(error, WorkflowError::StepAlreadyDecided { approver_id: "a-1".to_string() });
        assert_eq!(first.expense.status, ExpenseStatus::Pending);
    }

    #[test]
    fn decisions_on_a_finalized_expense_fail() {
        let expense = expense();
        let plan = specific_plan("a-boss");
        let steps = steps(&expense, &["a-boss"]);

        let finalized = decide(&expense, &plan, &steps, "a-boss", true).expect("approval");
        let error = decide(&finalized.expense, &plan, &finalized.steps, "a-boss", true)
            .expect_err("finalized expense should refuse decisions");

        assert_eq!(
            error,
            WorkflowError::ExpenseAlreadyFinalized { status: ExpenseStatus::Approved }
        );
    }

    #[test]
    fn unassigned_users_cannot_decide() {
        let expense = expense();
        let plan = percentage_plan(60);
        let steps = steps(&expense, &["a-1", "a-2", "a-3"]);

        let error = decide(&expense, &plan, &steps, "a-intruder", true)
            .expect_err("unassigned approver should fail");
        assert_eq!(
            error,
            WorkflowError::NotAnAssignedApprover { approver_id: "a-intruder".to_string() }
        );
    }

    #[test]
    fn status_version_moves_on_every_recorded_decision() {
        let expense = expense();
        let plan = percentage_plan(100);
        let steps = steps(&expense, &["a-1", "a-2"]);
        assert_eq!(expense.status_version, 1);

        let first = decide(&expense, &plan, &steps, "a-1", true).expect("first approval");
        assert_eq!(first.expense.status_version, 2);

        let second =
            decide(&first.expense, &plan, &first.steps, "a-2", true).expect("second approval");
        assert_eq!(second.expense.status_version, 3);
        assert!(second.finalized);
    }

    #[test]
    fn comments_and_timestamps_land_on_the_decided_step() {
        let expense = expense();
        let plan = specific_plan("a-boss");
        let steps = steps(&expense, &["a-boss"]);
        let now = Utc::now();

        let outcome = apply_decision(
            &expense,
            &plan,
            &steps,
            &UserId("a-boss".to_string()),
            true,
            Some("looks right".to_string()),
            now,
        )
        .expect("approval");

        let step = &outcome.steps[0];
        assert_eq!(step.decision, Some(true));
        assert_eq!(step.comments.as_deref(), Some("looks right"));
        assert_eq!(step.decided_at, Some(now));
    }
}
