//! Rule selection: given an expense and the company's configured approval
//! rules, pick the one that governs the expense's workflow.

use crate::domain::expense::Expense;
use crate::domain::rule::ApprovalRule;

/// Selects the governing rule for `expense`, or `None` when no active rule
/// matches and the caller should fall back to the default direct-manager
/// plan.
///
/// Deterministic: active rules whose conditions all hold are ranked by
/// specificity (count of set condition fields), ties broken by the most
/// recently updated rule.
pub fn select_rule<'a>(expense: &Expense, rules: &'a [ApprovalRule]) -> Option<&'a ApprovalRule> {
    let mut matches: Vec<&ApprovalRule> =
        rules.iter().filter(|rule| rule.is_active && rule_matches(rule, expense)).collect();

    matches.sort_by(|left, right| {
        specificity(right)
            .cmp(&specificity(left))
            .then_with(|| right.updated_at.cmp(&left.updated_at))
            .then_with(|| left.id.0.cmp(&right.id.0))
    });

    matches.into_iter().next()
}

fn rule_matches(rule: &ApprovalRule, expense: &Expense) -> bool {
    if let Some(min_amount) = rule.conditions.min_amount {
        if expense.amount < min_amount {
            return false;
        }
    }

    if let Some(category) = rule.conditions.effective_category() {
        if !category.eq_ignore_ascii_case(expense.category.trim()) {
            return false;
        }
    }

    if let Some(department) = rule.conditions.effective_department() {
        let expense_department = expense.department.as_deref().map(str::trim);
        if !expense_department.map_or(false, |value| department.eq_ignore_ascii_case(value)) {
            return false;
        }
    }

    true
}

fn specificity(rule: &ApprovalRule) -> usize {
    usize::from(rule.conditions.min_amount.is_some())
        + usize::from(rule.conditions.effective_category().is_some())
        + usize::from(rule.conditions.effective_department().is_some())
}
