//! Step generation: expanding a selected rule (or the direct-manager
//! fallback) into the concrete approval steps for one expense, bound to
//! resolved users.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::expense::Expense;
use crate::domain::rule::{ApprovalRule, RuleType};
use crate::domain::step::{ApprovalPlan, ApprovalStep};
use crate::domain::user::{User, UserId, UserRole};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no user holds role `{role}` in this company")]
    NoApproverForRole { role: String },
    #[error("role `{role}` maps to {count} users and no direct manager disambiguates")]
    AmbiguousApproverForRole { role: String, count: usize },
    #[error("submitter `{user_id}` has no manager and no rule matched")]
    MissingManager { user_id: String },
    #[error("rule `{rule_name}` resolved to an empty approver set")]
    EmptyApproverSet { rule_name: String },
}

/// The company's user directory, as the generator sees it.
#[derive(Clone, Debug)]
pub struct CompanyRoster {
    users_by_id: HashMap<UserId, User>,
}

impl CompanyRoster {
    pub fn new(users: Vec<User>) -> Self {
        let users_by_id = users.into_iter().map(|user| (user.id.clone(), user)).collect();
        Self { users_by_id }
    }

    pub fn find(&self, user_id: &UserId) -> Option<&User> {
        self.users_by_id.get(user_id)
    }

    pub fn manager_of(&self, user_id: &UserId) -> Option<&User> {
        let user = self.find(user_id)?;
        let manager_id = user.manager_id.as_ref()?;
        self.find(manager_id)
    }

    pub fn holders_of(&self, role: UserRole) -> Vec<&User> {
        let mut holders: Vec<&User> =
            self.users_by_id.values().filter(|user| user.role == role).collect();
        holders.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        holders
    }
}

/// Unsaved steps plus the satisfaction condition to persist alongside the
/// expense.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedWorkflow {
    pub plan: ApprovalPlan,
    pub steps: Vec<ApprovalStep>,
}

/// Expands `rule` (or, when `None`, the default direct-manager plan) into
/// the ordered step list for `expense`. Pure: nothing is persisted here.
pub fn plan_workflow(
    expense: &Expense,
    rule: Option<&ApprovalRule>,
    roster: &CompanyRoster,
) -> Result<GeneratedWorkflow, ConfigurationError> {
    match rule {
        Some(rule) => generate_steps(expense, rule, roster),
        None => fallback_workflow(expense, roster),
    }
}

pub fn generate_steps(
    expense: &Expense,
    rule: &ApprovalRule,
    roster: &CompanyRoster,
) -> Result<GeneratedWorkflow, ConfigurationError> {
    let specific_approver_id = match rule.specific_approver_role {
        Some(role) => Some(resolve_role(role, &expense.user_id, roster)?),
        None => None,
    };

    let mut approver_ids: Vec<UserId> = Vec::new();
    if let Some(approver_id) = &specific_approver_id {
        approver_ids.push(approver_id.clone());
    }

    if rule.rule_type.has_percentage_branch() {
        let mut listed = rule.approvers.clone();
        listed.sort_by_key(|approver| approver.order);
        for listed_approver in &listed {
            let resolved = resolve_role(listed_approver.role, &expense.user_id, roster)?;
            // One step per distinct approver; a hybrid rule whose listed
            // approver is also the specific approver collapses to one step.
            if !approver_ids.contains(&resolved) {
                approver_ids.push(resolved);
            }
        }
    }

    // The submitter never approves their own expense.
    approver_ids.retain(|approver_id| approver_id != &expense.user_id);

    if approver_ids.is_empty() {
        return Err(ConfigurationError::EmptyApproverSet { rule_name: rule.name.clone() });
    }

    let steps = approver_ids
        .into_iter()
        .enumerate()
        .map(|(index, approver_id)| {
            ApprovalStep::outstanding(expense.id.clone(), approver_id, index as u32)
        })
        .collect();

    Ok(GeneratedWorkflow {
        plan: ApprovalPlan {
            rule_type: rule.rule_type,
            percentage: rule.percentage,
            specific_approver_id,
        },
        steps,
    })
}

/// Default plan when no rule matched: a single required step for the
/// submitter's direct manager.
fn fallback_workflow(
    expense: &Expense,
    roster: &CompanyRoster,
) -> Result<GeneratedWorkflow, ConfigurationError> {
    let manager = roster
        .manager_of(&expense.user_id)
        .ok_or_else(|| ConfigurationError::MissingManager { user_id: expense.user_id.0.clone() })?;

    Ok(GeneratedWorkflow {
        plan: ApprovalPlan {
            rule_type: RuleType::SpecificApprover,
            percentage: None,
            specific_approver_id: Some(manager.id.clone()),
        },
        steps: vec![ApprovalStep::outstanding(expense.id.clone(), manager.id.clone(), 0)],
    })
}

/// Maps a role to one concrete user. A Manager role prefers the submitter's
/// direct manager; otherwise the role must have exactly one holder.
fn resolve_role(
    role: UserRole,
    submitter_id: &UserId,
    roster: &CompanyRoster,
) -> Result<UserId, ConfigurationError> {
    if role == UserRole::Manager {
        if let Some(manager) = roster.manager_of(submitter_id) {
            if manager.role == UserRole::Manager {
                return Ok(manager.id.clone());
            }
        }
    }

    let holders = roster.holders_of(role);
    match holders.as_slice() {
        [] => Err(ConfigurationError::NoApproverForRole { role: role.as_str().to_string() }),
        [only] => Ok(only.id.clone()),
        many => Err(ConfigurationError::AmbiguousApproverForRole {
            role: role.as_str().to_string(),
            count: many.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use crate::domain::company::CompanyId;
    use crate::domain::expense::Expense;
    use crate::domain::rule::{
        ApprovalRule, ApprovalRuleId, RuleApprover, RuleConditions, RuleType,
    };
    use crate::domain::user::{User, UserId, UserRole};

    use super::{plan_workflow, CompanyRoster, ConfigurationError};

    fn user(id: &str, role: UserRole, manager: Option<&str>) -> User {
        User {
            id: UserId(id.to_string()),
            company_id: CompanyId("c-1".to_string()),
            email: format!("{id}@example.test"),
            password_hash: "x".to_string(),
            role,
            manager_id: manager.map(|value| UserId(value.to_string())),
            created_at: Utc::now(),
        }
    }

    fn roster() -> CompanyRoster {
        CompanyRoster::new(vec![
            user("u-admin", UserRole::Admin, None),
            user("u-mgr-1", UserRole::Manager, Some("u-admin")),
            user("u-mgr-2", UserRole::Manager, Some("u-admin")),
            user("u-emp", UserRole::Employee, Some("u-mgr-1")),
        ])
    }

    fn expense(submitter: &str) -> Expense {
        Expense::submit(
            UserId(submitter.to_string()),
            CompanyId("c-1".to_string()),
            Decimal::new(12_000, 2),
            "USD",
            "Travel",
            "",
            NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date"),
        )
        .expect("valid expense")
    }

    fn rule(rule_type: RuleType, approver_roles: &[UserRole]) -> ApprovalRule {
        ApprovalRule {
            id: ApprovalRuleId("r-1".to_string()),
            company_id: CompanyId("c-1".to_string()),
            name: "policy".to_string(),
            is_active: true,
            rule_type,
            percentage: rule_type.has_percentage_branch().then_some(60),
            specific_approver_role: rule_type.has_specific_branch().then_some(UserRole::Admin),
            approvers: approver_roles
                .iter()
                .enumerate()
                .map(|(index, role)| RuleApprover {
                    role: *role,
                    order: index as u32 + 1,
                    required: true,
                })
                .collect(),
            conditions: RuleConditions::default(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn specific_approver_rule_yields_one_resolved_step() {
        let generated = plan_workflow(
            &expense("u-emp"),
            Some(&rule(RuleType::SpecificApprover, &[])),
            &roster(),
        )
        .expect("generation should succeed");

        assert_eq!(generated.steps.len(), 1);
        assert_eq!(generated.steps[0].approver_id.0, "u-admin");
        assert_eq!(generated.plan.specific_approver_id.as_ref().map(|id| id.0.as_str()), Some("u-admin"));
        assert!(generated.steps[0].is_outstanding());
    }

    #[test]
    fn percentage_rule_yields_one_step_per_listed_approver_in_order() {
        let generated = plan_workflow(
            &expense("u-emp"),
            Some(&rule(RuleType::Percentage, &[UserRole::Manager, UserRole::Admin])),
            &roster(),
        )
        .expect("generation should succeed");

        let approvers: Vec<&str> =
            generated.steps.iter().map(|step| step.approver_id.0.as_str()).collect();
        // Manager role resolves to the submitter's direct manager.
        assert_eq!(approvers, vec!["u-mgr-1", "u-admin"]);
        let indexes: Vec<u32> = generated.steps.iter().map(|step| step.sequence_index).collect();
        assert_eq!(indexes, vec![0, 1]);
    }

    #[test]
    fn hybrid_rule_unions_specific_and_percentage_steps_without_duplicates() {
        let generated = plan_workflow(
            &expense("u-emp"),
            Some(&rule(RuleType::Hybrid, &[UserRole::Manager, UserRole::Admin])),
            &roster(),
        )
        .expect("generation should succeed");

        // Admin appears once even though it is both the specific approver
        // and a listed percentage approver.
        let approvers: Vec<&str> =
            generated.steps.iter().map(|step| step.approver_id.0.as_str()).collect();
        assert_eq!(approvers, vec!["u-admin", "u-mgr-1"]);
        assert_eq!(generated.plan.percentage, Some(60));
    }

    #[test]
    fn manager_role_without_direct_manager_is_ambiguous_across_two_managers() {
        // u-admin has no manager_id, so the Manager role cannot be
        // disambiguated between u-mgr-1 and u-mgr-2.
        let error = plan_workflow(
            &expense("u-admin"),
            Some(&rule(RuleType::Percentage, &[UserRole::Manager])),
            &roster(),
        )
        .expect_err("ambiguous manager should fail");

        assert_eq!(
            error,
            ConfigurationError::AmbiguousApproverForRole { role: "manager".to_string(), count: 2 }
        );
    }

    #[test]
    fn unstaffed_role_is_a_configuration_error() {
        let thin_roster = CompanyRoster::new(vec![user("u-emp", UserRole::Employee, None)]);
        let error = plan_workflow(
            &expense("u-emp"),
            Some(&rule(RuleType::SpecificApprover, &[])),
            &thin_roster,
        )
        .expect_err("missing admin should fail");

        assert_eq!(error, ConfigurationError::NoApproverForRole { role: "admin".to_string() });
    }

    #[test]
    fn fallback_routes_to_the_direct_manager() {
        let generated =
            plan_workflow(&expense("u-emp"), None, &roster()).expect("fallback should succeed");

        assert_eq!(generated.steps.len(), 1);
        assert_eq!(generated.steps[0].approver_id.0, "u-mgr-1");
        assert_eq!(generated.plan.rule_type, RuleType::SpecificApprover);
    }

    #[test]
    fn fallback_without_a_manager_is_a_configuration_error() {
        let orphan_roster = CompanyRoster::new(vec![user("u-emp", UserRole::Employee, None)]);
        let error = plan_workflow(&expense("u-emp"), None, &orphan_roster)
            .expect_err("missing manager should fail");

        assert_eq!(error, ConfigurationError::MissingManager { user_id: "u-emp".to_string() });
    }

    #[test]
    fn submitter_is_never_their_own_approver() {
        // u-mgr-1 submits under a rule listing the Manager role; resolution
        // would land on themselves via role holders, leaving admin only.
        let generated = plan_workflow(
            &expense("u-mgr-1"),
            Some(&rule(RuleType::Hybrid, &[UserRole::Admin])),
            &roster(),
        )
        .expect("generation should succeed");

        assert!(generated.steps.iter().all(|step| step.approver_id.0 != "u-mgr-1"));
    }
}
