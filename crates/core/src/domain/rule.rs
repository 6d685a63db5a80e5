use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::company::CompanyId;
use crate::domain::user::UserRole;
use crate::errors::ApplicationError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalRuleId(pub String);

impl ApprovalRuleId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Percentage,
    SpecificApprover,
    Hybrid,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::SpecificApprover => "specific_approver",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "percentage" => Some(Self::Percentage),
            "specific_approver" => Some(Self::SpecificApprover),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    pub fn has_percentage_branch(&self) -> bool {
        matches!(self, Self::Percentage | Self::Hybrid)
    }

    pub fn has_specific_branch(&self) -> bool {
        matches!(self, Self::SpecificApprover | Self::Hybrid)
    }
}

/// One entry in a rule's approver list, expanded into a concrete step at
/// submission time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApprover {
    pub role: UserRole,
    pub order: u32,
    pub required: bool,
}

/// Matching conditions. An unset field (or the UI's "all" sentinel) always
/// matches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConditions {
    pub min_amount: Option<Decimal>,
    pub category: Option<String>,
    pub department: Option<String>,
}

impl RuleConditions {
    fn normalized(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
    }

    pub fn effective_category(&self) -> Option<&str> {
        Self::normalized(&self.category)
    }

    pub fn effective_department(&self) -> Option<&str> {
        Self::normalized(&self.department)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub id: ApprovalRuleId,
    pub company_id: CompanyId,
    pub name: String,
    pub is_active: bool,
    pub rule_type: RuleType,
    /// Required for `Percentage` and `Hybrid`, 1..=100.
    pub percentage: Option<u8>,
    /// Required for `SpecificApprover` and `Hybrid`.
    pub specific_approver_role: Option<UserRole>,
    pub approvers: Vec<RuleApprover>,
    pub conditions: RuleConditions,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRule {
    /// Checks the cross-field invariants before a rule is accepted into
    /// company configuration.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        match (self.rule_type.has_percentage_branch(), self.percentage) {
            (true, None) => {
                return Err(ApplicationError::Validation(format!(
                    "rule `{}` requires a percentage for type {}",
                    self.name,
                    self.rule_type.as_str()
                )));
            }
            (true, Some(percentage)) if !(1..=100).contains(&percentage) => {
                return Err(ApplicationError::Validation(format!(
                    "rule `{}` percentage must be within 1..=100, got {percentage}",
                    self.name
                )));
            }
            (false, Some(_)) => {
                return Err(ApplicationError::Validation(format!(
                    "rule `{}` must not carry a percentage for type {}",
                    self.name,
                    self.rule_type.as_str()
                )));
            }
            _ => {}
        }

        match (self.rule_type.has_specific_branch(), self.specific_approver_role) {
            (true, None) => {
                return Err(ApplicationError::Validation(format!(
                    "rule `{}` requires a specific approver for type {}",
                    self.name,
                    self.rule_type.as_str()
                )));
            }
            (false, Some(_)) => {
                return Err(ApplicationError::Validation(format!(
                    "rule `{}` must not name a specific approver for type {}",
                    self.name,
                    self.rule_type.as_str()
                )));
            }
            _ => {}
        }

        if self.rule_type.has_percentage_branch() && self.approvers.is_empty() {
            return Err(ApplicationError::Validation(format!(
                "rule `{}` requires a non-empty approver list for type {}",
                self.name,
                self.rule_type.as_str()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::company::CompanyId;
    use crate::domain::user::UserRole;

    use super::{ApprovalRule, ApprovalRuleId, RuleApprover, RuleConditions, RuleType};

    fn rule(rule_type: RuleType) -> ApprovalRule {
        ApprovalRule {
            id: ApprovalRuleId("r-1".to_string()),
            company_id: CompanyId("c-1".to_string()),
            name: "travel policy".to_string(),
            is_active: true,
            rule_type,
            percentage: rule_type.has_percentage_branch().then_some(60),
            specific_approver_role: rule_type.has_specific_branch().then_some(UserRole::Admin),
            approvers: vec![RuleApprover { role: UserRole::Manager, order: 1, required: true }],
            conditions: RuleConditions::default(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn validate_accepts_each_well_formed_rule_type() {
        for rule_type in [RuleType::Percentage, RuleType::SpecificApprover, RuleType::Hybrid] {
            rule(rule_type).validate().expect("well-formed rule");
        }
    }

    #[test]
    fn percentage_is_mandatory_for_percentage_and_hybrid_rules() {
        for rule_type in [RuleType::Percentage, RuleType::Hybrid] {
            let mut subject = rule(rule_type);
            subject.percentage = None;
            subject.validate().expect_err("missing percentage should fail");
        }
    }

    #[test]
    fn specific_approver_is_mandatory_for_specific_and_hybrid_rules() {
        for rule_type in [RuleType::SpecificApprover, RuleType::Hybrid] {
            let mut subject = rule(rule_type);
            subject.specific_approver_role = None;
            subject.validate().expect_err("missing specific approver should fail");
        }
    }

    #[test]
    fn percentage_out_of_range_is_rejected() {
        let mut subject = rule(RuleType::Percentage);
        subject.percentage = Some(0);
        subject.validate().expect_err("0% should fail");
        subject.percentage = Some(101);
        subject.validate().expect_err("101% should fail");
    }

    #[test]
    fn stray_fields_for_the_wrong_rule_type_are_rejected() {
        let mut subject = rule(RuleType::SpecificApprover);
        subject.percentage = Some(50);
        subject.validate().expect_err("percentage on specific_approver should fail");

        let mut subject = rule(RuleType::Percentage);
        subject.specific_approver_role = Some(UserRole::Admin);
        subject.validate().expect_err("specific approver on percentage should fail");
    }

    #[test]
    fn all_sentinel_conditions_are_treated_as_unset() {
        let conditions = RuleConditions {
            min_amount: None,
            category: Some("all".to_string()),
            department: Some("  ".to_string()),
        };
        assert_eq!(conditions.effective_category(), None);
        assert_eq!(conditions.effective_department(), None);
    }
}
