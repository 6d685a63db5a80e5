use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;

use expensa_core::domain::rule::{
    ApprovalRule, ApprovalRuleId, RuleApprover, RuleConditions, RuleType,
};
use expensa_core::domain::user::UserRole;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RuleApproverRequest {
    pub role: String,
    pub order: u32,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RuleConditionsRequest {
    pub min_amount: Option<Decimal>,
    pub category: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    pub rule_type: String,
    pub percentage: Option<u8>,
    pub specific_approver_role: Option<String>,
    #[serde(default)]
    pub approvers: Vec<RuleApproverRequest>,
    #[serde(default)]
    pub conditions: RuleConditionsRequest,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

fn parse_role(raw: &str) -> Result<UserRole, ApiError> {
    UserRole::parse(raw).ok_or_else(|| ApiError::Validation(format!("unknown role `{raw}`")))
}

/// Admin-only: defines an approval rule for the caller's company. The rule
/// is validated as a whole before anything is persisted.
pub async fn create_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<ApprovalRule>), ApiError> {
    auth.require_role(UserRole::Admin)?;

    let rule_type = RuleType::parse(&payload.rule_type).ok_or_else(|| {
        ApiError::Validation(format!("unknown rule type `{}`", payload.rule_type))
    })?;

    let specific_approver_role =
        payload.specific_approver_role.as_deref().map(parse_role).transpose()?;

    let approvers = payload
        .approvers
        .into_iter()
        .map(|approver| {
            Ok(RuleApprover {
                role: parse_role(&approver.role)?,
                order: approver.order,
                required: approver.required,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let rule = ApprovalRule {
        id: ApprovalRuleId::generate(),
        company_id: auth.company_id.clone(),
        name: payload.name.trim().to_string(),
        is_active: payload.is_active,
        rule_type,
        percentage: payload.percentage,
        specific_approver_role,
        approvers,
        conditions: RuleConditions {
            min_amount: payload.conditions.min_amount,
            category: payload.conditions.category,
            department: payload.conditions.department,
        },
        updated_at: Utc::now(),
    };
    rule.validate()?;

    state.rules.insert(rule.clone()).await?;

    tracing::info!(
        event_name = "rules.created",
        company_id = %auth.company_id.0,
        rule_id = %rule.id.0,
        rule_type = rule.rule_type.as_str(),
        "approval rule created"
    );

    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn list_rules(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ApprovalRule>>, ApiError> {
    auth.require_role(UserRole::Admin)?;
    let rules = state.rules.list_for_company(&auth.company_id).await?;
    Ok(Json(rules))
}
