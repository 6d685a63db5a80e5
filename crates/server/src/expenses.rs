//! Expense submission and the decision endpoint. Submission evaluates the
//! rule set once and persists the resulting plan; decisions replay the
//! state machine over a loaded snapshot and commit under the optimistic
//! version check, retrying a bounded number of times on conflict.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use expensa_core::domain::expense::{Expense, ExpenseId, ExpenseStatus};
use expensa_core::domain::user::UserRole;
use expensa_core::notify::WorkflowEvent;
use expensa_core::steps::CompanyRoster;
use expensa_core::workflow::apply_decision;
use expensa_core::{plan_workflow, select_rule};
use expensa_db::RepositoryError;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitExpenseRequest {
    pub amount: Decimal,
    pub currency: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub department: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SubmitExpenseResponse {
    pub expense: Expense,
    pub approver_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub expense_id: String,
    pub approved: bool,
    pub comments: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub expense_id: String,
    pub status: ExpenseStatus,
    pub finalized: bool,
}

/// Employee-only: validates the expense, selects the most specific active
/// rule, expands it into steps, and persists everything in one transaction.
pub async fn submit_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SubmitExpenseRequest>,
) -> Result<(StatusCode, Json<SubmitExpenseResponse>), ApiError> {
    auth.require_role(UserRole::Employee)?;

    let mut expense = Expense::submit(
        auth.user_id.clone(),
        auth.company_id.clone(),
        payload.amount,
        payload.currency.trim(),
        payload.category.trim(),
        payload.description.trim(),
        payload.date,
    )?;
    expense.department = payload
        .department
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let rules = state.rules.list_active_for_company(&auth.company_id).await?;
    let selected = select_rule(&expense, &rules);
    let fell_back = selected.is_none();

    let roster = CompanyRoster::new(state.users.list_for_company(&auth.company_id).await?);
    let workflow = plan_workflow(&expense, selected, &roster)?;

    state.expenses.create_with_steps(&expense, &workflow.plan, &workflow.steps).await?;

    if fell_back {
        state
            .notifier
            .notify(&auth.user_id, WorkflowEvent::RuleFallback { expense_id: expense.id.clone() });
    }
    for step in &workflow.steps {
        state.notifier.notify(
            &step.approver_id,
            WorkflowEvent::StepAssigned { expense_id: expense.id.clone() },
        );
    }

    tracing::info!(
        event_name = "expenses.submitted",
        company_id = %auth.company_id.0,
        expense_id = %expense.id.0,
        rule_type = workflow.plan.rule_type.as_str(),
        step_count = workflow.steps.len(),
        fallback = fell_back,
        "expense submitted"
    );

    let approver_ids =
        workflow.steps.iter().map(|step| step.approver_id.0.clone()).collect();
    Ok((StatusCode::CREATED, Json(SubmitExpenseResponse { expense, approver_ids })))
}

pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let expenses = state.expenses.list_for_user(&auth.user_id).await?;
    Ok(Json(expenses))
}

pub async fn list_pending(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let expenses = state.expenses.list_pending_for_approver(&auth.user_id).await?;
    Ok(Json(expenses))
}

/// Records the caller's decision. On a version conflict the snapshot is
/// reloaded and the decision replayed, up to the configured attempt limit.
pub async fn decide(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let expense_id = ExpenseId(payload.expense_id);
    let attempts = state.config.workflow.decision_retry_attempts;

    for attempt in 1..=attempts {
        let workflow = state
            .expenses
            .load_workflow(&expense_id)
            .await?
            .filter(|workflow| workflow.expense.company_id == auth.company_id)
            .ok_or_else(|| {
                ApiError::NotFound(format!("expense `{}` was not found", expense_id.0))
            })?;

        let loaded_version = workflow.expense.status_version;
        let outcome = apply_decision(
            &workflow.expense,
            &workflow.plan,
            &workflow.steps,
            &auth.user_id,
            payload.approved,
            payload.comments.clone(),
            Utc::now(),
        )?;

        match state.expenses.commit_decision(&outcome, loaded_version).await {
            Ok(()) => {
                if outcome.finalized {
                    state.notifier.notify(
                        &outcome.expense.user_id,
                        WorkflowEvent::ExpenseFinalized {
                            expense_id: outcome.expense.id.clone(),
                            status: outcome.status,
                        },
                    );
                }

                tracing::info!(
                    event_name = "expenses.decision.recorded",
                    expense_id = %expense_id.0,
                    approver_id = %auth.user_id.0,
                    approved = payload.approved,
                    finalized = outcome.finalized,
                    status = outcome.status.as_str(),
                    "decision recorded"
                );

                return Ok(Json(DecisionResponse {
                    expense_id: expense_id.0,
                    status: outcome.status,
                    finalized: outcome.finalized,
                }));
            }
            Err(RepositoryError::Conflict(_)) => {
                tracing::warn!(
                    event_name = "expenses.decision.conflict",
                    expense_id = %expense_id.0,
                    approver_id = %auth.user_id.0,
                    attempt,
                    "concurrent decision beat this commit, reloading"
                );
            }
            Err(error) => return Err(error.into()),
        }
    }

    Err(ApiError::Conflict(format!(
        "could not record decision on `{}` after {attempts} attempts",
        expense_id.0
    )))
}
