use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;

use expensa_core::domain::user::{User, UserId, UserRole};

use crate::auth::{hash_password, AuthUser, UserPayload};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: String,
    pub manager_id: Option<String>,
}

/// Admin-only: adds a manager or employee to the caller's company.
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserPayload>), ApiError> {
    auth.require_role(UserRole::Admin)?;

    let role = UserRole::parse(&payload.role)
        .ok_or_else(|| ApiError::Validation(format!("unknown role `{}`", payload.role)))?;
    if role == UserRole::Admin {
        return Err(ApiError::Validation(
            "additional admins cannot be created through this endpoint".to_string(),
        ));
    }
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation("email and password are required".to_string()));
    }

    if state.users.find_by_email(payload.email.trim()).await?.is_some() {
        return Err(ApiError::Conflict(format!(
            "email `{}` is already registered",
            payload.email.trim()
        )));
    }

    let manager_id = match payload.manager_id {
        Some(raw) => {
            let manager_id = UserId(raw);
            let manager = state
                .users
                .find_by_id(&manager_id)
                .await?
                .filter(|manager| manager.company_id == auth.company_id)
                .ok_or_else(|| {
                    ApiError::Validation(format!(
                        "manager `{}` does not exist in this company",
                        manager_id.0
                    ))
                })?;
            Some(manager.id)
        }
        None => None,
    };

    let user = User {
        id: UserId::generate(),
        company_id: auth.company_id.clone(),
        email: payload.email.trim().to_string(),
        password_hash: hash_password(&state.config.auth, &payload.password)?,
        role,
        manager_id,
        created_at: Utc::now(),
    };
    state.users.insert(user.clone()).await?;

    tracing::info!(
        event_name = "users.created",
        company_id = %auth.company_id.0,
        user_id = %user.id.0,
        role = user.role.as_str(),
        "user created"
    );

    Ok((StatusCode::CREATED, Json(UserPayload::from(&user))))
}
