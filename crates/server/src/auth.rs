//! Signup, login, and the bearer-token extractor. Tokens are HS256 JWTs
//! carrying the caller's identity; handlers receive it as [`AuthUser`] and
//! pass it explicitly into the workflow.

use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use expensa_core::config::AuthConfig;
use expensa_core::domain::company::{Company, CompanyId};
use expensa_core::domain::user::{User, UserId, UserRole};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub company_id: String,
    pub role: String,
    pub exp: i64,
}

/// The verified caller identity, extracted from the `Authorization` header.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub role: UserRole,
}

impl AuthUser {
    pub fn require_role(&self, role: UserRole) -> Result<(), ApiError> {
        if self.role == role {
            return Ok(());
        }
        Err(ApiError::Forbidden(format!(
            "this operation requires the {} role",
            role.as_str()
        )))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("malformed authorization header".to_string()))?;

        let claims = verify_token(&state.config.auth, token)?;
        let role = UserRole::parse(&claims.role)
            .ok_or_else(|| ApiError::Unauthorized("token carries an unknown role".to_string()))?;

        Ok(Self {
            user_id: UserId(claims.sub),
            company_id: CompanyId(claims.company_id),
            role,
        })
    }
}

pub fn issue_token(config: &AuthConfig, user: &User) -> Result<String, ApiError> {
    let expires_at = Utc::now() + Duration::hours(config.token_ttl_hours as i64);
    let claims = Claims {
        sub: user.id.0.clone(),
        company_id: user.company_id.0.clone(),
        role: user.role.as_str().to_string(),
        exp: expires_at.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.expose_secret().as_bytes()),
    )
    .map_err(|error| ApiError::Internal(format!("could not sign token: {error}")))
}

fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|error| ApiError::Unauthorized(format!("invalid token: {error}")))
}

pub fn hash_password(config: &AuthConfig, password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, config.bcrypt_cost)
        .map_err(|error| ApiError::Internal(format!("could not hash password: {error}")))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    bcrypt::verify(password, hash)
        .map_err(|error| ApiError::Internal(format!("could not verify password: {error}")))
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub company_name: String,
    #[serde(default = "default_currency")]
    pub base_currency: String,
    pub email: String,
    pub password: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub id: String,
    pub email: String,
    pub role: String,
    pub company_id: String,
    pub manager_id: Option<String>,
}

impl From<&User> for UserPayload {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.0.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            company_id: user.company_id.0.clone(),
            manager_id: user.manager_id.as_ref().map(|id| id.0.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserPayload,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Registers a company together with its first admin. A company that
/// already has an admin cannot be signed up again.
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let company_name = payload.company_name.trim();
    if company_name.is_empty() {
        return Err(ApiError::Validation("company_name is required".to_string()));
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

    let company = match state.companies.find_by_name(company_name).await? {
        Some(existing) => {
            let roster = state.users.list_for_company(&existing.id).await?;
            if roster.iter().any(|user| user.role == UserRole::Admin) {
                return Err(ApiError::Validation(format!(
                    "company `{company_name}` already has an admin"
                )));
            }
            existing
        }
        None => {
            let company = Company::new(company_name, payload.base_currency.trim());
            state.companies.insert(company.clone()).await?;
            company
        }
    };

    let admin = User {
        id: UserId::generate(),
        company_id: company.id.clone(),
        email: payload.email.trim().to_string(),
        password_hash: hash_password(&state.config.auth, &payload.password)?,
        role: UserRole::Admin,
        manager_id: None,
        created_at: Utc::now(),
    };
    state.users.insert(admin.clone()).await?;

    tracing::info!(
        event_name = "auth.signup.completed",
        company_id = %company.id.0,
        user_id = %admin.id.0,
        "company registered with first admin"
    );

    let token = issue_token(&state.config.auth, &admin)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user: UserPayload::from(&admin) })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .users
        .find_by_email(payload.email.trim())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".to_string()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("invalid credentials".to_string()));
    }

    let token = issue_token(&state.config.auth, &user)?;
    Ok(Json(AuthResponse { token, user: UserPayload::from(&user) }))
}
