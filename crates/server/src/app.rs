use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::{auth, expenses, rules, users};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/users", post(users::create_user))
        .route("/api/rules", post(rules::create_rule).get(rules::list_rules))
        .route("/api/expenses", post(expenses::submit_expense))
        .route("/api/expenses/mine", get(expenses::list_mine))
        .route("/api/expenses/pending", get(expenses::list_pending))
        .route("/api/expenses/approve", post(expenses::decide))
        .with_state(state)
}
