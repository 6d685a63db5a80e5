use std::sync::Arc;

use expensa_core::config::AppConfig;
use expensa_core::notify::Notifier;
use expensa_db::{
    CompanyRepository, DbPool, ExpenseRepository, RuleRepository, SqlCompanyRepository,
    SqlExpenseRepository, SqlRuleRepository, SqlUserRepository, UserRepository,
};

/// Shared handler state. Repositories are trait objects so tests can swap
/// the SQL implementations for in-memory ones without touching handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub companies: Arc<dyn CompanyRepository>,
    pub users: Arc<dyn UserRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub expenses: Arc<dyn ExpenseRepository>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn with_pool(config: AppConfig, pool: DbPool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config: Arc::new(config),
            companies: Arc::new(SqlCompanyRepository::new(pool.clone())),
            users: Arc::new(SqlUserRepository::new(pool.clone())),
            rules: Arc::new(SqlRuleRepository::new(pool.clone())),
            expenses: Arc::new(SqlExpenseRepository::new(pool)),
            notifier,
        }
    }
}
