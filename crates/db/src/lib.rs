pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    CompanyRepository, ExpenseRepository, ExpenseWorkflow, InMemoryCompanyRepository,
    InMemoryExpenseRepository, InMemoryRuleRepository, InMemoryUserRepository, RepositoryError,
    RuleRepository, SqlCompanyRepository, SqlExpenseRepository, SqlRuleRepository,
    SqlUserRepository, UserRepository,
};
