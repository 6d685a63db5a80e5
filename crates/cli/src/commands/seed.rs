use chrono::Utc;
use rust_decimal::Decimal;

use expensa_core::config::{AppConfig, LoadOptions};
use expensa_core::domain::company::Company;
use expensa_core::domain::rule::{
    ApprovalRule, ApprovalRuleId, RuleApprover, RuleConditions, RuleType,
};
use expensa_core::domain::user::{User, UserId, UserRole};
use expensa_db::{
    connect_with_settings, migrations, CompanyRepository, RuleRepository, SqlCompanyRepository,
    SqlRuleRepository, SqlUserRepository, UserRepository,
};

use crate::commands::CommandResult;

const DEMO_COMPANY: &str = "Acme Demo";
const DEMO_PASSWORD: &str = "expensa-demo";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let outcome = load_fixtures(&config, &pool).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

/// Inserts one company, four users, and one percentage rule with fixed ids.
/// Re-running against an already seeded database is a no-op.
async fn load_fixtures(
    config: &AppConfig,
    pool: &expensa_db::DbPool,
) -> Result<String, (&'static str, String, u8)> {
    let companies = SqlCompanyRepository::new(pool.clone());
    let users = SqlUserRepository::new(pool.clone());
    let rules = SqlRuleRepository::new(pool.clone());

    let existing = companies
        .find_by_name(DEMO_COMPANY)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
    if existing.is_some() {
        return Ok(format!("`{DEMO_COMPANY}` already seeded, nothing to do"));
    }

    let mut company = Company::new(DEMO_COMPANY, "USD");
    company.id.0 = "seed-company".to_string();
    companies
        .insert(company.clone())
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

    let password_hash = bcrypt::hash(DEMO_PASSWORD, config.auth.bcrypt_cost)
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

    let fixtures = [
        ("seed-admin", "admin@acmedemo.test", UserRole::Admin, None),
        ("seed-manager", "morgan.manager@acmedemo.test", UserRole::Manager, None),
        ("seed-employee-1", "taylor@acmedemo.test", UserRole::Employee, Some("seed-manager")),
        ("seed-employee-2", "jordan@acmedemo.test", UserRole::Employee, Some("seed-manager")),
    ];
    for (id, email, role, manager) in fixtures {
        users
            .insert(User {
                id: UserId(id.to_string()),
                company_id: company.id.clone(),
                email: email.to_string(),
                password_hash: password_hash.clone(),
                role,
                manager_id: manager.map(|value| UserId(value.to_string())),
                created_at: Utc::now(),
            })
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
    }

    rules
        .insert(ApprovalRule {
            id: ApprovalRuleId("seed-rule-travel".to_string()),
            company_id: company.id.clone(),
            name: "travel manager sign-off".to_string(),
            is_active: true,
            rule_type: RuleType::Percentage,
            percentage: Some(60),
            specific_approver_role: None,
            approvers: vec![RuleApprover { role: UserRole::Manager, order: 1, required: true }],
            conditions: RuleConditions {
                min_amount: Some(Decimal::new(10_000, 2)),
                category: Some("Travel".to_string()),
                department: None,
            },
            updated_at: Utc::now(),
        })
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

    Ok(format!(
        "seeded `{DEMO_COMPANY}` with 4 users and 1 approval rule (demo password `{DEMO_PASSWORD}`)"
    ))
}
