use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

impl CompanyId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// A tenant. Created once at admin signup and immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub base_currency: String,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn new(name: impl Into<String>, base_currency: impl Into<String>) -> Self {
        Self {
            id: CompanyId::generate(),
            name: name.into(),
            base_currency: base_currency.into(),
            created_at: Utc::now(),
        }
    }
}
