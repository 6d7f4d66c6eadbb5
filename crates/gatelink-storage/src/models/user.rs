use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner of one or more RFID tokens.
///
/// An inactive user is denied even when presenting an active token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Auto-increment primary key
    pub id: i64,

    pub name: String,

    pub email: Option<String>,

    pub phone: Option<String>,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// New active user, not yet persisted (`id` is 0).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            email: None,
            phone: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
