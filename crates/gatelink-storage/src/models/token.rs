use chrono::{DateTime, Utc};
use gatelink_core::{AccessToken, TokenOwner};
use serde::{Deserialize, Serialize};

/// Row of the `rfid_tokens` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RfidToken {
    /// Auto-increment primary key
    pub id: i64,

    /// Owner; `None` once the owner row is deleted.
    pub user_id: Option<i64>,

    /// Code sent by the reader after `RFID:`.
    pub rfid_code: String,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl RfidToken {
    /// New active token, not yet persisted (`id` is 0).
    pub fn new(rfid_code: impl Into<String>, user_id: Option<i64>) -> Self {
        Self {
            id: 0,
            user_id,
            rfid_code: rfid_code.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Token joined with its owner, as read by the access lookup.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TokenWithOwner {
    pub id: i64,
    pub rfid_code: String,
    pub is_active: bool,
    pub owner_id: Option<i64>,
    pub owner_name: Option<String>,
    pub owner_active: Option<bool>,
}

impl From<TokenWithOwner> for AccessToken {
    fn from(row: TokenWithOwner) -> Self {
        let owner = match (row.owner_id, row.owner_name) {
            (Some(id), Some(name)) => Some(TokenOwner {
                id,
                name,
                active: row.owner_active.unwrap_or(false),
            }),
            _ => None,
        };

        AccessToken {
            id: row.id,
            code: row.rfid_code,
            active: row.is_active,
            owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_with_owner() {
        let token: AccessToken = TokenWithOwner {
            id: 3,
            rfid_code: "AB12CD34".into(),
            is_active: true,
            owner_id: Some(7),
            owner_name: Some("Ada".into()),
            owner_active: Some(true),
        }
        .into();

        assert_eq!(token.id, 3);
        assert!(token.owner_active());
        assert_eq!(token.owner_name(), Some("Ada"));
    }

    #[test]
    fn test_row_without_owner() {
        let token: AccessToken = TokenWithOwner {
            id: 3,
            rfid_code: "AB12CD34".into(),
            is_active: true,
            owner_id: None,
            owner_name: None,
            owner_active: None,
        }
        .into();

        assert!(token.owner.is_none());
        assert!(!token.owner_active());
    }
}
