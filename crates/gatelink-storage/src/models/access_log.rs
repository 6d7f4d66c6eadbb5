use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use gatelink_core::{AccessDecision, AccessStatus};
use serde::{Deserialize, Serialize};

/// Access log entry, one per decision.
///
/// # Fields
///
/// * `rfid_token_id` - NULL when the presented code matched no token
/// * `rfid_code` - code as presented, always stored
/// * `access_status` - `AUTHORIZED` or `UNAUTHORIZED`
/// * `denied_reason` - canonical denial text, NULL when granted
/// * `access_time` - decision time (monotonic, wall-anchored)
/// * `created_at` - when the row was written
///
/// # Examples
///
/// ```
/// use gatelink_core::{AccessDecision, AccessStatus, DenialReason};
/// use gatelink_storage::models::AccessLog;
/// use chrono::Utc;
///
/// let decision = AccessDecision::deny(DenialReason::InvalidToken, "DEADBEEF", None, Utc::now());
/// let log = AccessLog::from_decision(&decision);
///
/// assert_eq!(log.rfid_token_id, None);
/// assert_eq!(log.access_status, "UNAUTHORIZED");
/// assert_eq!(log.denied_reason.as_deref(), Some("Invalid RFID token"));
/// assert_eq!(log.status().unwrap(), AccessStatus::Unauthorized);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessLog {
    /// Auto-increment primary key
    pub id: i64,

    pub rfid_token_id: Option<i64>,

    pub rfid_code: String,

    pub access_status: String,

    pub is_granted: bool,

    pub denied_reason: Option<String>,

    pub owner_name: Option<String>,

    pub access_time: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl AccessLog {
    /// Build an unsaved entry (`id` is 0) for a decision.
    pub fn from_decision(decision: &AccessDecision) -> Self {
        Self {
            id: 0,
            rfid_token_id: decision.token_id,
            rfid_code: decision.code.clone(),
            access_status: decision.status().as_str().to_string(),
            is_granted: decision.granted,
            denied_reason: decision.denied_reason.map(|r| r.as_str().to_string()),
            owner_name: decision.owner_name.clone(),
            access_time: decision.timestamp,
            created_at: Utc::now(),
        }
    }

    /// Parsed `access_status` column.
    pub fn status(&self) -> StorageResult<AccessStatus> {
        self.access_status
            .parse()
            .map_err(|e: gatelink_core::Error| StorageError::InvalidData(e.to_string()))
    }
}

impl From<&AccessDecision> for AccessLog {
    fn from(decision: &AccessDecision) -> Self {
        Self::from_decision(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatelink_core::{AccessToken, TokenOwner};

    #[test]
    fn test_from_granted_decision() {
        let token = AccessToken {
            id: 9,
            code: "AB12CD34".into(),
            active: true,
            owner: Some(TokenOwner {
                id: 1,
                name: "Ada".into(),
                active: true,
            }),
        };
        let decision = AccessDecision::grant(&token, Utc::now());
        let log = AccessLog::from_decision(&decision);

        assert_eq!(log.rfid_token_id, Some(9));
        assert_eq!(log.rfid_code, "AB12CD34");
        assert!(log.is_granted);
        assert_eq!(log.access_status, "AUTHORIZED");
        assert_eq!(log.denied_reason, None);
        assert_eq!(log.owner_name.as_deref(), Some("Ada"));
        assert_eq!(log.access_time, decision.timestamp);
    }

    #[test]
    fn test_status_rejects_garbage() {
        let mut log = AccessLog::from_decision(&AccessDecision::deny(
            gatelink_core::DenialReason::TokenInactive,
            "AB12CD34",
            None,
            Utc::now(),
        ));
        log.access_status = "MAYBE".into();
        assert!(matches!(log.status(), Err(StorageError::InvalidData(_))));
    }
}
