//! Access decision engine.
//!
//! Turns a presented RFID code into an [`AccessDecision`]. The policy is
//! evaluated in a fixed order, failing at the first denial:
//!
//! 1. **Token lookup**: no token for the code → `Invalid RFID token`
//! 2. **Token active**: token disabled → `RFID token is inactive`
//! 3. **Owner active**: owner disabled or missing → `User is inactive`
//! 4. **Grant**
//!
//! A lookup that fails with a storage error is denied with
//! `Token lookup failed`; the engine never grants on uncertainty.
//!
//! # Logging
//!
//! Every decision, including unknown codes, produces exactly one append to
//! the access log. The append runs as a tracked background task so the caller
//! can acknowledge the device without waiting for the database. Failed
//! appends are reported by [`reap`](AccessDecisionEngine::reap) and
//! [`drain`](AccessDecisionEngine::drain) and are not retried.

use gatelink_core::{AccessDecision, AccessToken, DenialReason, MonotonicClock};
use gatelink_storage::{AccessLog, AccessLogRepository, StorageResult, TokenRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

/// Result of one background log append.
#[derive(Debug)]
struct LogOutcome {
    code: String,
    result: StorageResult<i64>,
}

/// A log append that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFailure {
    /// Code of the decision being logged, if known.
    pub code: Option<String>,
    pub error: String,
}

/// Apply the access policy to a lookup result.
///
/// Returns `None` when access is granted.
pub fn evaluate(token: Option<&AccessToken>) -> Option<DenialReason> {
    match token {
        None => Some(DenialReason::InvalidToken),
        Some(token) if !token.active => Some(DenialReason::TokenInactive),
        Some(token) if !token.owner_active() => Some(DenialReason::UserInactive),
        Some(_) => None,
    }
}

pub struct AccessDecisionEngine<T, L> {
    tokens: T,
    logs: Arc<L>,
    clock: MonotonicClock,
    pending: JoinSet<LogOutcome>,
}

impl<T, L> AccessDecisionEngine<T, L>
where
    T: TokenRepository,
    L: AccessLogRepository + 'static,
{
    pub fn new(tokens: T, logs: L) -> Self {
        Self::with_clock(tokens, logs, MonotonicClock::new())
    }

    pub fn with_clock(tokens: T, logs: L, clock: MonotonicClock) -> Self {
        Self {
            tokens,
            logs: Arc::new(logs),
            clock,
            pending: JoinSet::new(),
        }
    }

    /// Decide on a presented code and schedule its log entry.
    ///
    /// Returns as soon as the decision is known; the log write may still be
    /// in flight.
    pub async fn decide(&mut self, code: &str) -> AccessDecision {
        let lookup = self.tokens.find_by_code(code).await;
        let timestamp = self.clock.now();

        let decision = match lookup {
            Ok(token) => match (evaluate(token.as_ref()), token.as_ref()) {
                (None, Some(token)) => AccessDecision::grant(token, timestamp),
                (reason, token) => AccessDecision::deny(
                    reason.unwrap_or(DenialReason::InvalidToken),
                    code,
                    token,
                    timestamp,
                ),
            },
            Err(e) => {
                error!(code = %code, error = %e, "Token lookup failed, denying access");
                AccessDecision::deny(DenialReason::LookupFailed, code, None, timestamp)
            }
        };

        self.record(&decision);
        decision
    }

    fn record(&mut self, decision: &AccessDecision) {
        let logs = Arc::clone(&self.logs);
        let entry = AccessLog::from_decision(decision);

        self.pending.spawn(async move {
            let result = logs.append(&entry).await;
            LogOutcome {
                code: entry.rfid_code,
                result,
            }
        });
    }

    /// Number of log writes still in flight or not yet reaped.
    pub fn pending_logs(&self) -> usize {
        self.pending.len()
    }

    /// Collect finished log writes without waiting.
    pub fn reap(&mut self) -> Vec<LogFailure> {
        let mut failures = Vec::new();
        while let Some(joined) = self.pending.try_join_next() {
            failures.extend(Self::classify(joined));
        }
        failures
    }

    /// Wait for in-flight log writes for at most `grace`, then abort the rest.
    pub async fn drain(&mut self, grace: Duration) -> Vec<LogFailure> {
        let deadline = Instant::now() + grace;
        let mut failures = Vec::new();

        loop {
            match tokio::time::timeout_at(deadline, self.pending.join_next()).await {
                Ok(Some(joined)) => failures.extend(Self::classify(joined)),
                Ok(None) => break,
                Err(_) => {
                    let abandoned = self.pending.len();
                    warn!(
                        abandoned,
                        grace_ms = grace.as_millis() as u64,
                        "Grace period elapsed, abandoning access log writes"
                    );
                    self.pending.shutdown().await;
                    failures.extend((0..abandoned).map(|_| LogFailure {
                        code: None,
                        error: "abandoned at shutdown".to_string(),
                    }));
                    break;
                }
            }
        }

        debug!(failures = failures.len(), "Access log writes drained");
        failures
    }

    fn classify(joined: Result<LogOutcome, JoinError>) -> Option<LogFailure> {
        match joined {
            Ok(LogOutcome {
                code,
                result: Ok(id),
            }) => {
                trace!(code = %code, log_id = id, "Access log written");
                None
            }
            Ok(LogOutcome {
                code,
                result: Err(e),
            }) => {
                error!(code = %code, error = %e, "Failed to write access log");
                Some(LogFailure {
                    code: Some(code),
                    error: e.to_string(),
                })
            }
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                error!(error = %e, "Access log task panicked");
                Some(LogFailure {
                    code: None,
                    error: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatelink_core::TokenOwner;
    use gatelink_storage::{
        Database, RfidToken, SqliteAccessLogRepository, SqliteTokenRepository,
        SqliteUserRepository, StorageError, User, UserRepository,
    };
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn token(active: bool, owner: Option<bool>) -> AccessToken {
        AccessToken {
            id: 1,
            code: "AB12CD34".into(),
            active,
            owner: owner.map(|active| TokenOwner {
                id: 10,
                name: "Ada".into(),
                active,
            }),
        }
    }

    #[rstest]
    #[case(None, Some(DenialReason::InvalidToken))]
    #[case(Some(token(false, Some(true))), Some(DenialReason::TokenInactive))]
    #[case(Some(token(false, Some(false))), Some(DenialReason::TokenInactive))]
    #[case(Some(token(true, Some(false))), Some(DenialReason::UserInactive))]
    #[case(Some(token(true, None)), Some(DenialReason::UserInactive))]
    #[case(Some(token(true, Some(true))), None)]
    fn test_policy_precedence(
        #[case] token: Option<AccessToken>,
        #[case] expected: Option<DenialReason>,
    ) {
        assert_eq!(evaluate(token.as_ref()), expected);
    }

    struct FailingTokens;

    impl TokenRepository for FailingTokens {
        async fn find_by_code(&self, _code: &str) -> StorageResult<Option<AccessToken>> {
            Err(StorageError::Configuration("database unavailable".into()))
        }

        async fn create(&self, _token: &RfidToken) -> StorageResult<i64> {
            unreachable!()
        }

        async fn set_active(&self, _id: i64, _active: bool) -> StorageResult<()> {
            unreachable!()
        }
    }

    #[derive(Default)]
    struct CountingLogs {
        appends: Arc<AtomicUsize>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl AccessLogRepository for CountingLogs {
        async fn append(&self, _log: &AccessLog) -> StorageResult<i64> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let n = self.appends.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(StorageError::Configuration("disk full".into()));
            }
            Ok(n as i64)
        }

        async fn recent(&self, _limit: i64) -> StorageResult<Vec<AccessLog>> {
            Ok(Vec::new())
        }

        async fn find_by_code(&self, _code: &str, _limit: i64) -> StorageResult<Vec<AccessLog>> {
            Ok(Vec::new())
        }

        async fn count(&self) -> StorageResult<i64> {
            Ok(self.appends.load(Ordering::SeqCst) as i64)
        }
    }

    async fn seeded() -> (
        Database,
        AccessDecisionEngine<SqliteTokenRepository, SqliteAccessLogRepository>,
    ) {
        let db = Database::in_memory().await.unwrap();
        let users = SqliteUserRepository::new(db.pool().clone());
        let tokens = SqliteTokenRepository::new(db.pool().clone());

        let active = users.create(&User::new("Ada")).await.unwrap();
        let inactive = users.create(&User::new("Bob").inactive()).await.unwrap();
        tokens
            .create(&RfidToken::new("AB12CD34", Some(active)))
            .await
            .unwrap();
        tokens
            .create(&RfidToken::new("DISABLED1", Some(active)).inactive())
            .await
            .unwrap();
        tokens
            .create(&RfidToken::new("BOBCARD01", Some(inactive)))
            .await
            .unwrap();

        let engine = AccessDecisionEngine::new(
            tokens,
            SqliteAccessLogRepository::new(db.pool().clone()),
        );
        (db, engine)
    }

    #[tokio::test]
    async fn test_grant_active_token() {
        let (db, mut engine) = seeded().await;

        let decision = engine.decide("AB12CD34").await;
        assert!(decision.granted);
        assert_eq!(decision.denied_reason, None);
        assert!(decision.token_id.is_some());
        assert_eq!(decision.owner_name.as_deref(), Some("Ada"));

        assert!(engine.drain(Duration::from_secs(2)).await.is_empty());
        let logs = SqliteAccessLogRepository::new(db.pool().clone());
        let entries = logs.recent(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_granted);
        assert_eq!(entries[0].rfid_token_id, decision.token_id);
    }

    #[rstest]
    #[case("DISABLED1", DenialReason::TokenInactive, true)]
    #[case("BOBCARD01", DenialReason::UserInactive, true)]
    #[case("UNKNOWN99", DenialReason::InvalidToken, false)]
    #[tokio::test]
    async fn test_denials_are_logged(
        #[case] code: &str,
        #[case] reason: DenialReason,
        #[case] known: bool,
    ) {
        let (db, mut engine) = seeded().await;

        let decision = engine.decide(code).await;
        assert!(!decision.granted);
        assert_eq!(decision.denied_reason, Some(reason));
        assert_eq!(decision.token_id.is_some(), known);

        assert!(engine.drain(Duration::from_secs(2)).await.is_empty());
        let logs = SqliteAccessLogRepository::new(db.pool().clone());
        let entries = logs.find_by_code(code, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].denied_reason.as_deref(), Some(reason.as_str()));
        assert_eq!(entries[0].access_status, "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_closed() {
        let appends = Arc::new(AtomicUsize::new(0));
        let logs = CountingLogs {
            appends: Arc::clone(&appends),
            ..Default::default()
        };
        let mut engine = AccessDecisionEngine::new(FailingTokens, logs);

        let decision = engine.decide("AB12CD34").await;
        assert!(!decision.granted);
        assert_eq!(decision.denied_reason, Some(DenialReason::LookupFailed));
        assert_eq!(decision.token_id, None);

        engine.drain(Duration::from_secs(1)).await;
        assert_eq!(appends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_decide_does_not_wait_for_log() {
        let logs = CountingLogs {
            delay: Some(Duration::from_millis(300)),
            ..Default::default()
        };
        let (db, _) = seeded().await;
        let tokens = SqliteTokenRepository::new(db.pool().clone());
        let mut engine = AccessDecisionEngine::new(tokens, logs);

        let started = std::time::Instant::now();
        let decision = engine.decide("AB12CD34").await;
        assert!(decision.granted);
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(engine.pending_logs(), 1);

        assert!(engine.drain(Duration::from_secs(2)).await.is_empty());
        assert_eq!(engine.pending_logs(), 0);
    }

    #[tokio::test]
    async fn test_log_failure_reported_not_retried() {
        let appends = Arc::new(AtomicUsize::new(0));
        let logs = CountingLogs {
            appends: Arc::clone(&appends),
            fail: true,
            ..Default::default()
        };
        let mut engine = AccessDecisionEngine::new(FailingTokens, logs);

        engine.decide("AB12CD34").await;
        let failures = engine.drain(Duration::from_secs(1)).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code.as_deref(), Some("AB12CD34"));
        assert_eq!(appends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reap_collects_finished_writes() {
        let logs = CountingLogs {
            fail: true,
            ..Default::default()
        };
        let mut engine = AccessDecisionEngine::new(FailingTokens, logs);

        engine.decide("AB12CD34").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let failures = engine.reap();
        assert_eq!(failures.len(), 1);
        assert_eq!(engine.pending_logs(), 0);
    }

    #[tokio::test]
    async fn test_drain_abandons_after_grace() {
        let logs = CountingLogs {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        let mut engine = AccessDecisionEngine::new(FailingTokens, logs);

        engine.decide("AB12CD34").await;
        let started = std::time::Instant::now();
        let failures = engine.drain(Duration::from_millis(50)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, None);
        assert_eq!(engine.pending_logs(), 0);
    }

    #[tokio::test]
    async fn test_timestamps_are_monotonic() {
        let (_db, mut engine) = seeded().await;

        let first = engine.decide("AB12CD34").await;
        let second = engine.decide("UNKNOWN99").await;
        assert!(second.timestamp >= first.timestamp);

        engine.drain(Duration::from_secs(2)).await;
    }
}
