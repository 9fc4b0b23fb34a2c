// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session token registry.
//!
//! Sessions expire after a period of inactivity (sliding) and in any case
//! after a fixed maximum lifetime counted from creation. Expired records are
//! removed when they are next looked at, and by a sweep that piggybacks on
//! `create` at most once per cleanup interval.
use acadify_common::{Principal, Role};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::token_generator::generate_secure_token;
use crate::clock::{Clock, SystemClock};
use crate::metrics::{
    SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED, SESSION_REVOKED, SESSION_ROTATED,
};

/// Expiry policy for sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Idle time after which a session is dead
    pub inactivity_timeout: TimeDelta,
    /// Hard cap on a session's life, counted from creation
    pub max_lifetime: TimeDelta,
    /// Minimum spacing between opportunistic sweeps
    pub cleanup_interval: TimeDelta,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            inactivity_timeout: TimeDelta::minutes(30),
            max_lifetime: TimeDelta::hours(24),
            cleanup_interval: TimeDelta::hours(1),
        }
    }
}

/// A live session
#[derive(Debug, Clone)]
struct SessionRecord {
    subject_id: String,
    role: Role,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn new(subject_id: String, role: Role, now: DateTime<Utc>, policy: &SessionPolicy) -> Self {
        Self {
            subject_id,
            role,
            created_at: now,
            last_accessed_at: now,
            // a non-positive lifetime would break `expires_at > created_at`
            expires_at: now + policy.max_lifetime.max(TimeDelta::milliseconds(1)),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, policy: &SessionPolicy) -> bool {
        now - self.last_accessed_at > policy.inactivity_timeout || now > self.expires_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_accessed_at {
            self.last_accessed_at = now;
        }
    }

    fn principal(&self) -> Principal {
        Principal::new(self.subject_id.clone(), self.role)
    }
}

/// Read-only view of a session, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub subject_id: String,
    pub role: Role,
    pub age: TimeDelta,
    pub idle: TimeDelta,
    pub remaining_inactivity: TimeDelta,
    pub expires_at: DateTime<Utc>,
}

/// Concurrent registry of session tokens
#[derive(Debug)]
pub struct TokenStore {
    sessions: DashMap<String, SessionRecord>,
    policy: SessionPolicy,
    clock: Arc<dyn Clock>,
    /// Millisecond timestamp of the last sweep
    last_sweep: AtomicI64,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(SessionPolicy::default())
    }
}

impl TokenStore {
    /// Create a registry running on wall-clock time
    pub fn new(policy: SessionPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: SessionPolicy, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now().timestamp_millis();
        Self {
            sessions: DashMap::new(),
            policy,
            clock,
            last_sweep: AtomicI64::new(started),
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Start a session for `subject_id` and return its bearer token
    pub fn create(&self, subject_id: impl Into<String>, role: Role) -> String {
        let subject_id = subject_id.into();
        let now = self.clock.now();
        let mut record = SessionRecord::new(subject_id, role, now, &self.policy);

        let token = loop {
            let token = generate_secure_token();
            match self.sessions.entry(token.clone()) {
                Entry::Vacant(slot) => {
                    info!(subject_id = %record.subject_id, %role, "session created");
                    slot.insert(record);
                    break token;
                }
                // 256 random bits; only reachable with a broken RNG
                Entry::Occupied(_) => {
                    record = SessionRecord::new(record.subject_id, role, now, &self.policy);
                }
            }
        };

        counter!(SESSION_CREATED).increment(1);
        self.maybe_sweep(now);
        gauge!(SESSION_ACTIVE).set(self.sessions.len() as f64);
        token
    }

    /// Look up a token, sliding its inactivity window forward on success
    pub fn validate(&self, token: &str) -> Option<Principal> {
        let now = self.clock.now();
        let mut record = self.sessions.get_mut(token)?;
        if record.is_expired(now, &self.policy) {
            let subject_id = record.subject_id.clone();
            drop(record);
            // another caller may have refreshed or removed it meanwhile
            if self
                .sessions
                .remove_if(token, |_, r| r.is_expired(now, &self.policy))
                .is_some()
            {
                counter!(SESSION_EXPIRED).increment(1);
                debug!(%subject_id, "expired session removed on access");
            }
            return None;
        }
        record.touch(now);
        Some(record.principal())
    }

    /// Whether `token` names a live session. Does not extend it.
    pub fn is_valid(&self, token: &str) -> bool {
        let now = self.clock.now();
        self.sessions
            .get(token)
            .is_some_and(|record| !record.is_expired(now, &self.policy))
    }

    /// Remove a session. Unknown tokens are ignored.
    pub fn revoke(&self, token: &str) {
        if let Some((_, record)) = self.sessions.remove(token) {
            counter!(SESSION_REVOKED).increment(1);
            info!(subject_id = %record.subject_id, "session revoked");
        }
    }

    /// Replace a live session with a fresh token for the same subject.
    ///
    /// The old record is taken out of the map before the new one is minted,
    /// so concurrent rotations of one token produce at most one successor.
    pub fn rotate(&self, old_token: &str) -> Option<String> {
        let now = self.clock.now();
        let (_, record) = self.sessions.remove(old_token)?;
        if record.is_expired(now, &self.policy) {
            counter!(SESSION_EXPIRED).increment(1);
            return None;
        }

        let subject_id = record.subject_id;
        let token = self.create(subject_id.clone(), record.role);
        counter!(SESSION_ROTATED).increment(1);
        info!(%subject_id, "session rotated");
        Some(token)
    }

    /// Remove every expired session now. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.sessions.retain(|_, record| {
            let expired = record.is_expired(now, &self.policy);
            removed += usize::from(expired);
            !expired
        });
        let remaining = self.sessions.len();

        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            info!(removed, remaining, "expired sessions cleaned up");
        }
        gauge!(SESSION_ACTIVE).set(remaining as f64);
        removed
    }

    /// Number of sessions held, after any due sweep
    pub fn active_count(&self) -> usize {
        self.maybe_sweep(self.clock.now());
        self.sessions.len()
    }

    /// Inspect a session without extending it
    pub fn describe(&self, token: &str) -> Option<SessionInfo> {
        let now = self.clock.now();
        let record = self.sessions.get(token)?;
        let idle = now - record.last_accessed_at;
        Some(SessionInfo {
            subject_id: record.subject_id.clone(),
            role: record.role,
            age: now - record.created_at,
            idle,
            remaining_inactivity: (self.policy.inactivity_timeout - idle).max(TimeDelta::zero()),
            expires_at: record.expires_at,
        })
    }

    /// Run `cleanup` if the last sweep is older than the cleanup interval.
    ///
    /// A compare-and-swap elects a single sweeper among racing callers.
    fn maybe_sweep(&self, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        let last = self.last_sweep.load(Ordering::Acquire);
        if now_ms - last < self.policy.cleanup_interval.num_milliseconds() {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.cleanup();
        }
    }
}
