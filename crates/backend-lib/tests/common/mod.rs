//! In-memory stand-ins for the database, shared by the integration tests.
#![allow(dead_code)]

use acadify_backend::auth::{AuthGateway, CredentialHasher, SessionPolicy, TokenStore};
use acadify_backend::clock::ManualClock;
use acadify_backend::directory::{Activity, DirectoryError, NewUser, UserDirectory, UserRecord};
use acadify_backend::pool::{ConnectionPool, ManageConnection, PoolError};
use acadify_backend::Role;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Cheapest cost the hasher allows; keeps the suite fast
pub const TEST_ITERATIONS: u32 = 1_000;

#[derive(Debug)]
pub struct MemoryConn {
    pub id: usize,
    pub alive: bool,
}

#[derive(Debug, Default)]
pub struct MemoryConnector {
    pub opened: AtomicUsize,
    pub refuse: AtomicBool,
}

#[async_trait]
impl ManageConnection for MemoryConnector {
    type Connection = MemoryConn;

    async fn connect(&self) -> Result<MemoryConn, PoolError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(PoolError::Connect("connection refused".to_string()));
        }
        let id = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConn { id, alive: true })
    }

    async fn is_alive(&self, conn: &mut MemoryConn) -> bool {
        conn.alive
    }

    async fn reset(&self, _conn: &mut MemoryConn) -> Result<(), PoolError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: Mutex<HashMap<String, (i64, Role, String, String)>>,
    next_id: AtomicUsize,
    pub activity: Mutex<Vec<(i64, Activity)>>,
    pub fail_activity_log: AtomicBool,
}

impl MemoryDirectory {
    /// Insert an account directly, bypassing registration
    pub fn seed(&self, email: &str, role: Role, password_hash: String) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        self.users
            .lock()
            .insert(email.to_string(), (id, role, password_hash, "Seeded".to_string()));
        id
    }

    pub fn name_of(&self, email: &str) -> Option<String> {
        self.users.lock().get(email).map(|(_, _, _, name)| name.clone())
    }

    pub fn hash_of(&self, email: &str) -> Option<String> {
        self.users.lock().get(email).map(|(_, _, hash, _)| hash.clone())
    }
}

#[async_trait]
impl UserDirectory<MemoryConn> for MemoryDirectory {
    async fn find_by_email(
        &self,
        _conn: &mut MemoryConn,
        email: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.lock().get(email).map(|(id, role, hash, _)| UserRecord {
            user_id: *id,
            role: *role,
            password_hash: hash.clone(),
        }))
    }

    async fn create_account(
        &self,
        _conn: &mut MemoryConn,
        user: &NewUser,
    ) -> Result<i64, DirectoryError> {
        let mut users = self.users.lock();
        if users.contains_key(&user.email) {
            return Err(DirectoryError::Duplicate);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        users.insert(
            user.email.clone(),
            (id, user.role, user.password_hash.clone(), user.name.clone()),
        );
        self.activity.lock().push((id, Activity::Registered));
        Ok(id)
    }

    async fn log_activity(
        &self,
        _conn: &mut MemoryConn,
        user_id: i64,
        activity: Activity,
    ) -> Result<(), DirectoryError> {
        if self.fail_activity_log.load(Ordering::SeqCst) {
            return Err(DirectoryError::Backend(
                "procedure log_activity does not exist".to_string(),
            ));
        }
        self.activity.lock().push((user_id, activity));
        Ok(())
    }
}

pub struct Harness {
    pub gateway: AuthGateway<MemoryConnector, MemoryDirectory>,
    pub clock: Arc<ManualClock>,
    pub hasher: CredentialHasher,
}

impl Harness {
    pub fn pool(&self) -> &ConnectionPool<MemoryConnector> {
        self.gateway.pool()
    }

    pub fn directory(&self) -> &MemoryDirectory {
        self.gateway.directory()
    }
}

pub async fn harness(capacity: usize) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let sessions = Arc::new(TokenStore::with_clock(SessionPolicy::default(), clock.clone()));
    let pool = ConnectionPool::initialize(MemoryConnector::default(), capacity)
        .await
        .expect("in-memory pool always initializes");
    let hasher = CredentialHasher::new(TEST_ITERATIONS);
    let gateway = AuthGateway::new(pool, sessions, hasher, MemoryDirectory::default());
    Harness {
        gateway,
        clock,
        hasher,
    }
}
