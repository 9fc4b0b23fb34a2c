// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_ACTIVE: &str = "session.active";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_REVOKED: &str = "session.revoked";
pub const SESSION_ROTATED: &str = "session.rotated";
pub const POOL_OPENED: &str = "pool.opened";
pub const POOL_DISCARDED: &str = "pool.discarded";
pub const POOL_IDLE: &str = "pool.idle";
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
