//! JIT Access: time-boxed firewall allow-list grants.
//!
//! Grants access to a protected resource by writing one allow-list rule
//! whose name carries its own expiry deadline, and revokes it once that
//! deadline passes. No database is involved: the allow-list is the only
//! record.

pub mod config;
pub mod error;
pub mod grant;
pub mod reclaim;
pub mod store;
pub mod time;

// Re-export primary types
pub use config::{AccessPolicy, ReclaimPolicy, ServiceConfig, TargetResource};
pub use error::{AccessError, Result, StoreError};
pub use grant::{
    AccessRequest, GrantIssuer, GrantResult, GrantStatus, ManagedName, Nonce, Subject, TokenDecode,
};
pub use reclaim::{GrantReclaimer, ReclaimScheduler, ScanReport};
pub use store::{AllowListStore, FileStore, FirewallRule, MemoryStore};
pub use time::{Clock, ManualClock, SystemClock, Ticks};
