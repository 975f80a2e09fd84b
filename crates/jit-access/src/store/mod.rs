//! Allow-list store: the only shared state in the system.
//!
//! Issuer and reclaimer both talk to the store through [`AllowListStore`].
//! Each call must be individually atomic from the caller's point of view;
//! no locking is layered on top.
//!
//! # Implementations
//!
//! - [`memory`]: in-process map with paging, call counters and fault
//!   injection. Used by tests and the bench.
//! - [`file_store`]: one JSON file per rule under a directory scoped to
//!   the target resource.

pub mod file_store;
pub mod memory;

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::grant::Subject;

pub use file_store::FileStore;
pub use memory::{MemoryStore, StoreCounters};

/// Result alias for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Longest rule name a store accepts.
pub const MAX_RULE_NAME_LEN: usize = 128;

/// Pages fetched before `list_all` gives up on a store that never ends.
const MAX_PAGES: usize = 100_000;

/// One allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub name: String,
    pub start_ip: IpAddr,
    pub end_ip: IpAddr,
}

impl FirewallRule {
    pub fn new(name: impl Into<String>, subject: Subject) -> Self {
        Self {
            name: name.into(),
            start_ip: subject.start,
            end_ip: subject.end,
        }
    }

    pub fn subject(&self) -> Subject {
        Subject {
            start: self.start_ip,
            end: self.end_ip,
        }
    }
}

/// A page of a listing. `continuation` is `None` on the last page.
#[derive(Debug, Clone, Default)]
pub struct RulePage {
    pub rules: Vec<FirewallRule>,
    pub continuation: Option<String>,
}

/// The allow-list backend.
#[async_trait]
pub trait AllowListStore: Send + Sync {
    /// Create a rule. Fails with [`StoreError::Conflict`] if the name exists.
    async fn create(&self, rule: &FirewallRule) -> StoreResult<()>;

    /// Fetch one page of rules, starting after `continuation`.
    async fn list_page(&self, continuation: Option<String>) -> StoreResult<RulePage>;

    /// Delete a rule by name. Deleting a missing name succeeds.
    async fn delete(&self, name: &str) -> StoreResult<()>;

    /// Enumerate every rule, following continuations to the end.
    async fn list_all(&self) -> StoreResult<Vec<FirewallRule>> {
        list_pages(self, None).await
    }
}

/// Enumerate every rule in `store`, bounding each page fetch by
/// `page_timeout` when one is given.
///
/// The bound applies per call, so a long listing made of quick pages
/// never times out as a whole.
pub async fn list_pages<S: AllowListStore + ?Sized>(
    store: &S,
    page_timeout: Option<Duration>,
) -> StoreResult<Vec<FirewallRule>> {
    let mut rules = Vec::new();
    let mut continuation: Option<String> = None;
    for _ in 0..MAX_PAGES {
        let call = store.list_page(continuation.clone());
        let page = match page_timeout {
            Some(limit) => with_timeout(limit, call).await?,
            None => call.await?,
        };
        rules.extend(page.rules);
        match page.continuation {
            Some(next) if Some(&next) == continuation.as_ref() => {
                return Err(StoreError::Backend(format!(
                    "listing repeated continuation {next:?}"
                )));
            }
            Some(next) => continuation = Some(next),
            None => return Ok(rules),
        }
    }
    Err(StoreError::Backend(format!(
        "listing did not finish within {MAX_PAGES} pages"
    )))
}

/// Run a store call under a deadline.
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Check a rule name against the characters allow-list backends accept.
pub fn validate_rule_name(name: &str) -> StoreResult<()> {
    let ok = !name.is_empty()
        && name.len() <= MAX_RULE_NAME_LEN
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}
