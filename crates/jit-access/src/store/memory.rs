//! In-memory allow-list store.
//!
//! Rules live in a name-ordered map, so continuations are simply the last
//! name returned and paging stays stable while rules are deleted. Counters
//! and fault switches let tests observe exactly which calls were made.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

use super::{validate_rule_name, AllowListStore, FirewallRule, RulePage, StoreResult};

/// Default number of rules per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Call counters.
#[derive(Debug, Default)]
pub struct StoreCounters {
    creates: AtomicUsize,
    list_pages: AtomicUsize,
    deletes: AtomicUsize,
}

impl StoreCounters {
    /// Create attempts, including rejected ones.
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn list_pages(&self) -> usize {
        self.list_pages.load(Ordering::SeqCst)
    }

    /// Delete attempts, including rejected ones.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Every mutating call (creates and deletes).
    pub fn mutations(&self) -> usize {
        self.creates() + self.deletes()
    }
}

#[derive(Debug, Default)]
struct Faults {
    /// Number of upcoming creates forced to report a conflict.
    forced_conflicts: usize,
    fail_creates: bool,
    fail_listing: bool,
    failing_deletes: HashSet<String>,
    /// Names whose delete reports `NotFound` after removing the rule,
    /// as a backend that raced another deleter would.
    racing_deletes: HashSet<String>,
    latency: Option<Duration>,
}

/// A store held entirely in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    rules: RwLock<BTreeMap<String, FirewallRule>>,
    page_size: usize,
    counters: StoreCounters,
    faults: Mutex<Faults>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store that returns at most `page_size` rules per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            rules: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            counters: StoreCounters::default(),
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Seed a rule directly, bypassing counters and faults.
    pub fn insert(&self, rule: FirewallRule) {
        self.write().insert(rule.name.clone(), rule);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rule names in order.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn counters(&self) -> &StoreCounters {
        &self.counters
    }

    // ── Fault injection ───────────────────────────────────────────────────

    /// Make the next `n` creates report a name conflict.
    pub fn force_conflicts(&self, n: usize) {
        self.faults().forced_conflicts = n;
    }

    pub fn fail_creates(&self, fail: bool) {
        self.faults().fail_creates = fail;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.faults().fail_listing = fail;
    }

    pub fn fail_delete_of(&self, name: impl Into<String>) {
        self.faults().failing_deletes.insert(name.into());
    }

    pub fn race_delete_of(&self, name: impl Into<String>) {
        self.faults().racing_deletes.insert(name.into());
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults().latency = latency;
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, FirewallRule>> {
        self.rules.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, FirewallRule>> {
        self.rules.write().unwrap_or_else(|e| e.into_inner())
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        let latency = self.faults().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl AllowListStore for MemoryStore {
    async fn create(&self, rule: &FirewallRule) -> StoreResult<()> {
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        validate_rule_name(&rule.name)?;

        {
            let mut faults = self.faults();
            if faults.fail_creates {
                return Err(StoreError::Backend("injected create failure".into()));
            }
            if faults.forced_conflicts > 0 {
                faults.forced_conflicts -= 1;
                return Err(StoreError::Conflict(rule.name.clone()));
            }
        }

        let mut rules = self.write();
        if rules.contains_key(&rule.name) {
            return Err(StoreError::Conflict(rule.name.clone()));
        }
        rules.insert(rule.name.clone(), rule.clone());
        Ok(())
    }

    async fn list_page(&self, continuation: Option<String>) -> StoreResult<RulePage> {
        self.counters.list_pages.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.faults().fail_listing {
            return Err(StoreError::Backend("injected listing failure".into()));
        }

        let rules = self.read();
        let lower = match &continuation {
            Some(after) => Bound::Excluded(after.clone()),
            None => Bound::Unbounded,
        };
        let page: Vec<FirewallRule> = rules
            .range((lower, Bound::Unbounded))
            .take(self.page_size)
            .map(|(_, rule)| rule.clone())
            .collect();

        let continuation = if page.len() == self.page_size {
            page.last().map(|rule| rule.name.clone())
        } else {
            None
        };
        Ok(RulePage {
            rules: page,
            continuation,
        })
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let racing = {
            let faults = self.faults();
            if faults.failing_deletes.contains(name) {
                return Err(StoreError::Backend(format!("injected delete failure for {name}")));
            }
            faults.racing_deletes.contains(name)
        };

        self.write().remove(name);
        if racing {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }
}
