//! Reclaim scan: delete every managed rule whose deadline has passed.
//!
//! A scan samples the clock once and judges every rule against that
//! instant. Foreign and malformed names are never deleted. A failed delete
//! is counted and the scan moves on; only a failed listing aborts it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DEFAULT_STORE_TIMEOUT;
use crate::error::{AccessError, Result, StoreError};
use crate::grant::token::{decode, TokenDecode};
use crate::store::{list_pages, with_timeout, AllowListStore};
use crate::time::{Clock, SystemClock, Ticks};

/// Counts from one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// The single instant every rule was judged against.
    pub started_at: DateTime<Utc>,
    /// Distinct rules evaluated.
    pub scanned: usize,
    /// Rules without the managed prefix.
    pub skipped_foreign: usize,
    /// Prefixed rules whose names could not be read.
    pub skipped_malformed: usize,
    pub expired_deleted: usize,
    pub expired_delete_failed: usize,
    pub active_remaining: usize,
}

impl ScanReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            scanned: 0,
            skipped_foreign: 0,
            skipped_malformed: 0,
            expired_deleted: 0,
            expired_delete_failed: 0,
            active_remaining: 0,
        }
    }

    /// Rules left alone because they are not ours to judge.
    pub fn skipped(&self) -> usize {
        self.skipped_foreign + self.skipped_malformed
    }

    /// True when every expired rule was removed.
    pub fn is_clean(&self) -> bool {
        self.expired_delete_failed == 0
    }
}

impl std::fmt::Display for ScanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scanned={} foreign={} malformed={} deleted={} delete_failed={} active={}",
            self.scanned,
            self.skipped_foreign,
            self.skipped_malformed,
            self.expired_deleted,
            self.expired_delete_failed,
            self.active_remaining
        )
    }
}

/// Removes expired grants from a store.
pub struct GrantReclaimer {
    store: Arc<dyn AllowListStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl GrantReclaimer {
    pub fn new(store: Arc<dyn AllowListStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Run one full pass over the store.
    pub async fn run_scan(&self) -> Result<ScanReport> {
        let started_at = self.clock.now();
        let now = Ticks::from_datetime(started_at).ok_or_else(|| {
            AccessError::MisconfiguredService(format!(
                "clock reads {started_at}, outside the tick range"
            ))
        })?;
        let mut report = ScanReport::new(started_at);

        let rules = list_pages(self.store.as_ref(), Some(self.store_timeout))
            .await
            .map_err(|e| AccessError::backend("listing rules", e))?;

        let mut seen = HashSet::with_capacity(rules.len());
        for rule in rules {
            if !seen.insert(rule.name.clone()) {
                continue;
            }
            report.scanned += 1;

            let name = match decode(&rule.name) {
                TokenDecode::Managed(name) => name,
                TokenDecode::Foreign => {
                    report.skipped_foreign += 1;
                    continue;
                }
                TokenDecode::Malformed(reason) => {
                    log::warn!("leaving malformed managed rule {}: {reason}", rule.name);
                    report.skipped_malformed += 1;
                    continue;
                }
            };

            if !name.is_expired_at(now) {
                report.active_remaining += 1;
                continue;
            }

            match with_timeout(self.store_timeout, self.store.delete(&rule.name)).await {
                Ok(()) | Err(StoreError::NotFound(_)) => {
                    log::info!(
                        "revoked {} ({}), expired {}",
                        rule.name,
                        rule.subject(),
                        name.expires_at()
                    );
                    report.expired_deleted += 1;
                }
                Err(e) => {
                    log::warn!("failed to revoke expired rule {}: {e}", rule.name);
                    report.expired_delete_failed += 1;
                }
            }
        }

        Ok(report)
    }
}
