//! Fixed-interval driver for the reclaim scan.
//!
//! The loop owns timing only. Scans run one after another on a single
//! task, so two scans from the same scheduler never overlap; a tick that
//! falls due while a scan is still running is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::scan::{GrantReclaimer, ScanReport};

/// Runs [`GrantReclaimer::run_scan`] on a fixed interval until shut down.
pub struct ReclaimScheduler {
    reclaimer: Arc<GrantReclaimer>,
    interval: Duration,
    reports: Option<watch::Sender<Option<ScanReport>>>,
}

impl ReclaimScheduler {
    pub fn new(reclaimer: Arc<GrantReclaimer>, interval: Duration) -> Self {
        Self {
            reclaimer,
            interval,
            reports: None,
        }
    }

    /// Publish each successful report to `sender`.
    pub fn with_reports(mut self, sender: watch::Sender<Option<ScanReport>>) -> Self {
        self.reports = Some(sender);
        self
    }

    /// Spawn the loop onto the current runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<usize> {
        tokio::spawn(self.run(shutdown))
    }

    /// Scan immediately, then once per interval, until `shutdown` turns
    /// true or its sender is dropped. Returns the number of scans run.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut scans = 0;

        log::info!("reclaimer started, interval {:?}", self.interval);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    scans += 1;
                    match self.reclaimer.run_scan().await {
                        Ok(report) => {
                            log::info!("reclaim scan finished: {report}");
                            if let Some(reports) = &self.reports {
                                reports.send_replace(Some(report));
                            }
                        }
                        Err(e) => log::error!("reclaim scan failed: {e}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        log::info!("reclaimer stopped after {scans} scan(s)");
        scans
    }
}
