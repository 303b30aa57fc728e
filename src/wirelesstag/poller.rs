//! Poller: periodic tag list synchronization for all tag managers
//!
//! Runs in a background tokio task. The first cycle starts immediately,
//! then one cycle per interval. Within a cycle all managers are fetched
//! concurrently, then their devices are reconciled in configuration order.
//! A tick that finds the previous cycle still running is skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};

use crate::accessory::{AccessoryHost, ReconcileOutcome, Reconciler};
use crate::models::TagManager;
use crate::wirelesstag::client::TagSource;

/// Summary of one poll cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub managers_polled: usize,
    pub failed_managers: Vec<String>,
    pub devices_reconciled: usize,
    pub accessories_registered: usize,
    pub device_errors: usize,
}

pub struct Poller<H: AccessoryHost> {
    source: Arc<dyn TagSource>,
    reconciler: Arc<Reconciler<H>>,
    managers: Vec<TagManager>,
    interval: Duration,
    cycle_lock: Arc<Mutex<()>>,
    last_cycle: RwLock<Option<CycleReport>>,
}

impl<H: AccessoryHost> Poller<H> {
    pub fn new(
        source: Arc<dyn TagSource>,
        reconciler: Arc<Reconciler<H>>,
        managers: Vec<TagManager>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            reconciler,
            managers,
            interval,
            cycle_lock: Arc::new(Mutex::new(())),
            last_cycle: RwLock::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn managers(&self) -> &[TagManager] {
        &self.managers
    }

    pub async fn last_cycle(&self) -> Option<CycleReport> {
        self.last_cycle.read().await.clone()
    }

    /// Start the poll loop (runs forever)
    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            "[Poller] Setting up periodic updates every {} ms for {} tag managers",
            self.interval.as_millis(),
            self.managers.len()
        );

        let mut interval_timer = interval(self.interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval_timer.tick().await;

            let guard = match self.cycle_lock.clone().try_lock_owned() {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::warn!("[Poller] Previous cycle still running, skipping this tick");
                    continue;
                }
            };

            let poller = self.clone();
            tokio::spawn(async move {
                let _guard = guard;
                poller.run_cycle().await;
            });
        }
    }

    /// Fetch every manager's tag list and reconcile the results
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        tracing::debug!("[Poller] Starting cycle for {} managers", self.managers.len());

        let fetches = self.managers.iter().map(|manager| async move {
            let result = self.source.fetch_tag_list(&manager.mac).await;
            (manager, result)
        });
        let results = join_all(fetches).await;

        let mut failed_managers = Vec::new();
        let mut devices_reconciled = 0usize;
        let mut accessories_registered = 0usize;
        let mut device_errors = 0usize;

        for (manager, result) in results {
            let devices = match result {
                Ok(devices) => devices,
                Err(e) => {
                    tracing::warn!(
                        "[Poller] Error fetching devices for manager \"{}\" (MAC: {}): {}",
                        manager.name,
                        manager.mac,
                        e
                    );
                    failed_managers.push(manager.name.clone());
                    continue;
                }
            };

            tracing::info!(
                "[Poller] Fetched {} tags for manager \"{}\" ({})",
                devices.len(),
                manager.name,
                manager.mac
            );

            for device in &devices {
                match self.reconciler.reconcile(device, &manager.name).await {
                    Ok(outcome) => {
                        devices_reconciled += 1;
                        if let ReconcileOutcome::Registered(_) = outcome {
                            accessories_registered += 1;
                        }
                    }
                    Err(e) => {
                        device_errors += 1;
                        tracing::warn!(
                            "[Poller] Failed to reconcile {} ({}) from manager \"{}\": {}",
                            device.name,
                            device.uuid,
                            manager.name,
                            e
                        );
                    }
                }
            }
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            managers_polled: self.managers.len(),
            failed_managers,
            devices_reconciled,
            accessories_registered,
            device_errors,
        };

        tracing::debug!(
            "[Poller] Cycle done: {} devices, {} new, {} failed managers",
            report.devices_reconciled,
            report.accessories_registered,
            report.failed_managers.len()
        );

        *self.last_cycle.write().await = Some(report.clone());
        report
    }
}
