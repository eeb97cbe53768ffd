/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Per-resource locking and asynchronous transition scheduling.
//!
//! The manager keeps one entry per resource key: a mutex that serializes
//! every service operation touching the resource, and the at-most-one
//! pending transition scheduled against it. Scheduling a new transition
//! closes the previous cancel signal; a scheduled task wakes on the
//! earliest of its delay, its cancel signal, or the global shutdown, and
//! only mutates state after re-validating the transition under the
//! resource lock. Removal-after-delay runs on a separate bookkeeping key
//! so it never interferes with an in-flight state transition on the same
//! resource.

use crate::error::ScheduleError;
use crate::transitions::{validate_transition, ResourceKind};
use common::Store;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{oneshot, watch, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, warn};

/// An in-flight asynchronous state change.
struct PendingTransition {
    target: String,
    /// Dropped to cancel; the scheduled task selects on the paired receiver.
    _cancel: oneshot::Sender<()>,
    scheduled_at: Instant,
    generation: u64,
}

#[derive(Default)]
struct PendingSlot {
    current: Option<PendingTransition>,
    /// Bumped on every install/cancel/clear so a stale task that already
    /// raced past its cancel signal can detect it was superseded.
    generation: u64,
}

struct ResourceEntry {
    mutex: Arc<tokio::sync::Mutex<()>>,
    pending: Mutex<PendingSlot>,
}

impl ResourceEntry {
    fn new() -> Arc<Self> {
        Arc::new(ResourceEntry {
            mutex: Arc::new(tokio::sync::Mutex::new(())),
            pending: Mutex::new(PendingSlot::default()),
        })
    }
}

/// Lock and pending-transition bookkeeping for every resource key.
pub struct StateMachineManager {
    store: Arc<Store>,
    entries: RwLock<HashMap<String, Arc<ResourceEntry>>>,
    shutdown: watch::Sender<bool>,
}

impl StateMachineManager {
    pub fn new(store: Arc<Store>) -> Self {
        let (shutdown, _) = watch::channel(false);
        StateMachineManager {
            store,
            entries: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    /// Cancel every in-flight scheduled transition and removal.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn entry(&self, key: &str) -> Arc<ResourceEntry> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = entries.get(key) {
                return Arc::clone(entry);
            }
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            entries
                .entry(key.to_string())
                .or_insert_with(ResourceEntry::new),
        )
    }

    /// Acquire the per-resource critical section for `key`.
    ///
    /// Every service operation that mutates the resource takes this lock
    /// first; scheduled transitions re-acquire it before applying.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = self.entry(key);
        Arc::clone(&entry.mutex).lock_owned().await
    }

    /// Install a pending transition toward `target`, closing any prior
    /// cancel signal first. Returns the cancel receiver and the pending
    /// generation the scheduled task must present to complete.
    pub fn set_pending(&self, key: &str, target: &str) -> (oneshot::Receiver<()>, u64) {
        let entry = self.entry(key);
        let mut slot = entry.pending.lock().unwrap_or_else(|e| e.into_inner());
        slot.generation += 1;
        let (tx, rx) = oneshot::channel();
        // Replacing the slot drops the previous sender, which resolves the
        // previous task's cancel receiver.
        slot.current = Some(PendingTransition {
            target: target.to_string(),
            _cancel: tx,
            scheduled_at: Instant::now(),
            generation: slot.generation,
        });
        (rx, slot.generation)
    }

    /// Cancel the pending transition on `key`, if any. Never mutates
    /// resource state.
    pub fn cancel_pending(&self, key: &str) {
        let entry = self.entry(key);
        let mut slot = entry.pending.lock().unwrap_or_else(|e| e.into_inner());
        if slot.current.take().is_some() {
            slot.generation += 1;
            debug!(key, "cancelled pending transition");
        }
    }

    /// Drop the pending slot after a transition applied. Equivalent to a
    /// cancel for bookkeeping purposes; the scheduled task has already run.
    pub fn clear_pending(&self, key: &str) {
        self.cancel_pending(key);
    }

    /// Clear the pending slot iff it still belongs to `generation`.
    ///
    /// A task that slept out its delay may have been superseded while it
    /// waited for the resource lock; in that case this returns `false` and
    /// the task must not touch the resource.
    fn complete_pending(&self, key: &str, generation: u64) -> bool {
        let entry = self.entry(key);
        let mut slot = entry.pending.lock().unwrap_or_else(|e| e.into_inner());
        match &slot.current {
            Some(p) if p.generation == generation => {
                slot.current = None;
                slot.generation += 1;
                true
            }
            _ => false,
        }
    }

    /// Target state of the pending transition on `key`, if one is in flight.
    pub fn pending_target(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        let slot = entry.pending.lock().unwrap_or_else(|e| e.into_inner());
        slot.current.as_ref().map(|p| p.target.clone())
    }

    /// How long ago the pending transition on `key` was scheduled.
    pub fn pending_age(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        let slot = entry.pending.lock().unwrap_or_else(|e| e.into_inner());
        slot.current.as_ref().map(|p| p.scheduled_at.elapsed())
    }

    /// Drop all bookkeeping for `key`, cancelling any pending transition.
    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    /// Schedule a table-validated state change for `key` after `delay`.
    ///
    /// The spawned task waits for the earliest of the delay elapsing, the
    /// cancel signal closing, or global shutdown. On elapse it re-acquires
    /// the resource lock, confirms it was not superseded, re-validates the
    /// transition against the current record, and writes the new state.
    /// Failures are logged and swallowed; the client observes a resource
    /// that simply did not transition.
    pub fn schedule_transition(
        self: &Arc<Self>,
        key: &str,
        kind: ResourceKind,
        target: &str,
        delay: Duration,
    ) {
        let (cancelled, generation) = self.set_pending(key, target);
        let mut shutdown = self.shutdown.subscribe();
        let mgr = Arc::clone(self);
        let key = key.to_string();
        let target = target.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled => return,
                _ = shutdown.changed() => return,
            }
            let _guard = mgr.lock(&key).await;
            if !mgr.complete_pending(&key, generation) {
                return;
            }
            if let Err(e) = mgr.apply_transition(&key, kind, &target) {
                warn!(key, target, error = %e, "scheduled transition not applied");
            }
        });
    }

    /// Schedule `cleanup` to run after `delay`, tracked under the separate
    /// `removal:<key>` bookkeeping key so it neither cancels nor is
    /// cancelled by state transitions on the resource itself.
    pub fn schedule_removal<F>(self: &Arc<Self>, key: &str, delay: Duration, cleanup: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let bookkeeping = format!("removal:{}", key);
        let (cancelled, generation) = self.set_pending(&bookkeeping, "removed");
        let mut shutdown = self.shutdown.subscribe();
        let mgr = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled => return,
                _ = shutdown.changed() => return,
            }
            let guard = mgr.lock(&key).await;
            if !mgr.complete_pending(&bookkeeping, generation) {
                return;
            }
            cleanup.await;
            drop(guard);
            mgr.remove(&key);
            mgr.remove(&bookkeeping);
        });
    }

    fn apply_transition(
        &self,
        key: &str,
        kind: ResourceKind,
        target: &str,
    ) -> Result<(), ScheduleError> {
        let record = self.store.get_raw(key)?;
        let from = record
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let id = key.rsplit(':').next().unwrap_or(key);
        validate_transition(kind, id, &from, target)?;
        self.store.update(key, |rec: &mut Value| {
            rec["state"] = json!(target);
        })?;
        debug!(key, from, to = target, "applied scheduled transition");
        Ok(())
    }
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Arc<StateMachineManager> {
        Arc::new(StateMachineManager::new(Arc::new(Store::new())))
    }

    fn seed(mgr: &StateMachineManager, key: &str, state: &str) {
        mgr.store.set(key, &json!({ "state": state })).unwrap();
    }

    fn state_of(mgr: &StateMachineManager, key: &str) -> String {
        let rec: Value = mgr.store.get_raw(key).unwrap();
        rec["state"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_scheduled_transition_applies_after_delay() {
        let mgr = manager();
        seed(&mgr, "ec2:vpcs:vpc-1", "pending");

        mgr.schedule_transition(
            "ec2:vpcs:vpc-1",
            ResourceKind::Vpc,
            "available",
            Duration::from_millis(20),
        );
        assert_eq!(mgr.pending_target("ec2:vpcs:vpc-1").as_deref(), Some("available"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(state_of(&mgr, "ec2:vpcs:vpc-1"), "available");
        assert!(mgr.pending_target("ec2:vpcs:vpc-1").is_none());
    }

    #[tokio::test]
    async fn test_cancel_leaves_state_untouched() {
        let mgr = manager();
        seed(&mgr, "ec2:vpcs:vpc-1", "pending");

        mgr.schedule_transition(
            "ec2:vpcs:vpc-1",
            ResourceKind::Vpc,
            "available",
            Duration::from_millis(30),
        );
        mgr.cancel_pending("ec2:vpcs:vpc-1");

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(state_of(&mgr, "ec2:vpcs:vpc-1"), "pending");
    }

    #[tokio::test]
    async fn test_superseding_schedule_closes_prior_signal() {
        let mgr = manager();
        seed(&mgr, "ec2:instances:i-1", "pending");

        mgr.schedule_transition(
            "ec2:instances:i-1",
            ResourceKind::Instance,
            "running",
            Duration::from_millis(500),
        );
        // Supersede before the first delay elapses; only one pending slot.
        mgr.schedule_transition(
            "ec2:instances:i-1",
            ResourceKind::Instance,
            "shutting-down",
            Duration::from_millis(20),
        );
        assert_eq!(
            mgr.pending_target("ec2:instances:i-1").as_deref(),
            Some("shutting-down")
        );

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(state_of(&mgr, "ec2:instances:i-1"), "shutting-down");
    }

    #[tokio::test]
    async fn test_invalid_transition_is_swallowed() {
        let mgr = manager();
        // Terminal state: the scheduled move must not apply.
        seed(&mgr, "ec2:instances:i-1", "terminated");

        mgr.schedule_transition(
            "ec2:instances:i-1",
            ResourceKind::Instance,
            "running",
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(state_of(&mgr, "ec2:instances:i-1"), "terminated");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_scheduled_work() {
        let mgr = manager();
        seed(&mgr, "ec2:vpcs:vpc-1", "pending");

        mgr.schedule_transition(
            "ec2:vpcs:vpc-1",
            ResourceKind::Vpc,
            "available",
            Duration::from_millis(30),
        );
        mgr.shutdown();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(state_of(&mgr, "ec2:vpcs:vpc-1"), "pending");
    }

    #[tokio::test]
    async fn test_removal_runs_on_separate_bookkeeping_key() {
        let mgr = manager();
        seed(&mgr, "ec2:instances:i-1", "shutting-down");

        // Removal scheduled first; the state transition scheduled after it
        // must not cancel it, and vice versa.
        let store = Arc::clone(&mgr.store);
        mgr.schedule_removal("ec2:instances:i-1", Duration::from_millis(60), async move {
            store.delete("ec2:instances:i-1");
        });
        mgr.schedule_transition(
            "ec2:instances:i-1",
            ResourceKind::Instance,
            "terminated",
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(state_of(&mgr, "ec2:instances:i-1"), "terminated");

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!mgr.store.exists("ec2:instances:i-1"));
    }

    #[tokio::test]
    async fn test_lock_serializes_operations() {
        let mgr = manager();
        let guard = mgr.lock("ec2:vpcs:vpc-1").await;
        let mgr2 = Arc::clone(&mgr);
        let contender = tokio::spawn(async move {
            let _g = mgr2.lock("ec2:vpcs:vpc-1").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }
}
