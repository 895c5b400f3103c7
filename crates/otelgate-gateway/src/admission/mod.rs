//! Per-principal admission control.
//!
//! Two independent limits, both keyed by an opaque principal string:
//! - a fixed-window request counter (`check_limit`)
//! - an in-flight cap (`acquire_slot` / `release_slot`, or the scoped `acquire`)
//!
//! Construct one `AdmissionController` at startup and clone it freely; clones
//! share state. `spawn_sweeper` starts the periodic cleanup of elapsed windows.

mod concurrency;
mod rate;

use std::sync::{Arc, Weak};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use otelgate_core::error::Result;

use crate::config::AdmissionSection;

use self::concurrency::ConcurrencyTable;
use self::rate::RateTable;

#[derive(Clone)]
pub struct AdmissionController {
    state: Arc<AdmissionState>,
}

struct AdmissionState {
    limits: AdmissionSection,
    rates: RateTable,
    slots: ConcurrencyTable,
}

impl AdmissionController {
    pub fn new(limits: AdmissionSection) -> Self {
        Self {
            state: Arc::new(AdmissionState {
                limits,
                rates: RateTable::new(limits.window(), limits.max_requests, limits.max_entries),
                slots: ConcurrencyTable::new(limits.max_concurrent, limits.max_entries),
            }),
        }
    }

    pub fn limits(&self) -> &AdmissionSection {
        &self.state.limits
    }

    /// Count one request against `principal`'s current window.
    pub fn check_limit(&self, principal: &str) -> Result<()> {
        match self.state.rates.check(principal, Instant::now()) {
            Ok(count) => {
                tracing::debug!(principal, count, "rate check passed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(principal, max_requests = self.state.limits.max_requests, "rate limit exceeded");
                Err(e)
            }
        }
    }

    /// Take one in-flight slot. Pair with `release_slot`, or use `acquire`.
    pub fn acquire_slot(&self, principal: &str) -> Result<()> {
        match self.state.slots.acquire(principal) {
            Ok(active) => {
                tracing::debug!(principal, active, "slot acquired");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(principal, max_concurrent = self.state.limits.max_concurrent, "concurrency limit exceeded");
                Err(e)
            }
        }
    }

    /// Return one slot. Over-release and unknown principals are no-ops.
    pub fn release_slot(&self, principal: &str) {
        let remaining = self.state.slots.release(principal);
        tracing::debug!(principal, remaining, "slot released");
    }

    /// Take one slot, released when the guard drops.
    pub fn acquire(&self, principal: &str) -> Result<SlotGuard> {
        self.acquire_slot(principal)?;
        Ok(SlotGuard {
            controller: self.clone(),
            principal: principal.to_owned(),
        })
    }

    pub fn rate_entries(&self) -> usize {
        self.state.rates.len()
    }

    pub fn concurrency_entries(&self) -> usize {
        self.state.slots.len()
    }

    pub fn active_slots(&self, principal: &str) -> u32 {
        self.state.slots.active(principal)
    }

    /// Requests counted in `principal`'s current window, if tracked.
    pub fn window_count(&self, principal: &str) -> Option<u32> {
        self.state.rates.count(principal)
    }

    /// Delete every rate entry whose window has fully elapsed.
    pub fn sweep_expired(&self) -> usize {
        self.state.sweep(Instant::now())
    }

    /// Start the periodic sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference: once every controller clone is
    /// dropped it exits on its next tick.
    pub fn spawn_sweeper(&self) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let weak: Weak<AdmissionState> = Arc::downgrade(&self.state);
        let interval = self.state.limits.sweep_interval();
        let first_tick = Instant::now() + interval;

        let join_handle = tokio::spawn(async move {
            tracing::info!(interval_ms = interval.as_millis() as u64, "admission sweep started");

            let mut ticker = tokio::time::interval_at(first_tick, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(state) = weak.upgrade() else {
                            break;
                        };
                        state.sweep(Instant::now());
                    }
                    _ = &mut shutdown_rx => break,
                }
            }

            tracing::info!("admission sweep stopped");
        });

        SweepHandle {
            shutdown_tx: Some(shutdown_tx),
            join_handle,
        }
    }
}

impl AdmissionState {
    fn sweep(&self, now: Instant) -> usize {
        let removed = self.rates.sweep(now);
        if removed > 0 {
            tracing::debug!(removed, remaining = self.rates.len(), "swept expired rate windows");
        }
        removed
    }
}

/// One held in-flight slot.
#[must_use = "dropping the guard releases the slot immediately"]
pub struct SlotGuard {
    controller: AdmissionController,
    principal: String,
}

impl SlotGuard {
    pub fn principal(&self) -> &str {
        &self.principal
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.controller.release_slot(&self.principal);
    }
}

impl std::fmt::Debug for SlotGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotGuard")
            .field("principal", &self.principal)
            .finish()
    }
}

/// Handle to the background sweep task.
///
/// Dropping the handle also stops the task.
pub struct SweepHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the sweep task to stop and wait for it.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.join_handle.await;
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}
