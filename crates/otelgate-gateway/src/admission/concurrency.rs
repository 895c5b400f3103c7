//! In-flight request counters.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use otelgate_core::error::{OtelGateError, Result};

/// `principal -> active` with per-key locking through the map's entry API.
///
/// An entry exists only while its count is positive. `tracked` mirrors the
/// number of entries so the cap can be enforced while a shard lock is held.
pub(crate) struct ConcurrencyTable {
    slots: DashMap<String, u32>,
    tracked: AtomicUsize,
    max_concurrent: u32,
    max_entries: usize,
}

impl ConcurrencyTable {
    pub(crate) fn new(max_concurrent: u32, max_entries: usize) -> Self {
        Self {
            slots: DashMap::new(),
            tracked: AtomicUsize::new(0),
            max_concurrent,
            max_entries,
        }
    }

    /// Take one slot. Rejections leave the table unchanged.
    pub(crate) fn acquire(&self, principal: &str) -> Result<u32> {
        match self.slots.entry(principal.to_owned()) {
            Entry::Occupied(mut o) => {
                let active = o.get_mut();
                if *active >= self.max_concurrent {
                    return Err(OtelGateError::ConcurrencyExceeded);
                }
                *active += 1;
                Ok(*active)
            }
            Entry::Vacant(v) => {
                if self.tracked.fetch_add(1, Ordering::AcqRel) >= self.max_entries {
                    self.tracked.fetch_sub(1, Ordering::AcqRel);
                    tracing::warn!(max_entries = self.max_entries, "concurrency table full; refusing new principal");
                    return Err(OtelGateError::ConcurrencyExceeded);
                }
                v.insert(1);
                Ok(1)
            }
        }
    }

    /// Give back one slot; returns what remains. Unknown principals are a no-op.
    pub(crate) fn release(&self, principal: &str) -> u32 {
        match self.slots.entry(principal.to_owned()) {
            Entry::Occupied(mut o) => {
                if *o.get() <= 1 {
                    o.remove();
                    self.tracked.fetch_sub(1, Ordering::AcqRel);
                    return 0;
                }
                let active = o.get_mut();
                *active -= 1;
                *active
            }
            Entry::Vacant(_) => 0,
        }
    }

    pub(crate) fn active(&self, principal: &str) -> u32 {
        self.slots.get(principal).map(|r| *r.value()).unwrap_or(0)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
