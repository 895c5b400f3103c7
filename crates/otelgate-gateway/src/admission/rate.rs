//! Fixed-window request counters.
//!
//! One mutex guards the whole table: insertion order is global state, so the
//! per-key update and the size maintenance that follows it must be serialized.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use otelgate_core::error::{OtelGateError, Result};

#[derive(Debug)]
struct RateEntry {
    count: u32,
    window_start: Instant,
    /// Insertion position; survives window resets.
    seq: u64,
}

#[derive(Debug, Default)]
struct Windows {
    entries: HashMap<String, RateEntry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Windows {
    /// Count one request and return the count inside the current window.
    fn hit(&mut self, principal: &str, now: Instant, window: Duration) -> u32 {
        if let Some(entry) = self.entries.get_mut(principal) {
            if now.duration_since(entry.window_start) >= window {
                entry.count = 0;
                entry.window_start = now;
            }
            entry.count = entry.count.saturating_add(1);
            return entry.count;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, principal.to_owned());
        self.entries.insert(
            principal.to_owned(),
            RateEntry {
                count: 1,
                window_start: now,
                seq,
            },
        );
        1
    }

    /// Drop the oldest-inserted entries until at most `max` remain.
    fn evict_oldest(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > max {
            let Some((_, principal)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&principal);
            evicted += 1;
        }
        evicted
    }

    fn sweep(&mut self, now: Instant, window: Duration) -> usize {
        let mut expired = Vec::new();
        self.entries.retain(|_, e| {
            let live = now.duration_since(e.window_start) < window;
            if !live {
                expired.push(e.seq);
            }
            live
        });
        for seq in &expired {
            self.order.remove(seq);
        }
        expired.len()
    }
}

pub(crate) struct RateTable {
    windows: Mutex<Windows>,
    window: Duration,
    max_requests: u32,
    max_entries: usize,
}

impl RateTable {
    pub(crate) fn new(window: Duration, max_requests: u32, max_entries: usize) -> Self {
        Self {
            windows: Mutex::new(Windows::default()),
            window,
            max_requests,
            max_entries,
        }
    }

    /// Count a request for `principal`. Over-limit requests are still recorded.
    pub(crate) fn check(&self, principal: &str, now: Instant) -> Result<u32> {
        // Poisoned mutex means a logic bug; reject instead of panicking.
        let Ok(mut windows) = self.windows.lock() else {
            tracing::warn!(principal, "rate table lock poisoned; rejecting");
            return Err(OtelGateError::RateLimitExceeded);
        };
        let count = windows.hit(principal, now, self.window);
        let evicted = windows.evict_oldest(self.max_entries);
        drop(windows);

        if evicted > 0 {
            tracing::warn!(evicted, max_entries = self.max_entries, "rate table full; evicted oldest entries");
        }
        if count > self.max_requests {
            return Err(OtelGateError::RateLimitExceeded);
        }
        Ok(count)
    }

    /// Remove every entry whose window has fully elapsed.
    pub(crate) fn sweep(&self, now: Instant) -> usize {
        match self.windows.lock() {
            Ok(mut windows) => windows.sweep(now, self.window),
            Err(_) => 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.windows.lock().map(|w| w.entries.len()).unwrap_or(0)
    }

    pub(crate) fn count(&self, principal: &str) -> Option<u32> {
        let windows = self.windows.lock().ok()?;
        windows.entries.get(principal).map(|e| e.count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn over_limit_is_counted_and_rejected() {
        let table = RateTable::new(WINDOW, 2, 10);
        let now = Instant::now();
        assert_eq!(table.check("a", now).unwrap(), 1);
        assert_eq!(table.check("a", now).unwrap(), 2);
        assert!(matches!(table.check("a", now), Err(OtelGateError::RateLimitExceeded)));
        assert_eq!(table.count("a"), Some(3));
    }

    #[test]
    fn window_resets_at_exact_boundary() {
        let table = RateTable::new(WINDOW, 1, 10);
        let start = Instant::now();
        table.check("a", start).unwrap();
        assert!(table.check("a", start + WINDOW - Duration::from_millis(1)).is_err());
        assert_eq!(table.check("a", start + WINDOW).unwrap(), 1);
    }

    #[test]
    fn eviction_follows_insertion_not_recency() {
        let table = RateTable::new(WINDOW, 100, 2);
        let now = Instant::now();
        table.check("first", now).unwrap();
        table.check("second", now).unwrap();
        // touching "first" again does not move it to the back
        table.check("first", now).unwrap();
        table.check("third", now).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.count("first"), None);
        assert_eq!(table.count("second"), Some(1));
        assert_eq!(table.count("third"), Some(1));
    }

    #[test]
    fn reset_window_keeps_insertion_position() {
        let table = RateTable::new(WINDOW, 100, 2);
        let start = Instant::now();
        table.check("first", start).unwrap();
        table.check("second", start).unwrap();
        table.check("first", start + WINDOW).unwrap();
        table.check("third", start + WINDOW).unwrap();
        assert_eq!(table.count("first"), None);
    }

    #[test]
    fn sweep_removes_only_elapsed_windows() {
        let table = RateTable::new(WINDOW, 100, 10);
        let start = Instant::now();
        table.check("old", start).unwrap();
        table.check("new", start + Duration::from_secs(30)).unwrap();
        assert_eq!(table.sweep(start + WINDOW), 1);
        assert_eq!(table.count("old"), None);
        assert_eq!(table.count("new"), Some(1));

        // the freed slot in the order index is gone too
        table.check("later", start + WINDOW).unwrap();
        assert_eq!(table.len(), 2);
    }
}
