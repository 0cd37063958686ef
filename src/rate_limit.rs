use crate::error::SafetyError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Limiter scopes with fully independent counters and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateScope {
    Submission,
    Reporting,
    Admin,
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Window length; the counter resets entirely at window end.
    pub interval: Duration,
    /// Cap on tracked identities; the oldest-inserted entry is evicted
    /// beyond this to bound memory.
    pub max_tracked: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_tracked: 500,
        }
    }
}

impl RateLimiterConfig {
    pub fn for_scope(scope: RateScope) -> Self {
        match scope {
            RateScope::Submission => Self {
                interval: Duration::from_secs(10 * 60),
                max_tracked: 500,
            },
            RateScope::Reporting => Self {
                interval: Duration::from_secs(5 * 60),
                max_tracked: 500,
            },
            RateScope::Admin => Self {
                interval: Duration::from_secs(60),
                max_tracked: 100,
            },
        }
    }
}

/// Snapshot returned on an allowed request.
#[derive(Debug, Clone, Serialize)]
pub struct RateQuota {
    pub count: u32,
    pub limit: u32,
    pub reset_in_secs: u64,
}

#[derive(Debug)]
struct RateWindow {
    count: u32,
    window_end: Instant,
}

/// Per-identity sliding-window-by-reset counter. The counter table is the
/// one piece of shared mutable state in the pipeline; increments go
/// through the map's entry API so each check is a single atomic
/// read-modify-write under concurrent traffic.
#[derive(Clone)]
pub struct RateLimiter {
    interval: Duration,
    max_tracked: usize,
    windows: Arc<DashMap<String, RateWindow>>,
    insertions: Arc<Mutex<VecDeque<String>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            interval: config.interval,
            max_tracked: config.max_tracked,
            windows: Arc::new(DashMap::new()),
            insertions: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn for_scope(scope: RateScope) -> Self {
        Self::new(RateLimiterConfig::for_scope(scope))
    }

    /// Counts one request from `identity`. The first request in a window
    /// sets count=1 and schedules the window's expiry; subsequent requests
    /// increment until `limit`, then reject with the seconds remaining
    /// until the window resets.
    pub fn check(&self, identity: &str, limit: u32) -> Result<RateQuota, SafetyError> {
        let now = Instant::now();

        let (outcome, inserted) = {
            match self.windows.entry(identity.to_string()) {
                Entry::Occupied(mut occupied) => {
                    let window = occupied.get_mut();
                    if now >= window.window_end {
                        // Lapsed window whose expiry task has not fired yet
                        window.count = 1;
                        window.window_end = now + self.interval;
                        (Ok(self.quota(window, limit, now)), false)
                    } else if window.count < limit {
                        window.count += 1;
                        (Ok(self.quota(window, limit, now)), false)
                    } else {
                        let retry_after_secs = remaining_secs(window.window_end, now);
                        (
                            Err(SafetyError::RateLimited { retry_after_secs }),
                            false,
                        )
                    }
                }
                Entry::Vacant(vacant) => {
                    let window = RateWindow {
                        count: 1,
                        window_end: now + self.interval,
                    };
                    let quota = self.quota(&window, limit, now);
                    vacant.insert(window);
                    (Ok(quota), true)
                }
            }
        };

        if inserted {
            self.track_insertion(identity.to_string());
            self.schedule_expiry(identity.to_string());
        }

        if let Err(e) = &outcome {
            debug!(identity, ?e, "Request rejected by rate limiter");
        }

        outcome
    }

    fn quota(&self, window: &RateWindow, limit: u32, now: Instant) -> RateQuota {
        RateQuota {
            count: window.count,
            limit,
            reset_in_secs: remaining_secs(window.window_end, now),
        }
    }

    fn track_insertion(&self, identity: String) {
        let mut insertions = self
            .insertions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        insertions.push_back(identity);

        // Expired windows leave their queue entries behind; once stale
        // entries dominate, drop every entry with no live window
        if insertions.len() > self.max_tracked.saturating_mul(2) {
            insertions.retain(|id| self.windows.contains_key(id));
        }

        // Evict oldest-inserted identities beyond the tracking cap. An
        // approximation of LRU: an evicted abuser regains a fresh window,
        // which is accepted over unbounded memory growth.
        while self.windows.len() > self.max_tracked {
            let Some(oldest) = insertions.pop_front() else {
                break;
            };
            if self.windows.remove(&oldest).is_some() {
                warn!(identity = %oldest, "Evicted rate window to bound tracked identities");
            }
        }
    }

    #[cfg(test)]
    fn tracked_insertions(&self) -> usize {
        self.insertions.lock().unwrap().len()
    }

    /// Windows self-expire without an external sweep. Outside a tokio
    /// runtime the timer cannot be scheduled and lapsed windows are
    /// reclaimed lazily on the next check instead.
    fn schedule_expiry(&self, identity: String) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let windows = Arc::clone(&self.windows);
        let interval = self.interval;
        handle.spawn(async move {
            tokio::time::sleep(interval).await;
            windows.remove_if(&identity, |_, window| Instant::now() >= window.window_end);
        });
    }
}

fn remaining_secs(window_end: Instant, now: Instant) -> u64 {
    let remaining = window_end.saturating_duration_since(now);
    let secs = (remaining.as_millis() as u64 + 999) / 1000;
    secs.max(1)
}
