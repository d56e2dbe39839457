//! Sliding-window rate limiter keyed by `(brand, client ip)`.
//!
//! Each key keeps the timestamps of its recent requests. A request that
//! would exceed the quota inside the window locks the key out for the
//! lockout period; further requests are rejected until it expires.
//!
//! The number of tracked keys is capped. At capacity, idle keys are
//! pruned (at most once per second); if that frees nothing, the key seen
//! least recently is evicted to make room.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::model::RateLimitConfig;

pub const MAX_TRACKED_KEYS: usize = 10_000;

const PRUNE_INTERVAL: Duration = Duration::from_secs(1);

type Key = (String, IpAddr);

#[derive(Debug)]
struct Window {
    hits: VecDeque<Instant>,
    locked_until: Option<Instant>,
    last_seen: Instant,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self {
            hits: VecDeque::new(),
            locked_until: None,
            last_seen: now,
        }
    }

    fn is_idle(&self, now: Instant, window: Duration) -> bool {
        self.locked_until.map_or(true, |until| until <= now)
            && self
                .hits
                .back()
                .map_or(true, |last| now.saturating_duration_since(*last) >= window)
    }
}

#[derive(Debug)]
struct Tracker {
    windows: HashMap<Key, Window>,
    last_prune: Option<Instant>,
}

impl Tracker {
    /// Make room for one more key.
    fn reserve(&mut self, now: Instant, window: Duration, capacity: usize) {
        let due = self
            .last_prune
            .map_or(true, |at| now.saturating_duration_since(at) >= PRUNE_INTERVAL);
        if due {
            self.windows.retain(|_, w| !w.is_idle(now, window));
            self.last_prune = Some(now);
        }

        if self.windows.len() >= capacity {
            let stalest = self
                .windows
                .iter()
                .min_by_key(|(_, w)| w.last_seen)
                .map(|(key, _)| key.clone());
            if let Some(key) = stalest {
                self.windows.remove(&key);
            }
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    lockout: Duration,
    capacity: usize,
    tracker: Mutex<Tracker>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests as usize,
            window: Duration::from_secs(config.window_secs),
            lockout: Duration::from_secs(config.lockout_secs),
            capacity: MAX_TRACKED_KEYS,
            tracker: Mutex::new(Tracker {
                windows: HashMap::new(),
                last_prune: None,
            }),
        }
    }

    /// Record a request. `Err` carries how long the caller stays locked out.
    pub fn check(&self, brand_id: &str, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(brand_id, ip, Instant::now())
    }

    pub fn check_at(&self, brand_id: &str, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        // Counters stay usable after a panic elsewhere.
        let mut tracker = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);

        let key = (brand_id.to_string(), ip);
        if !tracker.windows.contains_key(&key) && tracker.windows.len() >= self.capacity {
            tracker.reserve(now, self.window, self.capacity);
        }

        let entry = tracker
            .windows
            .entry(key)
            .or_insert_with(|| Window::new(now));
        entry.last_seen = now;

        if let Some(until) = entry.locked_until {
            if until > now {
                return Err(until - now);
            }
            entry.locked_until = None;
        }

        while entry
            .hits
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            entry.hits.pop_front();
        }

        if entry.hits.len() >= self.max_requests {
            entry.hits.clear();
            entry.locked_until = Some(now + self.lockout);
            return Err(self.lockout);
        }

        entry.hits.push_back(now);
        Ok(())
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .windows
            .len()
    }
}
