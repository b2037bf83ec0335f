//! Explicit read-through cache for upstream price queries.
//!
//! Keys are the full query triple `(region, start, end)`. Only successful
//! fetches are stored; a failed fetch is simply retried on the next request,
//! so errors never go stale in here.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::pricing::PriceSeries;
use crate::upstream::PriceRequest;

struct CacheEntry {
    fetched_at: Instant,
    series: PriceSeries,
}

pub struct PriceCache {
    ttl: Duration,
    entries: Mutex<HashMap<PriceRequest, CacheEntry>>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh hit or nothing. Expired entries are evicted on the way out.
    pub fn get(&self, req: &PriceRequest) -> Option<PriceSeries> {
        let mut guard = self
            .entries
            .lock()
            .expect("price cache lock should not be poisoned");

        match guard.get(req) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => {
                debug!(
                    component = "cache",
                    event = "cache.hit",
                    region = %req.region_code
                );
                Some(entry.series.clone())
            }
            Some(_) => {
                guard.remove(req);
                debug!(
                    component = "cache",
                    event = "cache.expired",
                    region = %req.region_code
                );
                None
            }
            None => {
                debug!(
                    component = "cache",
                    event = "cache.miss",
                    region = %req.region_code
                );
                None
            }
        }
    }

    pub fn insert(&self, req: PriceRequest, series: PriceSeries) {
        let mut guard = self
            .entries
            .lock()
            .expect("price cache lock should not be poisoned");
        guard.insert(
            req,
            CacheEntry {
                fetched_at: Instant::now(),
                series,
            },
        );
    }

    /// Manual eviction of one query.
    pub fn invalidate(&self, req: &PriceRequest) {
        self.entries
            .lock()
            .expect("price cache lock should not be poisoned")
            .remove(req);
    }

    /// Drops every entry past its TTL and reports how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut guard = self
            .entries
            .lock()
            .expect("price cache lock should not be poisoned");
        let before = guard.len();
        guard.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("price cache lock should not be poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
