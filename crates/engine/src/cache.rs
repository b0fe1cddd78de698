// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tiered TTL cache.
//!
//! Four independent tiers, each with its own TTL. An expired entry is a miss
//! and is evicted by the read that finds it. Reads run concurrently; the
//! last write to a key wins. Nothing invalidates across tiers.

use gdx_core::{Clock, PerformanceConfig};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// Template documents and built template artifacts
    Template,
    /// Built artifacts of arbitrary game structures
    Structure,
    /// Game document validation verdicts
    Validation,
    /// Packaged exports
    Assets,
}

impl CacheTier {
    pub const ALL: [CacheTier; 4] = [
        CacheTier::Template,
        CacheTier::Structure,
        CacheTier::Validation,
        CacheTier::Assets,
    ];

    fn index(self) -> usize {
        match self {
            CacheTier::Template => 0,
            CacheTier::Structure => 1,
            CacheTier::Validation => 2,
            CacheTier::Assets => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheTier::Template => "template",
            CacheTier::Structure => "structure",
            CacheTier::Validation => "validation",
            CacheTier::Assets => "assets",
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TTL of every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTtls([Duration; 4]);

impl TierTtls {
    pub fn new(template: Duration, structure: Duration, validation: Duration, assets: Duration) -> Self {
        Self([template, structure, validation, assets])
    }

    pub fn from_config(perf: &PerformanceConfig) -> Self {
        Self::new(
            Duration::from_secs(perf.template_cache_ttl),
            Duration::from_secs(perf.game_structure_cache_ttl),
            Duration::from_secs(perf.validation_cache_ttl),
            Duration::from_secs(perf.assets_cache_ttl),
        )
    }

    pub fn get(&self, tier: CacheTier) -> Duration {
        self.0[tier.index()]
    }
}

impl Default for TierTtls {
    fn default() -> Self {
        Self::from_config(&PerformanceConfig::default())
    }
}

struct Entry<V> {
    value: V,
    written_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.written_at) > self.ttl
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Per-tier counters as reported in health snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStats {
    pub tier: CacheTier,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub tiers: Vec<TierStats>,
}

impl CacheStats {
    /// Hits over lookups across every tier, as a percentage.
    pub fn hit_rate(&self) -> Option<f64> {
        let hits: u64 = self.tiers.iter().map(|t| t.hits).sum();
        let total = hits + self.tiers.iter().map(|t| t.misses).sum::<u64>();
        (total > 0).then(|| hits as f64 * 100.0 / total as f64)
    }
}

pub struct TieredCache<V, C: Clock> {
    enabled: bool,
    ttls: TierTtls,
    clock: C,
    tiers: [RwLock<HashMap<String, Entry<V>>>; 4],
    counters: [Counters; 4],
}

impl<V: Clone, C: Clock> TieredCache<V, C> {
    pub fn new(enabled: bool, ttls: TierTtls, clock: C) -> Self {
        Self {
            enabled,
            ttls,
            clock,
            tiers: Default::default(),
            counters: Default::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self, tier: CacheTier) -> Duration {
        self.ttls.get(tier)
    }

    /// Look up `key`. Always a miss while the cache is disabled.
    pub fn get(&self, tier: CacheTier, key: &str) -> Option<V> {
        let found = if self.enabled {
            self.lookup(tier, key)
        } else {
            None
        };
        let counters = &self.counters[tier.index()];
        match found {
            Some(_) => counters.hits.fetch_add(1, Ordering::Relaxed),
            None => counters.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    fn lookup(&self, tier: CacheTier, key: &str) -> Option<V> {
        let now = self.clock.now();
        let map = &self.tiers[tier.index()];
        {
            let entries = map.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }
        let mut entries = map.write();
        // Another writer may have refreshed it between the two locks.
        match entries.get(key) {
            Some(entry) if !entry.expired(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                tracing::trace!(tier = %tier, key, "evicted expired entry");
                None
            }
            None => None,
        }
    }

    /// Store `value` under the tier's TTL.
    pub fn put(&self, tier: CacheTier, key: impl Into<String>, value: V) {
        self.put_with_ttl(tier, key, value, self.ttls.get(tier));
    }

    /// Store `value` with a TTL no longer than the tier's.
    pub fn put_with_ttl(&self, tier: CacheTier, key: impl Into<String>, value: V, ttl: Duration) {
        if !self.enabled {
            return;
        }
        let entry = Entry {
            value,
            written_at: self.clock.now(),
            ttl: ttl.min(self.ttls.get(tier)),
        };
        self.tiers[tier.index()].write().insert(key.into(), entry);
    }

    /// Returns whether an entry was removed.
    pub fn invalidate(&self, tier: CacheTier, key: &str) -> bool {
        self.tiers[tier.index()].write().remove(key).is_some()
    }

    pub fn clear_tier(&self, tier: CacheTier) -> usize {
        let mut entries = self.tiers[tier.index()].write();
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn clear_all(&self) -> usize {
        CacheTier::ALL.iter().map(|tier| self.clear_tier(*tier)).sum()
    }

    /// Drop every expired entry. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for map in &self.tiers {
            let mut entries = map.write();
            let before = entries.len();
            entries.retain(|_, entry| !entry.expired(now));
            removed += before - entries.len();
        }
        removed
    }

    pub fn len(&self, tier: CacheTier) -> usize {
        self.tiers[tier.index()].read().len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.enabled,
            tiers: CacheTier::ALL
                .iter()
                .map(|&tier| {
                    let counters = &self.counters[tier.index()];
                    TierStats {
                        tier,
                        entries: self.len(tier),
                        hits: counters.hits.load(Ordering::Relaxed),
                        misses: counters.misses.load(Ordering::Relaxed),
                        ttl_secs: self.ttls.get(tier).as_secs(),
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
