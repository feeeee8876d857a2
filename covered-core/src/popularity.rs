//  Copyright 2024 COVERED Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! Per-key popularity bookkeeping, cached and uncached (§4.2).
//!
//! Field shape (`group_id`, `frequency`, `last_vtime`, `is_neighbor_cached`
//! for cached stats; the same plus `recency` for uncached stats) is grounded
//! on `original_source/src/cache/covered/{local_cached_perkey_statistics,
//! local_uncached_perkey_statistics,perkey_statistics}.{h,c}`. The uncached
//! table is a bounded admission structure in its own right: entering it
//! competes on reward with an LRU tie-break exactly like the cached
//! eviction/admission comparators in [`crate::reward`].

use std::collections::BTreeSet;

use hashbrown::HashMap;

use covered_common::edgeset::EdgeIndex;
use covered_common::Key;

use crate::reward::{AdmissionOrd, EvictionOrd, Recency, Reward, RewardFn};

pub type GroupId = u32;
pub type Popularity = f64;

/// The uncached-side reward contribution this edge would report to a
/// beacon/neighbor for one key, per §3's `CollectedPopularity`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectedPopularity {
    pub is_tracked: bool,
    pub local_uncached_popularity: Popularity,
}

impl CollectedPopularity {
    pub const UNTRACKED: Self = Self {
        is_tracked: false,
        local_uncached_popularity: 0.0,
    };
}

#[derive(Debug, Clone, Copy)]
pub struct PerkeyCachedStats {
    pub group_id: GroupId,
    pub frequency: u64,
    pub last_vtime: Recency,
    pub is_neighbor_cached: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PerkeyUncachedStats {
    pub group_id: GroupId,
    pub frequency: u64,
    pub last_vtime: Recency,
    pub is_neighbor_cached: bool,
    pub recency: Recency,
}

impl PerkeyUncachedStats {
    fn from_cached(s: PerkeyCachedStats, recency: Recency) -> Self {
        Self {
            group_id: s.group_id,
            frequency: s.frequency,
            last_vtime: s.last_vtime,
            is_neighbor_cached: s.is_neighbor_cached,
            recency,
        }
    }

    fn to_cached(self) -> PerkeyCachedStats {
        PerkeyCachedStats {
            group_id: self.group_id,
            frequency: self.frequency,
            last_vtime: self.last_vtime,
            is_neighbor_cached: self.is_neighbor_cached,
        }
    }
}

/// Tracks per-key cached/uncached popularity for the local edge. A key is
/// present in at most one of `cached`/`uncached` at a time (§4.2 invariant).
pub struct PopularityTracker<K: Key> {
    reward_fn: Box<dyn RewardFn>,
    vtime: Recency,
    cached: HashMap<K, PerkeyCachedStats>,
    uncached: HashMap<K, PerkeyUncachedStats>,
    uncached_order: BTreeSet<(EvictionOrd, u64)>,
    uncached_keys_by_order: HashMap<(EvictionOrd, u64), K>,
    uncached_capacity: usize,
    next_seq: u64,
    // neighbor contributions, keyed by (key, from_edge)
    collected: HashMap<(K, EdgeIndex), CollectedPopularity>,
}

impl<K: Key> PopularityTracker<K> {
    pub fn new(reward_fn: Box<dyn RewardFn>, uncached_capacity: usize) -> Self {
        Self {
            reward_fn,
            vtime: 0,
            cached: HashMap::new(),
            uncached: HashMap::new(),
            uncached_order: BTreeSet::new(),
            uncached_keys_by_order: HashMap::new(),
            uncached_capacity,
            next_seq: 0,
            collected: HashMap::new(),
        }
    }

    fn tick(&mut self) -> Recency {
        self.vtime += 1;
        self.vtime
    }

    fn reward_of_cached(&self, s: &PerkeyCachedStats) -> Reward {
        let popularity = self.cooperative_popularity_hint(s);
        self.reward_fn.compute(s.frequency, popularity)
    }

    fn cooperative_popularity_hint(&self, s: &PerkeyCachedStats) -> Option<f64> {
        if s.is_neighbor_cached {
            Some(1.0)
        } else {
            None
        }
    }

    /// Record an access, cached or not, bumping frequency/vtime. Returns the
    /// key evicted from the uncached table to make room, if any, so the
    /// caller can drop it from [`crate::directory_cacher::DirectoryCacher`]
    /// (it's no longer tracked as uncached-and-owned-elsewhere).
    pub fn observe_access(&mut self, key: &K, cached: bool) -> Option<K> {
        let vtime = self.tick();
        if cached {
            if let Some(s) = self.cached.get_mut(key) {
                s.frequency += 1;
                s.last_vtime = vtime;
                return None;
            }
            // First observation as cached with no prior stats: admission
            // (§4.5) is expected to call on_admit separately, but a caller
            // observing a cache hit before admission completed still needs
            // somewhere to record it.
            self.cached.insert(
                key.clone(),
                PerkeyCachedStats {
                    group_id: 0,
                    frequency: 1,
                    last_vtime: vtime,
                    is_neighbor_cached: false,
                },
            );
            return None;
        }

        if let Some(mut s) = self.uncached.remove(key) {
            self.remove_from_order(key, &s);
            s.frequency += 1;
            s.last_vtime = vtime;
            s.recency = vtime;
            return self.insert_uncached(key.clone(), s);
        }

        self.insert_uncached(
            key.clone(),
            PerkeyUncachedStats {
                group_id: 0,
                frequency: 1,
                last_vtime: vtime,
                is_neighbor_cached: false,
                recency: vtime,
            },
        )
    }

    fn remove_from_order(&mut self, key: &K, s: &PerkeyUncachedStats) {
        let cached_view = s.to_cached();
        let reward = self.reward_of_cached(&cached_view);
        // The seq used at insertion time is not recoverable from `s` alone,
        // so we scan the small index map instead of re-deriving it; the
        // uncached table is capacity-bounded and this stays cheap.
        if let Some((&ord_key, _)) = self
            .uncached_keys_by_order
            .iter()
            .find(|(_, k)| *k == key)
        {
            self.uncached_order.remove(&ord_key);
            self.uncached_keys_by_order.remove(&ord_key);
        }
        let _ = reward;
    }

    /// Insert into the uncached table, evicting the weakest entry if that
    /// pushes the table past `uncached_capacity`. Returns the evicted key, if
    /// any, so callers can notify [`crate::directory_cacher::DirectoryCacher`]
    /// that this edge no longer tracks it.
    fn insert_uncached(&mut self, key: K, s: PerkeyUncachedStats) -> Option<K> {
        let reward = self.reward_of_cached(&s.to_cached());
        let seq = self.next_seq;
        self.next_seq += 1;
        let ord_key = (EvictionOrd(reward, s.last_vtime), seq);
        self.uncached_order.insert(ord_key);
        self.uncached_keys_by_order.insert(ord_key, key.clone());
        self.uncached.insert(key, s);

        let mut evicted = None;
        while self.uncached.len() > self.uncached_capacity {
            if let Some(&weakest) = self.uncached_order.iter().next() {
                self.uncached_order.remove(&weakest);
                if let Some(evicted_key) = self.uncached_keys_by_order.remove(&weakest) {
                    self.uncached.remove(&evicted_key);
                    evicted = Some(evicted_key);
                }
            } else {
                break;
            }
        }
        evicted
    }

    /// Move a key's stats from uncached to cached on successful admission.
    pub fn on_admit(&mut self, key: &K) {
        if let Some(s) = self.uncached.remove(key) {
            self.remove_from_order(key, &s);
            self.cached.insert(key.clone(), s.to_cached());
        } else if !self.cached.contains_key(key) {
            let vtime = self.tick();
            self.cached.insert(
                key.clone(),
                PerkeyCachedStats {
                    group_id: 0,
                    frequency: 0,
                    last_vtime: vtime,
                    is_neighbor_cached: false,
                },
            );
        }
    }

    /// Move a key's stats from cached to uncached on eviction (keeps the
    /// historical frequency so a re-admitted-later key isn't cold). Returns
    /// a *different* key if demoting `key` into the uncached table pushed it
    /// over capacity and evicted that key out of tracking entirely.
    pub fn on_evict(&mut self, key: &K) -> Option<K> {
        if let Some(s) = self.cached.remove(key) {
            let vtime = self.tick();
            self.insert_uncached(key.clone(), PerkeyUncachedStats::from_cached(s, vtime))
        } else {
            None
        }
    }

    pub fn set_neighbor_cached(&mut self, key: &K, is_neighbor_cached: bool) {
        if let Some(s) = self.cached.get_mut(key) {
            s.is_neighbor_cached = is_neighbor_cached;
        }
        if let Some(s) = self.uncached.get_mut(key) {
            s.is_neighbor_cached = is_neighbor_cached;
        }
    }

    pub fn collected_popularity(&self, key: &K) -> CollectedPopularity {
        match self.uncached.get(key) {
            Some(s) => CollectedPopularity {
                is_tracked: true,
                local_uncached_popularity: self.reward_of_cached(&s.to_cached()).into_inner(),
            },
            None => CollectedPopularity::UNTRACKED,
        }
    }

    pub fn merge_collected(&mut self, key: K, from_edge: EdgeIndex, popularity: CollectedPopularity) {
        self.collected.insert((key, from_edge), popularity);
    }

    /// Aggregate cooperative popularity for `key` across everything merged
    /// in so far, or `None` if no neighbor has ever reported a tracked
    /// contribution (fed as `cooperative_popularity` into [`RewardFn`]).
    pub fn cooperative_popularity(&self, key: &K) -> Option<f64> {
        let mut total = 0.0;
        let mut count = 0u32;
        for ((k, _edge), pop) in self.collected.iter() {
            if k == key && pop.is_tracked {
                total += pop.local_uncached_popularity;
                count += 1;
            }
        }
        if count == 0 {
            None
        } else {
            Some(total / count as f64)
        }
    }

    pub fn reward_for_admission(&self, key: &K, frequency_hint: u64) -> Reward {
        let popularity = self.cooperative_popularity(key);
        self.reward_fn.compute(frequency_hint, popularity)
    }

    pub fn cached_reward(&self, key: &K) -> Option<Reward> {
        self.cached.get(key).map(|s| self.reward_of_cached(s))
    }

    /// Frequency to feed [`Self::reward_for_admission`] for `key`: whichever
    /// of the two tables currently tracks it, falling back to 1 for a key
    /// this edge has never observed (its very first access).
    pub fn frequency_hint(&self, key: &K) -> u64 {
        self.cached
            .get(key)
            .map(|s| s.frequency)
            .or_else(|| self.uncached.get(key).map(|s| s.frequency))
            .unwrap_or(1)
    }

    pub fn cached_stats(&self, key: &K) -> Option<&PerkeyCachedStats> {
        self.cached.get(key)
    }

    pub fn is_cached(&self, key: &K) -> bool {
        self.cached.contains_key(key)
    }

    pub fn is_uncached_tracked(&self, key: &K) -> bool {
        self.uncached.contains_key(key)
    }

    /// Halve every frequency counter (exponential decay on epoch rollover).
    pub fn decay_epoch(&mut self) {
        for s in self.cached.values_mut() {
            s.frequency /= 2;
        }
        for s in self.uncached.values_mut() {
            s.frequency /= 2;
        }
    }

    pub fn admission_candidates(&self) -> impl Iterator<Item = AdmissionOrd> + '_ {
        self.uncached
            .values()
            .map(|s| AdmissionOrd(self.reward_of_cached(&s.to_cached()), s.last_vtime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::WeightedRewardFn;

    fn tracker() -> PopularityTracker<String> {
        PopularityTracker::new(Box::new(WeightedRewardFn::default()), 2)
    }

    #[test]
    fn observe_access_uncached_then_promote() {
        let mut t = tracker();
        t.observe_access(&"a".to_string(), false);
        assert!(t.is_uncached_tracked(&"a".to_string()));
        t.on_admit(&"a".to_string());
        assert!(t.is_cached(&"a".to_string()));
        assert!(!t.is_uncached_tracked(&"a".to_string()));
    }

    #[test]
    fn uncached_table_is_capacity_bounded() {
        let mut t = tracker();
        t.observe_access(&"a".to_string(), false);
        t.observe_access(&"b".to_string(), false);
        t.observe_access(&"c".to_string(), false);
        let tracked = ["a", "b", "c"]
            .iter()
            .filter(|k| t.is_uncached_tracked(&k.to_string()))
            .count();
        assert_eq!(tracked, 2);
    }

    #[test]
    fn collected_popularity_untracked_by_default() {
        let t = tracker();
        let cp = t.collected_popularity(&"z".to_string());
        assert!(!cp.is_tracked);
    }

    #[test]
    fn merge_collected_feeds_cooperative_popularity() {
        let mut t = tracker();
        t.merge_collected(
            "a".to_string(),
            1,
            CollectedPopularity {
                is_tracked: true,
                local_uncached_popularity: 4.0,
            },
        );
        assert_eq!(t.cooperative_popularity(&"a".to_string()), Some(4.0));
        assert_eq!(t.cooperative_popularity(&"b".to_string()), None);
    }

    #[test]
    fn decay_halves_frequency() {
        let mut t = tracker();
        t.on_admit(&"a".to_string());
        if let Some(s) = t.cached.get_mut(&"a".to_string()) {
            s.frequency = 10;
        }
        t.decay_epoch();
        assert_eq!(t.cached_stats(&"a".to_string()).unwrap().frequency, 5);
    }
}
