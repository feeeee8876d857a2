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

//! Sorted view over currently-cached keys by ascending reward, and the
//! cross-edge victim snapshots exchanged alongside cooperation messages
//! (§4.3).
//!
//! The pertinent design decision carried over unchanged: a neighbor's
//! reported victims are trusted for *ordering* only. This edge never evicts
//! a neighbor's victim directly; it only uses the merged, sorted view to
//! decide whether a newly observed reward clears the fleet-wide floor.

use std::collections::BTreeSet;

use hashbrown::HashMap;

use covered_common::edgeset::EdgeIndex;
use covered_common::Key;

use crate::reward::{EvictionOrd, Recency, Reward};

#[derive(Debug, Clone)]
pub struct VictimCacheinfo<K> {
    pub key: K,
    pub reward: Reward,
    pub last_vtime: Recency,
    pub size_bytes: u32,
}

/// Ordered sequence of at most `k` victims. Ascending reward, ties by
/// ascending vtime, matching §3. Receiving the same snapshot twice must not
/// change state: [`VictimTracker::ingest`] simply replaces the prior
/// snapshot for that edge, which is naturally idempotent.
#[derive(Debug, Clone, Default)]
pub struct VictimSyncset<K> {
    pub entries: Vec<VictimCacheinfo<K>>,
}

struct Entry<K> {
    key: K,
    reward: Reward,
    last_vtime: Recency,
    size_bytes: u32,
}

/// Local tracker over all currently-cached keys plus ingested neighbor
/// snapshots.
pub struct VictimTracker<K: Key> {
    order: BTreeSet<(EvictionOrd, u64)>,
    by_order_key: HashMap<(EvictionOrd, u64), K>,
    entries: HashMap<K, (u64, Entry<K>)>,
    next_seq: u64,
    neighbor_snapshots: HashMap<EdgeIndex, VictimSyncset<K>>,
}

impl<K: Key> VictimTracker<K> {
    pub fn new() -> Self {
        Self {
            order: BTreeSet::new(),
            by_order_key: HashMap::new(),
            entries: HashMap::new(),
            next_seq: 0,
            neighbor_snapshots: HashMap::new(),
        }
    }

    fn remove_internal(&mut self, key: &K) {
        if let Some((seq, entry)) = self.entries.remove(key) {
            let ord_key = (EvictionOrd(entry.reward, entry.last_vtime), seq);
            self.order.remove(&ord_key);
            self.by_order_key.remove(&ord_key);
        }
    }

    pub fn on_admit(&mut self, key: K, reward: Reward, last_vtime: Recency, size_bytes: u32) {
        self.remove_internal(&key);
        let seq = self.next_seq;
        self.next_seq += 1;
        let ord_key = (EvictionOrd(reward, last_vtime), seq);
        self.order.insert(ord_key);
        self.by_order_key.insert(ord_key, key.clone());
        self.entries.insert(
            key.clone(),
            (
                seq,
                Entry {
                    key,
                    reward,
                    last_vtime,
                    size_bytes,
                },
            ),
        );
    }

    pub fn on_evict(&mut self, key: &K) {
        self.remove_internal(key);
    }

    pub fn on_access(&mut self, key: K, reward: Reward, last_vtime: Recency) {
        if let Some((_, entry)) = self.entries.get(&key) {
            let size_bytes = entry.size_bytes;
            self.on_admit(key, reward, last_vtime, size_bytes);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lowest-reward `k` entries, ascending.
    pub fn local_victims(&self, k: usize) -> VictimSyncset<K> {
        let entries = self
            .order
            .iter()
            .take(k)
            .filter_map(|ord_key| self.by_order_key.get(ord_key))
            .filter_map(|key| self.entries.get(key))
            .map(|(_, e)| VictimCacheinfo {
                key: e.key.clone(),
                reward: e.reward,
                last_vtime: e.last_vtime,
                size_bytes: e.size_bytes,
            })
            .collect();
        VictimSyncset { entries }
    }

    /// Store a neighbor's snapshot, replacing whatever it previously sent.
    pub fn ingest(&mut self, from_edge: EdgeIndex, syncset: VictimSyncset<K>) {
        self.neighbor_snapshots.insert(from_edge, syncset);
    }

    /// Merge local victims with every ingested neighbor snapshot into one
    /// ascending-reward view, for [`crate::admission::AdmissionPlacementEngine`]
    /// to compute the global floor from.
    pub fn global_victim_candidates(&self, local_k: usize) -> Vec<VictimCacheinfo<K>> {
        let mut all: Vec<VictimCacheinfo<K>> = self.local_victims(local_k).entries;
        for snapshot in self.neighbor_snapshots.values() {
            all.extend(snapshot.entries.iter().cloned());
        }
        all.sort_by(|a, b| a.reward.cmp(&b.reward).then(a.last_vtime.cmp(&b.last_vtime)));
        all
    }

    /// The global victim floor (§4.5): the lowest reward known anywhere, or
    /// `None` if no victim is known at all (meaning: always admit).
    pub fn global_floor(&self, local_k: usize) -> Option<Reward> {
        self.global_victim_candidates(local_k)
            .first()
            .map(|v| v.reward)
    }
}

impl<K: Key> Default for VictimTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone> Clone for VictimCacheinfo<K> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            reward: self.reward,
            last_vtime: self.last_vtime,
            size_bytes: self.size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordered_float::OrderedFloat;

    #[test]
    fn local_victims_ascending_by_reward() {
        let mut t: VictimTracker<String> = VictimTracker::new();
        t.on_admit("a".to_string(), OrderedFloat(5.0), 1, 10);
        t.on_admit("b".to_string(), OrderedFloat(1.0), 2, 10);
        t.on_admit("c".to_string(), OrderedFloat(3.0), 3, 10);
        let syncset = t.local_victims(10);
        let keys: Vec<_> = syncset.entries.iter().map(|e| e.key.clone()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn ingest_is_idempotent_on_replay() {
        let mut t: VictimTracker<String> = VictimTracker::new();
        let syncset = VictimSyncset {
            entries: vec![VictimCacheinfo {
                key: "x".to_string(),
                reward: OrderedFloat(1.0),
                last_vtime: 1,
                size_bytes: 4,
            }],
        };
        t.ingest(2, syncset.clone());
        t.ingest(2, syncset);
        assert_eq!(t.global_victim_candidates(10).len(), 1);
    }

    #[test]
    fn global_floor_none_when_nothing_known() {
        let t: VictimTracker<String> = VictimTracker::new();
        assert!(t.global_floor(10).is_none());
    }

    #[test]
    fn eviction_removes_from_local_view() {
        let mut t: VictimTracker<String> = VictimTracker::new();
        t.on_admit("a".to_string(), OrderedFloat(5.0), 1, 10);
        t.on_evict(&"a".to_string());
        assert!(t.is_empty());
    }
}
