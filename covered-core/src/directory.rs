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

//! Beacon-role `DirectoryTable` state machine (§4.4.1).
//!
//! The public `DirectoryInfo` the spec exposes carries only `owner_edge`,
//! but deciding the `multi`/`is_neighbor_cached` transitions correctly
//! requires knowing the *full* set of edges currently holding a copy, not
//! just the nominal owner. We keep that full `copies` set as private,
//! beacon-internal bookkeeping and only ever surface the owner (or, for
//! notification purposes, edge indices) across the public API — `multi` is
//! derived as `copies.len() > 1` rather than stored redundantly.
//!
//! The table is striped the same way as [`crate::rwlock::PerKeyRwLockTable`]
//! (hash-and-mask over `XxHash64`, grounded on `container.rs`): the per-key
//! serialization §4.6 requires ("per-key operations at the beacon are
//! serialized by the beacon's per-key write lock") falls naturally out of
//! each shard being a single `Mutex`.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use covered_common::edgeset::EdgeIndex;
use covered_common::Key;
use hashbrown::HashMap;
use parking_lot::Mutex;
use twox_hash::XxHash64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryInfo {
    pub owner_edge: EdgeIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockResult {
    Granted,
    Busy { holder: EdgeIndex },
}

#[derive(Debug)]
enum DirectoryState {
    Absent,
    Cached {
        owner: EdgeIndex,
        copies: BTreeSet<EdgeIndex>,
    },
    CachedWriting {
        holder: EdgeIndex,
        prior_copies: BTreeSet<EdgeIndex>,
    },
    AbsentWriting {
        holder: EdgeIndex,
    },
}

struct DirectoryEntry {
    state: DirectoryState,
    generation: u64,
    lease_deadline: Option<Instant>,
}

impl Default for DirectoryEntry {
    fn default() -> Self {
        Self {
            state: DirectoryState::Absent,
            generation: 0,
            lease_deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LookupResult {
    pub is_being_written: bool,
    pub valid: bool,
    pub info: Option<DirectoryInfo>,
}

#[derive(Debug, Clone, Copy)]
pub struct AdmitResult {
    pub is_being_written: bool,
    pub is_neighbor_cached: bool,
}

#[derive(Debug, Clone)]
pub struct EvictResult {
    pub is_being_written: bool,
    pub edgeset_to_notify: Vec<EdgeIndex>,
}

#[derive(Debug, Clone)]
pub struct AcquireWriteResult {
    pub result: LockResult,
    pub copies_to_invalidate: Vec<EdgeIndex>,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct ReleaseWriteResult {
    pub edgeset_to_notify: Vec<EdgeIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// `from_edge` never held the write lock for this key. Per §7 this is a
    /// protocol invariant violation: logged, counted, treated as a no-op.
    NotHolder,
    /// `generation` did not match the entry's current generation.
    Stale { current: u64 },
}

#[derive(Debug, Clone)]
pub struct ExpiredLease<K> {
    pub key: K,
    pub finish_block_targets: Vec<EdgeIndex>,
}

/// Beacon-side authoritative directory, striped by key hash.
pub struct DirectoryTable<K: Key> {
    shard_mask: u64,
    shards: Vec<Mutex<HashMap<K, DirectoryEntry>>>,
    lease_duration: Duration,
}

impl<K: Key> DirectoryTable<K> {
    pub fn new(shard_count: u32, lease_duration: Duration) -> Self {
        let shard_count = shard_count.max(1).next_power_of_two() as usize;
        let shards = (0..shard_count).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            shard_mask: shard_count as u64 - 1,
            shards,
            lease_duration,
        }
    }

    fn shard(&self, key: &K) -> &Mutex<HashMap<K, DirectoryEntry>> {
        let mut hasher = XxHash64::default();
        key.hash(&mut hasher);
        let idx = (hasher.finish() & self.shard_mask) as usize;
        &self.shards[idx]
    }

    pub fn lookup(&self, key: &K, _from_edge: EdgeIndex) -> LookupResult {
        let shard = self.shard(key).lock();
        match shard.get(key).map(|e| &e.state) {
            None | Some(DirectoryState::Absent) => LookupResult {
                is_being_written: false,
                valid: false,
                info: None,
            },
            Some(DirectoryState::Cached { owner, .. }) => LookupResult {
                is_being_written: false,
                valid: true,
                info: Some(DirectoryInfo { owner_edge: *owner }),
            },
            Some(DirectoryState::CachedWriting { .. }) | Some(DirectoryState::AbsentWriting { .. }) => LookupResult {
                is_being_written: true,
                valid: false,
                info: None,
            },
        }
    }

    pub fn admit(&self, key: &K, from_edge: EdgeIndex) -> (AdmitResult, Vec<EdgeIndex>) {
        let mut shard = self.shard(key).lock();
        let entry = shard.entry(key.clone()).or_default();
        match &mut entry.state {
            DirectoryState::CachedWriting { .. } | DirectoryState::AbsentWriting { .. } => (
                AdmitResult {
                    is_being_written: true,
                    is_neighbor_cached: false,
                },
                Vec::new(),
            ),
            DirectoryState::Absent => {
                let mut copies = BTreeSet::new();
                copies.insert(from_edge);
                entry.state = DirectoryState::Cached {
                    owner: from_edge,
                    copies,
                };
                (
                    AdmitResult {
                        is_being_written: false,
                        is_neighbor_cached: false,
                    },
                    Vec::new(),
                )
            }
            DirectoryState::Cached { owner, copies } => {
                if copies.contains(&from_edge) {
                    let is_neighbor_cached = copies.iter().any(|&e| e != from_edge);
                    return (
                        AdmitResult {
                            is_being_written: false,
                            is_neighbor_cached,
                        },
                        Vec::new(),
                    );
                }
                let had_other_copies = !copies.is_empty();
                let notify: Vec<EdgeIndex> = if copies.len() == 1 {
                    copies.iter().copied().collect()
                } else {
                    Vec::new()
                };
                copies.insert(from_edge);
                let _ = owner;
                (
                    AdmitResult {
                        is_being_written: false,
                        is_neighbor_cached: had_other_copies,
                    },
                    notify,
                )
            }
        }
    }

    pub fn evict(&self, key: &K, from_edge: EdgeIndex) -> EvictResult {
        let mut shard = self.shard(key).lock();
        let Some(entry) = shard.get_mut(key) else {
            return EvictResult {
                is_being_written: false,
                edgeset_to_notify: Vec::new(),
            };
        };
        match &mut entry.state {
            DirectoryState::CachedWriting { .. } | DirectoryState::AbsentWriting { .. } => EvictResult {
                is_being_written: true,
                edgeset_to_notify: Vec::new(),
            },
            DirectoryState::Absent => EvictResult {
                is_being_written: false,
                edgeset_to_notify: Vec::new(),
            },
            DirectoryState::Cached { owner, copies } => {
                if !copies.remove(&from_edge) {
                    return EvictResult {
                        is_being_written: false,
                        edgeset_to_notify: Vec::new(),
                    };
                }
                let edgeset_to_notify = if copies.len() == 1 {
                    copies.iter().copied().collect()
                } else {
                    Vec::new()
                };
                if copies.is_empty() {
                    entry.state = DirectoryState::Absent;
                } else if *owner == from_edge {
                    *owner = *copies.iter().next().unwrap();
                }
                EvictResult {
                    is_being_written: false,
                    edgeset_to_notify,
                }
            }
        }
    }

    pub fn acquire_write(&self, key: &K, from_edge: EdgeIndex) -> AcquireWriteResult {
        let mut shard = self.shard(key).lock();
        let entry = shard.entry(key.clone()).or_default();
        match &entry.state {
            DirectoryState::CachedWriting { holder, .. } | DirectoryState::AbsentWriting { holder } => {
                if *holder == from_edge {
                    AcquireWriteResult {
                        result: LockResult::Granted,
                        copies_to_invalidate: Vec::new(),
                        generation: entry.generation,
                    }
                } else {
                    AcquireWriteResult {
                        result: LockResult::Busy { holder: *holder },
                        copies_to_invalidate: Vec::new(),
                        generation: entry.generation,
                    }
                }
            }
            DirectoryState::Absent => {
                entry.generation += 1;
                entry.lease_deadline = Some(Instant::now() + self.lease_duration);
                entry.state = DirectoryState::AbsentWriting { holder: from_edge };
                AcquireWriteResult {
                    result: LockResult::Granted,
                    copies_to_invalidate: Vec::new(),
                    generation: entry.generation,
                }
            }
            DirectoryState::Cached { copies, .. } => {
                let prior_copies = copies.clone();
                let copies_to_invalidate: Vec<EdgeIndex> = prior_copies.iter().copied().collect();
                entry.generation += 1;
                entry.lease_deadline = Some(Instant::now() + self.lease_duration);
                entry.state = DirectoryState::CachedWriting {
                    holder: from_edge,
                    prior_copies,
                };
                AcquireWriteResult {
                    result: LockResult::Granted,
                    copies_to_invalidate,
                    generation: entry.generation,
                }
            }
        }
    }

    pub fn release_write(
        &self,
        key: &K,
        from_edge: EdgeIndex,
        generation: u64,
        produced_value: bool,
    ) -> Result<ReleaseWriteResult, ReleaseOutcome> {
        let mut shard = self.shard(key).lock();
        let Some(entry) = shard.get_mut(key) else {
            return Err(ReleaseOutcome::NotHolder);
        };
        let holder = match &entry.state {
            DirectoryState::CachedWriting { holder, .. } => *holder,
            DirectoryState::AbsentWriting { holder } => *holder,
            _ => return Err(ReleaseOutcome::NotHolder),
        };
        if holder != from_edge {
            return Err(ReleaseOutcome::NotHolder);
        }
        if entry.generation != generation {
            return Err(ReleaseOutcome::Stale {
                current: entry.generation,
            });
        }

        entry.lease_deadline = None;
        let prior_copies = match std::mem::replace(&mut entry.state, DirectoryState::Absent) {
            DirectoryState::CachedWriting { prior_copies, .. } => prior_copies,
            DirectoryState::AbsentWriting { .. } => BTreeSet::new(),
            _ => unreachable!(),
        };

        if produced_value {
            let mut copies = BTreeSet::new();
            copies.insert(from_edge);
            entry.state = DirectoryState::Cached {
                owner: from_edge,
                copies,
            };
        }

        let edgeset_to_notify: Vec<EdgeIndex> = prior_copies.into_iter().filter(|&e| e != from_edge).collect();
        Ok(ReleaseWriteResult { edgeset_to_notify })
    }

    /// Sweep every shard for write leases past their deadline, autonomously
    /// releasing them back to `Absent` and returning the edges that must
    /// still receive a `finish-block` for a copy this beacon invalidated
    /// earlier. Intended to be driven by `EdgeManager`'s background
    /// maintenance loop (§4.7).
    pub fn sweep_expired_leases(&self, now: Instant) -> Vec<ExpiredLease<K>> {
        let mut expired = Vec::new();
        for shard in &self.shards {
            let mut shard = shard.lock();
            let expired_keys: Vec<K> = shard
                .iter()
                .filter(|(_, e)| e.lease_deadline.map(|d| now >= d).unwrap_or(false))
                .map(|(k, _)| k.clone())
                .collect();
            for key in expired_keys {
                if let Some(entry) = shard.get_mut(&key) {
                    let finish_block_targets = match std::mem::replace(&mut entry.state, DirectoryState::Absent) {
                        DirectoryState::CachedWriting { prior_copies, .. } => prior_copies.into_iter().collect(),
                        DirectoryState::AbsentWriting { .. } => Vec::new(),
                        other => {
                            entry.state = other;
                            continue;
                        }
                    };
                    entry.lease_deadline = None;
                    expired.push(ExpiredLease {
                        key,
                        finish_block_targets,
                    });
                }
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DirectoryTable<String> {
        DirectoryTable::new(4, Duration::from_millis(500))
    }

    #[test]
    fn admit_from_absent_creates_single_owner() {
        let t = table();
        let (res, notify) = t.admit(&"a".to_string(), 0);
        assert!(!res.is_being_written);
        assert!(!res.is_neighbor_cached);
        assert!(notify.is_empty());
        let lookup = t.lookup(&"a".to_string(), 1);
        assert!(lookup.valid);
        assert_eq!(lookup.info.unwrap().owner_edge, 0);
    }

    #[test]
    fn second_admit_marks_neighbor_cached_and_notifies_owner() {
        let t = table();
        t.admit(&"a".to_string(), 0);
        let (res, notify) = t.admit(&"a".to_string(), 1);
        assert!(res.is_neighbor_cached);
        assert_eq!(notify, vec![0]);
    }

    #[test]
    fn admit_idempotent_on_replay() {
        let t = table();
        t.admit(&"a".to_string(), 0);
        let (res, notify) = t.admit(&"a".to_string(), 0);
        assert!(!res.is_neighbor_cached);
        assert!(notify.is_empty());
    }

    #[test]
    fn acquire_write_invalidates_all_copies_then_serializes() {
        let t = table();
        t.admit(&"a".to_string(), 0);
        t.admit(&"a".to_string(), 1);
        let acquired = t.acquire_write(&"a".to_string(), 2);
        assert_eq!(acquired.result, LockResult::Granted);
        let mut invalidated = acquired.copies_to_invalidate.clone();
        invalidated.sort();
        assert_eq!(invalidated, vec![0, 1]);

        let lookup = t.lookup(&"a".to_string(), 0);
        assert!(lookup.is_being_written);
        assert!(!lookup.valid);

        let contender = t.acquire_write(&"a".to_string(), 3);
        assert_eq!(contender.result, LockResult::Busy { holder: 2 });
    }

    #[test]
    fn acquire_write_is_idempotent_for_same_holder() {
        let t = table();
        let first = t.acquire_write(&"a".to_string(), 0);
        let second = t.acquire_write(&"a".to_string(), 0);
        assert_eq!(first.result, LockResult::Granted);
        assert_eq!(second.result, LockResult::Granted);
        assert_eq!(first.generation, second.generation);
    }

    #[test]
    fn release_write_with_value_leaves_single_owner() {
        let t = table();
        t.admit(&"a".to_string(), 0);
        t.admit(&"a".to_string(), 1);
        let acquired = t.acquire_write(&"a".to_string(), 2);
        let release = t
            .release_write(&"a".to_string(), 2, acquired.generation, true)
            .unwrap();
        let mut notify = release.edgeset_to_notify;
        notify.sort();
        assert_eq!(notify, vec![0, 1]);
        let lookup = t.lookup(&"a".to_string(), 9);
        assert!(lookup.valid);
        assert_eq!(lookup.info.unwrap().owner_edge, 2);
    }

    #[test]
    fn release_write_without_value_goes_absent() {
        let t = table();
        t.admit(&"a".to_string(), 0);
        let acquired = t.acquire_write(&"a".to_string(), 0);
        t.release_write(&"a".to_string(), 0, acquired.generation, false).unwrap();
        let lookup = t.lookup(&"a".to_string(), 9);
        assert!(!lookup.valid);
        assert!(!lookup.is_being_written);
    }

    #[test]
    fn release_from_non_holder_is_rejected() {
        let t = table();
        let acquired = t.acquire_write(&"a".to_string(), 0);
        let err = t
            .release_write(&"a".to_string(), 1, acquired.generation, true)
            .unwrap_err();
        assert_eq!(err, ReleaseOutcome::NotHolder);
    }

    #[test]
    fn stale_release_generation_is_rejected() {
        let t = table();
        let acquired = t.acquire_write(&"a".to_string(), 0);
        t.release_write(&"a".to_string(), 0, acquired.generation, true).unwrap();
        let second = t.acquire_write(&"a".to_string(), 0);
        let err = t
            .release_write(&"a".to_string(), 0, second.generation - 1, true)
            .unwrap_err();
        assert_eq!(err, ReleaseOutcome::Stale { current: second.generation });
    }

    #[test]
    fn evict_last_other_demotes_multi_and_notifies_remaining_owner() {
        let t = table();
        t.admit(&"a".to_string(), 0);
        t.admit(&"a".to_string(), 1);
        let res = t.evict(&"a".to_string(), 0);
        assert_eq!(res.edgeset_to_notify, vec![1]);
        let lookup = t.lookup(&"a".to_string(), 9);
        assert_eq!(lookup.info.unwrap().owner_edge, 1);
    }

    #[test]
    fn evict_all_tears_down_entry() {
        let t = table();
        t.admit(&"a".to_string(), 0);
        let res = t.evict(&"a".to_string(), 0);
        assert!(res.edgeset_to_notify.is_empty());
        let lookup = t.lookup(&"a".to_string(), 9);
        assert!(!lookup.valid);
    }

    #[test]
    fn expired_lease_is_autonomously_released() {
        let t = DirectoryTable::<String>::new(4, Duration::from_millis(0));
        t.admit(&"a".to_string(), 0);
        t.acquire_write(&"a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(5));
        let expired = t.sweep_expired_leases(Instant::now());
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].key, "a");
        assert_eq!(expired[0].finish_block_targets, vec![0]);
        let lookup = t.lookup(&"a".to_string(), 9);
        assert!(!lookup.is_being_written);
    }
}
