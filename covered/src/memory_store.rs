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

//! An in-process `LocalCacheStore` backed by a plain `HashMap` behind a
//! `parking_lot::Mutex`, the simplest concrete collaborator an embedder can
//! reach for without pulling in `foyer-storage`'s on-disk engine. Mirrors
//! `foyer_storage::none::NoneStore`'s role as the trivial reference
//! implementation of its trait.

use covered_common::code::Weighted;
use covered_core::local_store::{LocalCacheStats, LocalCacheStore};
use parking_lot::Mutex;

struct Entry {
    value: Vec<u8>,
}

/// Byte-capacity-bounded in-memory store. Does not evict on its own —
/// `EdgeManager` always runs admission/eviction against `VictimTracker`
/// before calling `insert`, so `MemoryLocalStore` only ever has to reject an
/// insert that would overflow `capacity_bytes` (which should not happen if
/// the caller honors `free_bytes`).
pub struct MemoryLocalStore {
    capacity_bytes: u64,
    inner: Mutex<hashbrown::HashMap<Vec<u8>, Entry>>,
    used_bytes: std::sync::atomic::AtomicU64,
}

impl MemoryLocalStore {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            capacity_bytes,
            inner: Mutex::new(hashbrown::HashMap::new()),
            used_bytes: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl LocalCacheStore<Vec<u8>, Vec<u8>> for MemoryLocalStore {
    async fn get(&self, key: &Vec<u8>) -> covered_common::Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().get(key).map(|e| e.value.clone()))
    }

    async fn insert(&self, key: Vec<u8>, value: Vec<u8>) -> covered_common::Result<()> {
        use std::sync::atomic::Ordering;
        let added = value.weight() as u64;
        let mut guard = self.inner.lock();
        if let Some(prior) = guard.insert(key, Entry { value }) {
            self.used_bytes.fetch_sub(prior.value.weight() as u64, Ordering::Relaxed);
        }
        self.used_bytes.fetch_add(added, Ordering::Relaxed);
        Ok(())
    }

    async fn remove(&self, key: &Vec<u8>) -> covered_common::Result<bool> {
        use std::sync::atomic::Ordering;
        match self.inner.lock().remove(key) {
            Some(entry) => {
                self.used_bytes.fetch_sub(entry.value.weight() as u64, Ordering::Relaxed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn contains(&self, key: &Vec<u8>) -> bool {
        self.inner.lock().contains_key(key)
    }

    fn stats(&self) -> LocalCacheStats {
        LocalCacheStats {
            used_bytes: self.used_bytes.load(std::sync::atomic::Ordering::Relaxed),
            capacity_bytes: self.capacity_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_get_remove_round_trip() {
        let store = MemoryLocalStore::new(1024);
        store.insert(b"k".to_vec(), b"v".to_vec()).await.unwrap();
        assert_eq!(store.get(&b"k".to_vec()).await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.stats().used_bytes, 1);
        assert!(store.remove(&b"k".to_vec()).await.unwrap());
        assert_eq!(store.stats().used_bytes, 0);
    }

    #[tokio::test]
    async fn reinsert_replaces_accounted_size() {
        let store = MemoryLocalStore::new(1024);
        store.insert(b"k".to_vec(), b"ab".to_vec()).await.unwrap();
        store.insert(b"k".to_vec(), b"x".to_vec()).await.unwrap();
        assert_eq!(store.stats().used_bytes, 1);
    }
}
