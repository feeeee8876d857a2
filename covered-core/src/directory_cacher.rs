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

//! Non-beacon `DirectoryCacher` (§4.4.2): a plain map, no independent
//! capacity budget of its own. Grounded on
//! `original_source/src/core/directory_cacher.{h,c}`, which is nothing more
//! than a global-rwlock-guarded map pruned reactively by the three events
//! listed below — it never runs its own eviction policy, since its size is
//! already implicitly bounded by the uncached tracker's capacity.

use covered_common::Key;
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::directory::DirectoryInfo;

#[derive(Default)]
pub struct DirectoryCacher<K: Key> {
    entries: RwLock<HashMap<K, DirectoryInfo>>,
}

impl<K: Key> DirectoryCacher<K> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<DirectoryInfo> {
        self.entries.read().get(key).copied()
    }

    /// Insert or replace on a beacon `lookup` reply.
    pub fn insert(&self, key: K, info: DirectoryInfo) {
        self.entries.write().insert(key, info);
    }

    /// Remove because `key` became locally cached, fell out of the uncached
    /// tracker, or the beacon reported the entry invalid.
    pub fn remove(&self, key: &K) {
        self.entries.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_then_remove() {
        let cacher: DirectoryCacher<String> = DirectoryCacher::new();
        cacher.insert("a".to_string(), DirectoryInfo { owner_edge: 3 });
        assert_eq!(cacher.get(&"a".to_string()).unwrap().owner_edge, 3);
        cacher.remove(&"a".to_string());
        assert!(cacher.get(&"a".to_string()).is_none());
    }
}
