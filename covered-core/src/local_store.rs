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

//! `LocalCacheStore`: the external collaborator that physically holds
//! values at one edge (§5 "Shared-resource policy": "LocalCacheStore is
//! thread-safe internally — the external collaborator's obligation").
//!
//! Modeled as a trait with native `async fn`, the way `foyer_storage`'s
//! `Storage<K, V>` trait in `none.rs` is, rather than boxed futures via
//! `async-trait`: `covered-core` drives this trait directly from
//! `EdgeManager`, it never needs to be object-safe or stored as a trait
//! object.

use covered_common::{Key, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCacheStats {
    pub used_bytes: u64,
    pub capacity_bytes: u64,
}

impl LocalCacheStats {
    pub fn free_bytes(&self) -> u64 {
        self.capacity_bytes.saturating_sub(self.used_bytes)
    }
}

pub trait LocalCacheStore<K, V>: Send + Sync
where
    K: Key,
    V: Value,
{
    /// Look up a value without touching popularity bookkeeping; the caller
    /// is responsible for calling `PopularityTracker::observe_access`.
    async fn get(&self, key: &K) -> covered_common::Result<Option<V>>;

    /// Insert `value`, evicting nothing itself — callers run
    /// [`crate::admission::make_room`] against [`crate::victim::VictimTracker`]
    /// first and call `remove` for whatever that picks.
    async fn insert(&self, key: K, value: V) -> covered_common::Result<()>;

    async fn remove(&self, key: &K) -> covered_common::Result<bool>;

    fn contains(&self, key: &K) -> bool;

    fn stats(&self) -> LocalCacheStats;
}
