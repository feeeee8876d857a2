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

//! Concrete `CloudStore` collaborators. `MemoryCloudStore` is a plain
//! `HashMap`-backed source of truth, useful for tests and single-process
//! demos; it plays the role `foyer_storage::none::NoneStore` plays for
//! `Storage` — the trivial reference implementation every trait needs one
//! of.

use covered_core::cloud::CloudStore;
use parking_lot::Mutex;

#[derive(Default)]
pub struct MemoryCloudStore {
    inner: Mutex<hashbrown::HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryCloudStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CloudStore<Vec<u8>, Vec<u8>> for MemoryCloudStore {
    async fn cloud_get(&self, key: &Vec<u8>) -> covered_common::Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().get(key).cloned())
    }

    async fn cloud_put(&self, key: Vec<u8>, value: Vec<u8>) -> covered_common::Result<()> {
        self.inner.lock().insert(key, value);
        Ok(())
    }

    async fn cloud_del(&self, key: &Vec<u8>) -> covered_common::Result<()> {
        self.inner.lock().remove(key);
        Ok(())
    }
}

/// Shares one `MemoryCloudStore` across every edge in a cluster, the way a
/// real deployment's edges all talk to the same object store. `CloudStore`
/// is implemented by delegation rather than making `MemoryCloudStore`
/// itself cloneable, so the `Arc` is explicit at the call site.
#[derive(Clone)]
pub struct SharedCloud(std::sync::Arc<MemoryCloudStore>);

impl SharedCloud {
    pub fn new(store: std::sync::Arc<MemoryCloudStore>) -> Self {
        Self(store)
    }
}

impl CloudStore<Vec<u8>, Vec<u8>> for SharedCloud {
    async fn cloud_get(&self, key: &Vec<u8>) -> covered_common::Result<Option<Vec<u8>>> {
        self.0.cloud_get(key).await
    }

    async fn cloud_put(&self, key: Vec<u8>, value: Vec<u8>) -> covered_common::Result<()> {
        self.0.cloud_put(key, value).await
    }

    async fn cloud_del(&self, key: &Vec<u8>) -> covered_common::Result<()> {
        self.0.cloud_del(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_del_round_trip() {
        let cloud = MemoryCloudStore::new();
        cloud.cloud_put(b"k".to_vec(), b"v".to_vec()).await.unwrap();
        assert_eq!(cloud.cloud_get(&b"k".to_vec()).await.unwrap(), Some(b"v".to_vec()));
        cloud.cloud_del(&b"k".to_vec()).await.unwrap();
        assert_eq!(cloud.cloud_get(&b"k".to_vec()).await.unwrap(), None);
    }
}
