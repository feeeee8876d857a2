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

//! `CloudStore`: the collaborator of last resort on a global miss (§6
//! "Cloud API"). The core never persists anything itself (§6 "Persisted
//! state: None required"); durability is entirely this collaborator's
//! obligation.

use covered_common::{Key, Value};

pub trait CloudStore<K, V>: Send + Sync
where
    K: Key,
    V: Value,
{
    async fn cloud_get(&self, key: &K) -> covered_common::Result<Option<V>>;
    async fn cloud_put(&self, key: K, value: V) -> covered_common::Result<()>;
    async fn cloud_del(&self, key: &K) -> covered_common::Result<()>;
}
