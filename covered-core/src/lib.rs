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

//! Cooperative edge-cache core: the beacon directory, the per-edge
//! popularity/victim tracking, reward-based admission and the
//! [`edge_manager::EdgeManager`] that ties them to a local store, a cloud
//! store and an edge transport.
//!
//! Every data structure below except [`protocol`] and [`edge_manager`] is
//! generic over `K: covered_common::Key` so it can be unit tested and
//! reused independently of the wire format; `edge_manager::EdgeManager` is
//! where the generic pieces get instantiated against the concrete
//! byte-string key/value the wire protocol and external collaborators
//! actually carry.

pub mod admission;
pub mod cloud;
pub mod config;
pub mod directory;
pub mod directory_cacher;
pub mod edge_manager;
pub mod hitflag;
pub mod local_store;
pub mod metadata_update;
pub mod popularity;
pub mod protocol;
pub mod reward;
pub mod rwlock;
pub mod topology;
pub mod transport;
pub mod victim;
pub mod weight;

pub use cloud::CloudStore;
pub use config::{CoveredConfig, CoveredConfigBuilder};
pub use directory::{DirectoryInfo, DirectoryTable, LockResult};
pub use edge_manager::EdgeManager;
pub use hitflag::HitFlag;
pub use local_store::{LocalCacheStats, LocalCacheStore};
pub use reward::{Reward, RewardFn};
pub use topology::EdgeTopology;
pub use transport::EdgeTransport;
pub use weight::CoveredWeight;
