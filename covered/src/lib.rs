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

//! Facade crate for the cooperative edge-caching substrate: re-exports
//! `covered-core`'s `EdgeManager` and its collaborator traits, and ships a
//! ready-to-use `MemoryLocalStore`/`SharedCloud`/`LoopbackTransport` trio for
//! embedding without standing up real storage or a network.
//!
//! Mirrors the teacher's own `foyer` crate, which re-exports
//! `foyer-memory` + `foyer-storage` behind one `prelude` rather than making
//! callers depend on the component crates directly.

pub mod cloud_store;
pub mod loopback_transport;
pub mod memory_store;

pub use cloud_store::{MemoryCloudStore, SharedCloud};
pub use loopback_transport::{ClusterEdge, LoopbackTransport};
pub use memory_store::MemoryLocalStore;

pub mod prelude {
    pub use covered_common::code::{Key, Value, Weighted};
    pub use covered_common::edgeset::{EdgeBitset, PreservedEdgeset};
    pub use covered_common::error::{CoreError, WriteFailureKind};
    pub use covered_common::metrics::Metrics;
    pub use covered_common::Result;
    pub use covered_core::{
        CloudStore, CoveredConfig, CoveredConfigBuilder, CoveredWeight, DirectoryInfo, DirectoryTable, EdgeManager,
        EdgeTopology, EdgeTransport, HitFlag, LocalCacheStats, LocalCacheStore, LockResult, Reward, RewardFn,
    };

    pub use crate::cloud_store::{MemoryCloudStore, SharedCloud};
    pub use crate::loopback_transport::{ClusterEdge, LoopbackTransport};
    pub use crate::memory_store::MemoryLocalStore;
}

/// Build an `edge_count`-node in-process cluster sharing one
/// `MemoryCloudStore`, each edge backed by its own `MemoryLocalStore` of
/// `local_capacity_bytes` and wired together with `LoopbackTransport`.
/// Convenient for demos and the facade's own integration tests; a real
/// deployment constructs `EdgeManager` directly against its own storage,
/// cloud client and network transport.
pub fn build_loopback_cluster(edge_count: u32, local_capacity_bytes: u64) -> Vec<std::sync::Arc<ClusterEdge>> {
    build_loopback_cluster_with_cloud(edge_count, local_capacity_bytes).0
}

/// Same as [`build_loopback_cluster`], but also hands back the shared
/// `MemoryCloudStore` so a caller (a test, usually) can inspect or seed the
/// cloud's contents directly instead of only observing it through a client's
/// GET/PUT.
pub fn build_loopback_cluster_with_cloud(
    edge_count: u32,
    local_capacity_bytes: u64,
) -> (Vec<std::sync::Arc<ClusterEdge>>, std::sync::Arc<MemoryCloudStore>) {
    use std::sync::Arc;

    use covered_core::CoveredConfigBuilder;

    let cloud = Arc::new(MemoryCloudStore::new());
    let transports = LoopbackTransport::new_cluster(edge_count as usize);

    let edges: Vec<Arc<ClusterEdge>> = transports
        .into_iter()
        .enumerate()
        .map(|(index, transport)| {
            let config = CoveredConfigBuilder::new(edge_count, index as u32)
                .local_capacity_bytes(local_capacity_bytes)
                .build()
                .expect("cluster config is always valid");
            let local_store = MemoryLocalStore::new(local_capacity_bytes);
            Arc::new(
                ClusterEdge::new(config, local_store, SharedCloud::new(cloud.clone()), transport)
                    .expect("cluster edge construction cannot fail"),
            )
        })
        .collect();

    if let Some(first) = edges.first() {
        first.transport().finalize(edges.clone());
    }
    (edges, cloud)
}
