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

//! In-process `EdgeTransport` that dispatches straight to a peer
//! `EdgeManager::handle_request`, skipping sockets entirely. Plays the role
//! the teacher's `madsim-tokio` simulated network plays for its storage
//! tests, minus the deterministic scheduler: a same-process stand-in good
//! enough to exercise `CooperationProtocol` end to end without a listener.

use std::sync::{Arc, OnceLock};

use covered_common::{CoreError, Result};
use covered_core::protocol::Message;
use covered_core::{EdgeManager, EdgeTransport};

use crate::cloud_store::SharedCloud;
use crate::memory_store::MemoryLocalStore;

pub type ClusterEdge = EdgeManager<MemoryLocalStore, SharedCloud, LoopbackTransport>;

/// One edge's handle onto a shared, lazily-populated cluster roster. Every
/// edge in a cluster holds a clone of the same `Arc<OnceLock<..>>`; the
/// roster is filled in once every `EdgeManager` has been constructed, since
/// each one needs its own transport before it exists.
#[derive(Clone)]
pub struct LoopbackTransport {
    edges: Arc<OnceLock<Vec<Arc<ClusterEdge>>>>,
}

impl LoopbackTransport {
    /// Build `edge_count` not-yet-wired transports sharing one roster cell.
    /// Construct each edge's `EdgeManager` with one of these, wrap the
    /// results in `Arc`, then call `finalize` with the completed roster.
    pub fn new_cluster(edge_count: usize) -> Vec<LoopbackTransport> {
        let cell: Arc<OnceLock<Vec<Arc<ClusterEdge>>>> = Arc::new(OnceLock::new());
        (0..edge_count).map(|_| LoopbackTransport { edges: cell.clone() }).collect()
    }

    /// Publish the completed roster. Every transport handed out by
    /// `new_cluster` shares the same cell, so calling this once on any of
    /// them wires up the whole cluster. Panics if called twice.
    pub fn finalize(&self, roster: Vec<Arc<ClusterEdge>>) {
        self.edges.set(roster).map_err(|_| ()).expect("cluster already finalized");
    }

    fn roster(&self) -> &[Arc<ClusterEdge>] {
        self.edges.get().expect("LoopbackTransport used before finalize()")
    }
}

impl EdgeTransport for LoopbackTransport {
    async fn send_request(&self, to_edge: u32, request: Message, _timeout: std::time::Duration) -> Result<Message> {
        let target = self
            .roster()
            .get(to_edge as usize)
            .ok_or_else(|| CoreError::Transient { edge: to_edge, reason: "no such edge in cluster".into() })?;
        Ok(target.handle_request(request).await)
    }

    async fn send_notify(&self, to_edge: u32, message: Message) -> Result<()> {
        if let Some(target) = self.roster().get(to_edge as usize) {
            let _ = target.handle_request(message).await;
        }
        Ok(())
    }
}
