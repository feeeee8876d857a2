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

//! The static edge topology, and the stable key-to-beacon assignment (§3).
//!
//! `EdgeTopology` is handed to every subsystem by value (it is `Copy`-ish,
//! just a count and a local index) rather than through a cyclic reference, so
//! that `EdgeManager`, `CooperationProtocol` and `DirectoryTable` each look
//! peers up through the same small table instead of owning each other.

use std::hash::{Hash, Hasher};

use covered_common::edgeset::EdgeIndex;
use twox_hash::XxHash64;

/// Hash `key` with a fixed-seed hasher and fold it into `[0, edge_count)`.
/// Must be identical bit-for-bit across every edge in the fleet: a
/// process-randomized hasher (the default `RandomState`) would make each
/// edge disagree about who the beacon for a key is.
fn stable_hash<K: Hash>(key: &K) -> u64 {
    let mut hasher = XxHash64::default();
    key.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeTopology {
    edge_count: u32,
    self_index: EdgeIndex,
}

impl EdgeTopology {
    pub fn new(edge_count: u32, self_index: EdgeIndex) -> covered_common::Result<Self> {
        if edge_count == 0 {
            return Err(covered_common::CoreError::Config("edge_count must be > 0".into()));
        }
        if self_index >= edge_count {
            return Err(covered_common::CoreError::Config(format!(
                "self_index {self_index} out of range [0, {edge_count})"
            )));
        }
        Ok(Self { edge_count, self_index })
    }

    pub fn edge_count(&self) -> u32 {
        self.edge_count
    }

    pub fn self_index(&self) -> EdgeIndex {
        self.self_index
    }

    pub fn is_valid_edge(&self, edge: EdgeIndex) -> bool {
        edge < self.edge_count
    }

    /// The beacon edge owning the directory entry for `key`.
    pub fn beacon_for<K: Hash>(&self, key: &K) -> EdgeIndex {
        (stable_hash(key) % self.edge_count as u64) as EdgeIndex
    }

    pub fn is_self_beacon<K: Hash>(&self, key: &K) -> bool {
        self.beacon_for(key) == self.self_index
    }

    /// Every edge other than `self`.
    pub fn peers(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        (0..self.edge_count).filter(move |&e| e != self.self_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beacon_is_deterministic_and_in_range() {
        let topo = EdgeTopology::new(5, 0).unwrap();
        let a = topo.beacon_for(&"alpha");
        let b = topo.beacon_for(&"alpha");
        assert_eq!(a, b);
        assert!(a < 5);
    }

    #[test]
    fn rejects_bad_config() {
        assert!(EdgeTopology::new(0, 0).is_err());
        assert!(EdgeTopology::new(3, 3).is_err());
    }

    #[test]
    fn peers_excludes_self() {
        let topo = EdgeTopology::new(4, 2).unwrap();
        assert_eq!(topo.peers().collect::<Vec<_>>(), vec![0, 1, 3]);
    }
}
