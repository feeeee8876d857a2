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

//! `EdgeIndex` and small edge-indexed bitmaps, grounded on
//! `original_source/src/core/popularity/preserved_edgeset.{h,c}`.

use bitvec::prelude::*;

/// Integer in `[0, N)` identifying an edge node in the static topology.
pub type EdgeIndex = u32;

/// A bitmap over `[0, edge_count)`. Used both as the generic "set of edges"
/// wire type (edgeset_to_notify, invalidation targets) and, via
/// [`PreservedEdgeset`], to keep a non-blocking placement decision from
/// double-booking an edge while an earlier placement is still in flight.
#[derive(Debug, Clone, Default)]
pub struct EdgeBitset {
    bits: BitVec,
}

impl EdgeBitset {
    pub fn new(edge_count: usize) -> Self {
        Self {
            bits: bitvec![0; edge_count],
        }
    }

    pub fn contains(&self, edge: EdgeIndex) -> bool {
        self.bits.get(edge as usize).map(|b| *b).unwrap_or(false)
    }

    pub fn insert(&mut self, edge: EdgeIndex) {
        self.bits.set(edge as usize, true);
    }

    pub fn remove(&mut self, edge: EdgeIndex) -> bool {
        let was = self.contains(edge);
        if was {
            self.bits.set(edge as usize, false);
        }
        was
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.any()
    }

    pub fn iter(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.bits.iter_ones().map(|i| i as EdgeIndex)
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn from_edges(edge_count: usize, edges: impl IntoIterator<Item = EdgeIndex>) -> Self {
        let mut set = Self::new(edge_count);
        for e in edges {
            set.insert(e);
        }
        set
    }
}

/// Bitmap of edges preserved by an in-flight, non-blocking placement
/// decision so a later placement decision does not pick the same edge
/// again before the first admission lands.
#[derive(Debug, Clone)]
pub struct PreservedEdgeset {
    bits: EdgeBitset,
}

impl PreservedEdgeset {
    pub fn new(edge_count: usize) -> Self {
        Self {
            bits: EdgeBitset::new(edge_count),
        }
    }

    pub fn is_preserved(&self, edge: EdgeIndex) -> bool {
        self.bits.contains(edge)
    }

    /// Preserve a placement edge set. Panics (via debug assert) on overlap
    /// with an already-preserved edge, mirroring the original's assertion
    /// that there is no duplicate placement on the same edge node.
    pub fn preserve_for_placement(&mut self, edges: impl IntoIterator<Item = EdgeIndex>) {
        for edge in edges {
            debug_assert!(!self.bits.contains(edge), "edge {edge} already preserved");
            self.bits.insert(edge);
        }
    }

    /// Clear a single edge's reservation once its admission completed.
    /// Returns `true` if no edge remains preserved.
    pub fn clear(&mut self, edge: EdgeIndex) -> bool {
        self.bits.remove(edge);
        self.bits.is_empty()
    }
}
